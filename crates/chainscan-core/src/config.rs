//! Scanner configuration and its fluent builder.
//!
//! # Example
//!
//! ```rust
//! use chainscan_core::ScannerBuilder;
//!
//! let config = ScannerBuilder::new()
//!     .chain("fantom")
//!     .default_start_block(16_000_000)
//!     .hysteresis(10)
//!     .header_queue_capacity(512)
//!     .build_config();
//! assert_eq!(config.hysteresis, 10);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// First block scanned when no checkpoint exists.
pub const DEFAULT_START_BLOCK: u64 = 16_000_000;

/// Blocks the head may drift before an idle scanner resumes scanning.
pub const DEFAULT_HYSTERESIS: u64 = 10;

/// Configuration for a [`BlockScanner`](crate::BlockScanner).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Chain slug, used for checkpoint keys and log fields.
    pub chain: String,
    /// Scanner name, used for checkpoint keys.
    pub scanner_id: String,
    /// Starting height when the checkpoint is unknown (`0`).
    pub default_start_block: u64,
    /// Dead band around the head, in blocks.
    pub hysteresis: u64,
    /// Head refresh period (milliseconds).
    pub head_refresh_ms: u64,
    /// Progress log period (milliseconds).
    pub progress_log_ms: u64,
    /// Wait after a failed header fetch (milliseconds).
    pub retry_delay_ms: u64,
    /// Capacity of the outgoing header queue.
    pub header_queue_capacity: usize,
    /// Capacity of the incoming observed-block queue.
    pub observed_queue_capacity: usize,
    /// Capacity of the state-change queue; notifications beyond it are dropped.
    pub state_queue_capacity: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            chain: "fantom".into(),
            scanner_id: "block-scanner".into(),
            default_start_block: DEFAULT_START_BLOCK,
            hysteresis: DEFAULT_HYSTERESIS,
            head_refresh_ms: 2_000,
            progress_log_ms: 10_000,
            retry_delay_ms: 5_000,
            header_queue_capacity: 1_024,
            observed_queue_capacity: 64,
            state_queue_capacity: 1,
        }
    }
}

impl ScannerConfig {
    pub fn head_refresh(&self) -> Duration {
        Duration::from_millis(self.head_refresh_ms)
    }

    pub fn progress_log(&self) -> Duration {
        Duration::from_millis(self.progress_log_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Reject values the runtime cannot work with (zero periods, zero-sized queues).
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.head_refresh_ms == 0 || self.progress_log_ms == 0 {
            return Err(ScanError::Config("timer periods must be non-zero".into()));
        }
        if self.header_queue_capacity == 0
            || self.observed_queue_capacity == 0
            || self.state_queue_capacity == 0
        {
            return Err(ScanError::Config("queue capacities must be non-zero".into()));
        }
        Ok(())
    }
}

/// Fluent builder for [`ScannerConfig`].
#[derive(Default)]
pub struct ScannerBuilder {
    config: ScannerConfig,
}

impl ScannerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the chain slug.
    pub fn chain(mut self, chain: impl Into<String>) -> Self {
        self.config.chain = chain.into();
        self
    }

    /// Set the scanner ID (used for checkpoint keys).
    pub fn scanner_id(mut self, id: impl Into<String>) -> Self {
        self.config.scanner_id = id.into();
        self
    }

    pub fn default_start_block(mut self, block: u64) -> Self {
        self.config.default_start_block = block;
        self
    }

    pub fn hysteresis(mut self, blocks: u64) -> Self {
        self.config.hysteresis = blocks;
        self
    }

    pub fn head_refresh_ms(mut self, ms: u64) -> Self {
        self.config.head_refresh_ms = ms;
        self
    }

    pub fn progress_log_ms(mut self, ms: u64) -> Self {
        self.config.progress_log_ms = ms;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn header_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.header_queue_capacity = capacity;
        self
    }

    pub fn observed_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.observed_queue_capacity = capacity;
        self
    }

    pub fn state_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.state_queue_capacity = capacity;
        self
    }

    /// Build the `ScannerConfig`.
    pub fn build_config(self) -> ScannerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let cfg = ScannerBuilder::new().build_config();
        assert_eq!(cfg.default_start_block, 16_000_000);
        assert_eq!(cfg.hysteresis, 10);
        assert_eq!(cfg.head_refresh(), Duration::from_secs(2));
        assert_eq!(cfg.progress_log(), Duration::from_secs(10));
        assert_eq!(cfg.retry_delay(), Duration::from_secs(5));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn builder_custom() {
        let cfg = ScannerBuilder::new()
            .chain("opera")
            .scanner_id("artworks")
            .default_start_block(1_000)
            .hysteresis(3)
            .header_queue_capacity(8)
            .build_config();

        assert_eq!(cfg.chain, "opera");
        assert_eq!(cfg.scanner_id, "artworks");
        assert_eq!(cfg.default_start_block, 1_000);
        assert_eq!(cfg.hysteresis, 3);
        assert_eq!(cfg.header_queue_capacity, 8);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: ScannerConfig = serde_json::from_str(r#"{ "hysteresis": 4 }"#).unwrap();
        assert_eq!(cfg.hysteresis, 4);
        assert_eq!(cfg.default_start_block, DEFAULT_START_BLOCK);
        assert_eq!(cfg.retry_delay_ms, 5_000);
    }

    #[test]
    fn zero_capacity_rejected() {
        let cfg = ScannerBuilder::new().header_queue_capacity(0).build_config();
        assert!(matches!(cfg.validate(), Err(ScanError::Config(_))));
    }
}
