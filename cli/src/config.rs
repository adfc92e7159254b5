//! `chainscan.yaml` — the CLI's configuration file.
//!
//! ```yaml
//! scanner:
//!   chain: fantom
//!   hysteresis: 10
//! rpc:
//!   url: https://rpc.ftm.tools
//!   confirmations: 2
//! storage:
//!   path: ./chainscan.db
//!   checkpoint_interval: 100
//! log:
//!   level: info
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use chainscan_core::ScannerConfig;
use chainscan_rpc::{HttpClientConfig, RetryConfig};

use crate::logging::LogConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scanner: ScannerConfig,
    pub rpc: RpcConfig,
    pub storage: StorageConfig,
    pub log: LogConfig,
}

/// JSON-RPC endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub url: String,
    /// Blocks to stay behind the node's latest block.
    pub confirmations: u64,
    pub request_timeout_ms: u64,
    /// Transport-level retries per request before the scanner sees an error.
    pub max_retries: u32,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:18545".into(),
            confirmations: 0,
            request_timeout_ms: 30_000,
            max_retries: 3,
        }
    }
}

impl RpcConfig {
    pub fn client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            retry: RetryConfig {
                max_retries: self.max_retries,
                ..RetryConfig::default()
            },
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }
}

/// SQLite settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: String,
    /// Save the checkpoint every N stored headers.
    pub checkpoint_interval: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "./chainscan.db".into(),
            checkpoint_interval: 100,
        }
    }
}

impl AppConfig {
    /// Load from `path`, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.scanner.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = AppConfig::from_yaml(
            "scanner:\n  hysteresis: 25\nrpc:\n  url: https://rpc.ftm.tools\n  confirmations: 2\n",
        )
        .unwrap();

        assert_eq!(config.scanner.hysteresis, 25);
        assert_eq!(config.scanner.default_start_block, 16_000_000);
        assert_eq!(config.rpc.url, "https://rpc.ftm.tools");
        assert_eq!(config.rpc.confirmations, 2);
        assert_eq!(config.rpc.max_retries, 3);
        assert_eq!(config.storage, StorageConfig::default());
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn invalid_scanner_section_is_rejected() {
        assert!(AppConfig::from_yaml("scanner:\n  header_queue_capacity: 0\n").is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/chainscan.yaml"))).unwrap_err();
        assert!(err.to_string().contains("reading config file"));
    }

    #[test]
    fn client_config_from_rpc_section() {
        let rpc = RpcConfig {
            request_timeout_ms: 1_500,
            max_retries: 0,
            ..RpcConfig::default()
        };
        let client = rpc.client_config();
        assert_eq!(client.request_timeout, Duration::from_millis(1_500));
        assert_eq!(client.retry.max_retries, 0);
    }
}
