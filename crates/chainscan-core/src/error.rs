//! Error types for the scanning pipeline.

use thiserror::Error;

/// Errors raised by the scanner's collaborators.
///
/// The running scan loop never returns these to a caller; they are logged
/// and absorbed. They surface from the source and checkpoint traits and from
/// the storage and RPC crates.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Block header #{number} not available")]
    HeaderNotFound { number: u64 },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScanError {
    /// Returns `true` if retrying the same call later may succeed.
    ///
    /// A header that is not yet available is transient: the node may simply
    /// not have imported it.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Rpc(_) | Self::HeaderNotFound { .. })
    }
}
