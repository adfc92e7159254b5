//! Transport-level error types.

use chainscan_core::ScanError;
use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur during an RPC call.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, timeout, non-2xx status).
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON-RPC error object returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl TransportError {
    /// Returns `true` if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout { .. })
    }
}

impl From<TransportError> for ScanError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Deserialization(e) => ScanError::InvalidResponse(e.to_string()),
            other => ScanError::Rpc(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(TransportError::Http("503".into()).is_retryable());
        assert!(TransportError::Timeout { ms: 30_000 }.is_retryable());
        let rpc = TransportError::Rpc(JsonRpcError {
            code: -32602,
            message: "invalid params".into(),
            data: None,
        });
        assert!(!rpc.is_retryable());
    }

    #[test]
    fn converts_into_scan_error() {
        let err: ScanError = TransportError::Timeout { ms: 10 }.into();
        assert!(matches!(err, ScanError::Rpc(msg) if msg.contains("10ms")));

        let bad = serde_json::from_str::<u64>("\"x\"").unwrap_err();
        let err: ScanError = TransportError::Deserialization(bad).into();
        assert!(matches!(err, ScanError::InvalidResponse(_)));
    }
}
