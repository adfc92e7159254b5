//! The chain-facing collaborator of the scanner.

use async_trait::async_trait;

use crate::error::ScanError;
use crate::types::BlockHeader;

/// Source of chain head heights and block headers.
///
/// Implemented by the JSON-RPC source in `chainscan-rpc`; tests use
/// in-memory fakes. Calls may fail transiently and the scanner retries them.
#[async_trait]
pub trait HeaderSource: Send + Sync {
    /// Latest head height the node considers canonical.
    async fn current_head(&self) -> Result<u64, ScanError>;

    /// Fetch the header of block `number`.
    async fn pull_header(&self, number: u64) -> Result<BlockHeader, ScanError>;
}
