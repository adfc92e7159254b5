//! EVM block header source.
//!
//! Uses JSON-RPC `eth_blockNumber` for the head and
//! `eth_getBlockByNumber(<n>, false)` for headers.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::trace;

use chainscan_core::{BlockHeader, HeaderSource, ScanError};

use crate::transport::RpcTransport;

/// [`HeaderSource`] over any [`RpcTransport`].
pub struct EvmHeaderSource<T> {
    transport: T,
    /// Blocks kept between the node's latest block and the reported head.
    confirmations: u64,
    next_id: AtomicU64,
}

impl<T: RpcTransport> EvmHeaderSource<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            confirmations: 0,
            next_id: AtomicU64::new(1),
        }
    }

    /// Report the head `confirmations` blocks behind the node's latest block.
    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }

    fn id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl<T: RpcTransport> HeaderSource for EvmHeaderSource<T> {
    async fn current_head(&self) -> Result<u64, ScanError> {
        let latest: String = self
            .transport
            .call(self.id(), "eth_blockNumber", vec![])
            .await?;
        let latest = parse_quantity(&latest)?;
        Ok(latest.saturating_sub(self.confirmations))
    }

    async fn pull_header(&self, number: u64) -> Result<BlockHeader, ScanError> {
        let block: Value = self
            .transport
            .call(
                self.id(),
                "eth_getBlockByNumber",
                vec![json!(format!("0x{number:x}")), json!(false)],
            )
            .await?;
        if block.is_null() {
            return Err(ScanError::HeaderNotFound { number });
        }
        let header = header_from_json(&block)?;
        trace!(block = header.number, hash = %header.hash, url = self.transport.url(), "header pulled");
        Ok(header)
    }
}

/// Parse a hex quantity (`0x…`) into a `u64`.
pub fn parse_quantity(s: &str) -> Result<u64, ScanError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| ScanError::InvalidResponse(format!("quantity without 0x prefix: {s:?}")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| ScanError::InvalidResponse(format!("bad quantity {s:?}: {e}")))
}

/// Convert an `eth_getBlockByNumber` result into a [`BlockHeader`].
pub fn header_from_json(v: &Value) -> Result<BlockHeader, ScanError> {
    let field = |name: &str| {
        v[name]
            .as_str()
            .ok_or_else(|| ScanError::InvalidResponse(format!("block without `{name}`")))
    };

    let timestamp = parse_quantity(field("timestamp")?)?;
    let tx_count = v["transactions"].as_array().map_or(0, Vec::len);

    Ok(BlockHeader {
        number: parse_quantity(field("number")?)?,
        hash: field("hash")?.to_string(),
        parent_hash: field("parentHash")?.to_string(),
        timestamp: i64::try_from(timestamp)
            .map_err(|_| ScanError::InvalidResponse(format!("timestamp out of range: {timestamp}")))?,
        tx_count: u32::try_from(tx_count).unwrap_or(u32::MAX),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quantity_basic() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0xf42400").unwrap(), 16_000_000);
        assert!(parse_quantity("1234").is_err());
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn header_from_block_json() {
        let block = json!({
            "number": "0xf4373c",
            "hash": "0xbeef",
            "parentHash": "0xdead",
            "timestamp": "0x6553f100",
            "transactions": ["0x1", "0x2", "0x3"]
        });
        let header = header_from_json(&block).unwrap();
        assert_eq!(header.number, 16_004_924);
        assert_eq!(header.hash, "0xbeef");
        assert_eq!(header.parent_hash, "0xdead");
        assert_eq!(header.timestamp, 1_700_000_000);
        assert_eq!(header.tx_count, 3);
    }

    #[test]
    fn header_missing_hash_is_rejected() {
        let block = json!({ "number": "0x1", "parentHash": "0x0", "timestamp": "0x0" });
        assert!(matches!(header_from_json(&block), Err(ScanError::InvalidResponse(_))));
    }
}
