//! Shared types for the scanning pipeline.

use serde::{Deserialize, Serialize};

// ─── BlockHeader ──────────────────────────────────────────────────────────────

/// A block header as emitted by the scanner, one per scanned block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block number.
    pub number: u64,
    /// Block hash (`0x…`).
    pub hash: String,
    /// Parent block hash (`0x…`).
    pub parent_hash: String,
    /// Unix timestamp of the block (seconds since epoch).
    pub timestamp: i64,
    /// Number of transactions in the block.
    pub tx_count: u32,
}

impl BlockHeader {
    /// Returns `true` if `parent` is the direct parent of `self`.
    pub fn extends(&self, parent: &BlockHeader) -> bool {
        parent.number.checked_add(1) == Some(self.number) && self.parent_hash == parent.hash
    }
}

// ─── ScannerState ─────────────────────────────────────────────────────────────

/// Mode of the block scanner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerState {
    /// Actively pulling historical headers toward the head.
    #[default]
    Scanning,
    /// Within the hysteresis band of the head; the cursor only follows
    /// externally observed blocks.
    Idling,
}

impl std::fmt::Display for ScannerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scanning => write!(f, "scanning"),
            Self::Idling => write!(f, "idling"),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn header(number: u64, hash: &str, parent: &str) -> BlockHeader {
        BlockHeader {
            number,
            hash: hash.into(),
            parent_hash: parent.into(),
            timestamp: 1_700_000_000,
            tx_count: 0,
        }
    }

    #[test]
    fn header_extends_parent() {
        let parent = header(100, "0xaaa", "0x000");
        let child = header(101, "0xbbb", "0xaaa");
        assert!(child.extends(&parent));
        assert!(!parent.extends(&child));
    }

    #[test]
    fn header_extends_false_on_gap() {
        let a = header(100, "0xaaa", "0x000");
        let b = header(102, "0xccc", "0xaaa");
        assert!(!b.extends(&a));
    }

    #[test]
    fn state_display_and_serde() {
        assert_eq!(ScannerState::Scanning.to_string(), "scanning");
        assert_eq!(ScannerState::Idling.to_string(), "idling");
        let json = serde_json::to_string(&ScannerState::Idling).unwrap();
        assert_eq!(json, "\"idling\"");
        assert_eq!(ScannerState::default(), ScannerState::Scanning);
    }
}
