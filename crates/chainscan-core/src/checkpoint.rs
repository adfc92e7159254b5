//! Checkpoints — the last block the downstream pipeline durably processed.
//!
//! The scanner only reads the checkpoint once, to pick its starting height.
//! Advancing it is the job of whoever drains the header queue, through
//! [`CheckpointManager`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// A persisted checkpoint for a scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Chain slug (e.g. `"fantom"`).
    pub chain_id: String,
    /// Unique scanner identifier.
    pub scanner_id: String,
    /// Last durably processed block number.
    pub block_number: u64,
    /// Hash of that block.
    pub block_hash: String,
    /// Unix timestamp of when this checkpoint was saved.
    pub updated_at: i64,
}

/// Trait for storing and loading checkpoints.
///
/// Implementations include [`MemoryCheckpointStore`] and the SQLite store in
/// `chainscan-storage`.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the checkpoint for a chain + scanner pair.
    async fn load(&self, chain_id: &str, scanner_id: &str)
        -> Result<Option<Checkpoint>, ScanError>;

    /// Save (upsert) a checkpoint.
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), ScanError>;

    /// Delete a checkpoint (e.g. when resetting a scanner).
    async fn delete(&self, chain_id: &str, scanner_id: &str) -> Result<(), ScanError>;
}

/// Read side of the checkpoint as the scanner sees it.
#[async_trait]
pub trait LastSeenBlock: Send + Sync {
    /// Last durably processed height; `0` means unknown.
    async fn last_seen_block_number(&self) -> Result<u64, ScanError>;
}

/// [`LastSeenBlock`] backed by a [`CheckpointStore`] entry.
#[derive(Clone)]
pub struct CheckpointReader {
    store: Arc<dyn CheckpointStore>,
    chain_id: String,
    scanner_id: String,
}

impl CheckpointReader {
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        chain_id: impl Into<String>,
        scanner_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            chain_id: chain_id.into(),
            scanner_id: scanner_id.into(),
        }
    }
}

#[async_trait]
impl LastSeenBlock for CheckpointReader {
    async fn last_seen_block_number(&self) -> Result<u64, ScanError> {
        let cp = self.store.load(&self.chain_id, &self.scanner_id).await?;
        Ok(cp.map(|cp| cp.block_number).unwrap_or(0))
    }
}

/// Manages checkpoint writes for the consumer of the header queue.
pub struct CheckpointManager {
    store: Arc<dyn CheckpointStore>,
    chain_id: String,
    scanner_id: String,
    /// How often to save (every N processed headers).
    save_interval: u64,
    /// Headers processed since the last save.
    counter: u64,
}

impl CheckpointManager {
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        chain_id: impl Into<String>,
        scanner_id: impl Into<String>,
        save_interval: u64,
    ) -> Self {
        Self {
            store,
            chain_id: chain_id.into(),
            scanner_id: scanner_id.into(),
            save_interval: save_interval.max(1),
            counter: 0,
        }
    }

    /// Load the saved checkpoint (returns `None` if none exists).
    pub async fn load(&self) -> Result<Option<Checkpoint>, ScanError> {
        self.store.load(&self.chain_id, &self.scanner_id).await
    }

    /// A reader for the same checkpoint, to hand to the scanner.
    pub fn reader(&self) -> CheckpointReader {
        CheckpointReader::new(
            Arc::clone(&self.store),
            self.chain_id.clone(),
            self.scanner_id.clone(),
        )
    }

    /// Conditionally save a checkpoint every `save_interval` headers.
    ///
    /// Call this after each header is durably processed. Returns `true` when
    /// a save happened.
    pub async fn maybe_save(&mut self, block_number: u64, block_hash: &str) -> Result<bool, ScanError> {
        self.counter += 1;
        if self.counter < self.save_interval {
            return Ok(false);
        }
        self.force_save(block_number, block_hash).await?;
        self.counter = 0;
        Ok(true)
    }

    /// Immediately save a checkpoint (used on shutdown).
    pub async fn force_save(&self, block_number: u64, block_hash: &str) -> Result<(), ScanError> {
        let cp = Checkpoint {
            chain_id: self.chain_id.clone(),
            scanner_id: self.scanner_id.clone(),
            block_number,
            block_hash: block_hash.to_string(),
            updated_at: chrono::Utc::now().timestamp(),
        };
        self.store.save(cp).await
    }

    /// Drop the checkpoint; the next scanner start uses the default height.
    pub async fn reset(&self) -> Result<(), ScanError> {
        self.store.delete(&self.chain_id, &self.scanner_id).await
    }
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

/// In-memory checkpoint store for tests and ephemeral scanners.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    data: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(chain_id: &str, scanner_id: &str) -> String {
        format!("{chain_id}:{scanner_id}")
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Checkpoint>>, ScanError> {
        self.data
            .lock()
            .map_err(|_| ScanError::Storage("checkpoint map poisoned".into()))
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(
        &self,
        chain_id: &str,
        scanner_id: &str,
    ) -> Result<Option<Checkpoint>, ScanError> {
        Ok(self.lock()?.get(&Self::key(chain_id, scanner_id)).cloned())
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), ScanError> {
        let key = Self::key(&checkpoint.chain_id, &checkpoint.scanner_id);
        self.lock()?.insert(key, checkpoint);
        Ok(())
    }

    async fn delete(&self, chain_id: &str, scanner_id: &str) -> Result<(), ScanError> {
        self.lock()?.remove(&Self::key(chain_id, scanner_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(interval: u64) -> CheckpointManager {
        CheckpointManager::new(Arc::new(MemoryCheckpointStore::new()), "fantom", "blocks", interval)
    }

    #[tokio::test]
    async fn missing_checkpoint_reads_as_zero() {
        let mgr = manager(10);
        assert!(mgr.load().await.unwrap().is_none());
        assert_eq!(mgr.reader().last_seen_block_number().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn force_save_is_visible_to_reader() {
        let mgr = manager(10);
        mgr.force_save(16_005_000, "0xabc").await.unwrap();

        let cp = mgr.load().await.unwrap().unwrap();
        assert_eq!(cp.block_number, 16_005_000);
        assert_eq!(cp.block_hash, "0xabc");
        assert_eq!(cp.chain_id, "fantom");
        assert_eq!(mgr.reader().last_seen_block_number().await.unwrap(), 16_005_000);
    }

    #[tokio::test]
    async fn save_interval() {
        let mut mgr = manager(5);
        for i in 1..=4 {
            assert!(!mgr.maybe_save(i, "0xhash").await.unwrap());
        }
        assert!(mgr.load().await.unwrap().is_none());

        assert!(mgr.maybe_save(5, "0xhash5").await.unwrap());
        assert_eq!(mgr.load().await.unwrap().unwrap().block_number, 5);
    }

    #[tokio::test]
    async fn reset_clears_checkpoint() {
        let mgr = manager(1);
        mgr.force_save(42, "0x2a").await.unwrap();
        mgr.reset().await.unwrap();
        assert_eq!(mgr.reader().last_seen_block_number().await.unwrap(), 0);
    }
}
