//! Downstream end of the header queue: persist headers, advance the checkpoint.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use chainscan_core::{BlockHeader, CheckpointManager, ScannerState, Service};
use chainscan_storage::SqliteStorage;

pub const CONSUMER_NAME: &str = "header consumer";

/// Stores every emitted header and checkpoints the last stored one.
pub struct HeaderConsumer {
    chain: String,
    storage: Arc<SqliteStorage>,
    checkpoints: CheckpointManager,
    headers: mpsc::Receiver<BlockHeader>,
    state_changes: mpsc::Receiver<ScannerState>,
    last_stored: Option<BlockHeader>,
}

impl HeaderConsumer {
    pub fn new(
        chain: impl Into<String>,
        storage: Arc<SqliteStorage>,
        checkpoints: CheckpointManager,
        headers: mpsc::Receiver<BlockHeader>,
        state_changes: mpsc::Receiver<ScannerState>,
    ) -> Self {
        Self {
            chain: chain.into(),
            storage,
            checkpoints,
            headers,
            state_changes,
            last_stored: None,
        }
    }

    async fn store(&mut self, header: BlockHeader) {
        if let Some(parent) = &self.last_stored {
            if !header.extends(parent) {
                warn!(
                    block = header.number,
                    parent_hash = %header.parent_hash,
                    previous_hash = %parent.hash,
                    "header does not extend the previous one"
                );
            }
        }

        if let Err(e) = self.storage.insert_header(&self.chain, &header).await {
            // Not checkpointed, so it is scanned again after a restart.
            error!(block = header.number, error = %e, "can not store header");
            return;
        }
        if let Err(e) = self.checkpoints.maybe_save(header.number, &header.hash).await {
            error!(block = header.number, error = %e, "can not save checkpoint");
        }
        self.last_stored = Some(header);
    }

    async fn final_checkpoint(&self) {
        let Some(last) = &self.last_stored else {
            return;
        };
        match self.checkpoints.force_save(last.number, &last.hash).await {
            Ok(()) => info!(block = last.number, "final checkpoint saved"),
            Err(e) => error!(block = last.number, error = %e, "can not save final checkpoint"),
        }
    }
}

#[async_trait]
impl Service for HeaderConsumer {
    fn name(&self) -> &'static str {
        CONSUMER_NAME
    }

    async fn run(mut self: Box<Self>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(state) = self.state_changes.recv() => {
                    info!(chain = %self.chain, %state, "scanner state changed");
                }
                header = self.headers.recv() => match header {
                    Some(header) => self.store(header).await,
                    None => break,
                },
            }
        }
        self.final_checkpoint().await;
    }
}

#[cfg(test)]
mod tests {
    use chainscan_core::{CheckpointStore, Manager};

    use super::*;

    fn header(number: u64) -> BlockHeader {
        BlockHeader {
            number,
            hash: format!("0x{number:x}"),
            parent_hash: format!("0x{:x}", number - 1),
            timestamp: 0,
            tx_count: 0,
        }
    }

    #[tokio::test]
    async fn stores_headers_and_checkpoints_on_exit() {
        let storage = Arc::new(SqliteStorage::in_memory().await.unwrap());
        let store: Arc<dyn CheckpointStore> = storage.clone();
        let checkpoints = CheckpointManager::new(store.clone(), "fantom", "blocks", 100);

        let (headers_tx, headers_rx) = mpsc::channel(8);
        let (_state_tx, state_rx) = mpsc::channel(1);
        let mut manager = Manager::new();
        manager.start(HeaderConsumer::new("fantom", storage.clone(), checkpoints, headers_rx, state_rx));

        for n in 100..=102 {
            headers_tx.send(header(n)).await.unwrap();
        }
        drop(headers_tx);

        assert_eq!(manager.join().await, vec![CONSUMER_NAME]);
        assert_eq!(storage.header_count("fantom").await.unwrap(), 3);
        let cp = store.load("fantom", "blocks").await.unwrap().unwrap();
        assert_eq!(cp.block_number, 102);
        assert_eq!(cp.block_hash, "0x66");
    }
}
