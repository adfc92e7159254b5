//! SQLite storage backend for ChainScan.
//!
//! Persists scanner checkpoints and the block headers the scanner emitted to a
//! single SQLite file. Uses `sqlx` with WAL mode.
//!
//! # Usage
//! ```rust,no_run
//! use chainscan_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./chainscan.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;

use chainscan_core::{BlockHeader, Checkpoint, CheckpointStore, ScanError};

fn storage_err(e: sqlx::Error) -> ScanError {
    ScanError::Storage(e.to_string())
}

/// SQLite-backed storage for checkpoints and block headers.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./chainscan.db"`) or a full
    /// SQLite URL (`"sqlite:./chainscan.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, ScanError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// All data is lost when the pool is dropped. The pool holds a single
    /// connection, since every `:memory:` connection is its own database.
    pub async fn in_memory() -> Result<Self, ScanError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), ScanError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                chain_id     TEXT    NOT NULL,
                scanner_id   TEXT    NOT NULL,
                block_number INTEGER NOT NULL,
                block_hash   TEXT    NOT NULL,
                updated_at   INTEGER NOT NULL,
                PRIMARY KEY (chain_id, scanner_id)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS block_headers (
                chain_id     TEXT    NOT NULL,
                block_number INTEGER NOT NULL,
                block_hash   TEXT    NOT NULL,
                parent_hash  TEXT    NOT NULL,
                timestamp    INTEGER NOT NULL,
                tx_count     INTEGER NOT NULL,
                PRIMARY KEY (chain_id, block_number)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    // ─── Header storage ─────────────────────────────────────────────────────────

    /// Store a scanned header. Re-inserting a height replaces the row, so a
    /// rescan after restart is harmless.
    pub async fn insert_header(&self, chain_id: &str, header: &BlockHeader) -> Result<(), ScanError> {
        sqlx::query(
            "INSERT OR REPLACE INTO block_headers
             (chain_id, block_number, block_hash, parent_hash, timestamp, tx_count)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(chain_id)
        .bind(to_sql(header.number)?)
        .bind(&header.hash)
        .bind(&header.parent_hash)
        .bind(header.timestamp)
        .bind(i64::from(header.tx_count))
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        debug!(chain_id, block = header.number, "header stored");
        Ok(())
    }

    /// Look up a stored header by height.
    pub async fn get_header(
        &self,
        chain_id: &str,
        number: u64,
    ) -> Result<Option<BlockHeader>, ScanError> {
        let row = sqlx::query(
            "SELECT block_number, block_hash, parent_hash, timestamp, tx_count
             FROM block_headers WHERE chain_id = ? AND block_number = ?",
        )
        .bind(chain_id)
        .bind(to_sql(number)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.as_ref().map(header_from_row).transpose()
    }

    /// Highest stored header for a chain.
    pub async fn latest_header(&self, chain_id: &str) -> Result<Option<BlockHeader>, ScanError> {
        let row = sqlx::query(
            "SELECT block_number, block_hash, parent_hash, timestamp, tx_count
             FROM block_headers WHERE chain_id = ?
             ORDER BY block_number DESC LIMIT 1",
        )
        .bind(chain_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.as_ref().map(header_from_row).transpose()
    }

    /// Number of stored headers for a chain.
    pub async fn header_count(&self, chain_id: &str) -> Result<u64, ScanError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM block_headers WHERE chain_id = ?")
            .bind(chain_id)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;

        let cnt: i64 = row.get("cnt");
        from_sql(cnt)
    }
}

fn to_sql(n: u64) -> Result<i64, ScanError> {
    i64::try_from(n).map_err(|_| ScanError::Storage(format!("block number {n} exceeds SQLite INTEGER")))
}

fn from_sql(n: i64) -> Result<u64, ScanError> {
    u64::try_from(n).map_err(|_| ScanError::Storage(format!("negative value {n} in storage")))
}

fn header_from_row(r: &SqliteRow) -> Result<BlockHeader, ScanError> {
    let tx_count: i64 = r.get("tx_count");
    Ok(BlockHeader {
        number: from_sql(r.get("block_number"))?,
        hash: r.get("block_hash"),
        parent_hash: r.get("parent_hash"),
        timestamp: r.get("timestamp"),
        tx_count: u32::try_from(tx_count)
            .map_err(|_| ScanError::Storage(format!("tx_count {tx_count} out of range")))?,
    })
}

// ─── CheckpointStore impl ────────────────────────────────────────────────────

#[async_trait]
impl CheckpointStore for SqliteStorage {
    async fn load(
        &self,
        chain_id: &str,
        scanner_id: &str,
    ) -> Result<Option<Checkpoint>, ScanError> {
        let row = sqlx::query(
            "SELECT chain_id, scanner_id, block_number, block_hash, updated_at
             FROM checkpoints WHERE chain_id = ? AND scanner_id = ?",
        )
        .bind(chain_id)
        .bind(scanner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(|r| {
            Ok(Checkpoint {
                chain_id: r.get("chain_id"),
                scanner_id: r.get("scanner_id"),
                block_number: from_sql(r.get("block_number"))?,
                block_hash: r.get("block_hash"),
                updated_at: r.get("updated_at"),
            })
        })
        .transpose()
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), ScanError> {
        sqlx::query(
            "INSERT OR REPLACE INTO checkpoints
             (chain_id, scanner_id, block_number, block_hash, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&checkpoint.chain_id)
        .bind(&checkpoint.scanner_id)
        .bind(to_sql(checkpoint.block_number)?)
        .bind(&checkpoint.block_hash)
        .bind(checkpoint.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        debug!(
            chain_id = %checkpoint.chain_id,
            scanner_id = %checkpoint.scanner_id,
            block = checkpoint.block_number,
            "checkpoint saved"
        );
        Ok(())
    }

    async fn delete(&self, chain_id: &str, scanner_id: &str) -> Result<(), ScanError> {
        sqlx::query("DELETE FROM checkpoints WHERE chain_id = ? AND scanner_id = ?")
            .bind(chain_id)
            .bind(scanner_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
