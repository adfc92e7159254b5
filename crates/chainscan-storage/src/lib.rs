//! chainscan-storage — persistence for ChainScan.
//!
//! Backends:
//! - [`sqlite`] — SQLite via `sqlx` (checkpoints and scanned block headers)
//!
//! An in-memory checkpoint store for tests lives in
//! `chainscan_core::MemoryCheckpointStore`.

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;
