//! chainscan-core — the block scanner behind the marketplace indexer.
//!
//! # Architecture
//!
//! ```text
//! Manager ──owns──▶ BlockScanner task
//!                      ├── ScanCursor      (current / target / hysteresis band)
//!                      ├── HeaderSource    (chain head + header by number)
//!                      ├── LastSeenBlock   (starting checkpoint)
//!                      └── ScannerHandle   (headers out, state changes out,
//!                                           observed blocks in, progress)
//! ```
//!
//! The scanner walks from the stored checkpoint toward the chain head,
//! emitting one header per block, and parks itself in `Idling` once it is
//! within the hysteresis band of the head.

pub mod checkpoint;
pub mod config;
pub mod cursor;
pub mod error;
pub mod manager;
pub mod scanner;
pub mod source;
pub mod types;

pub use checkpoint::{
    Checkpoint, CheckpointManager, CheckpointReader, CheckpointStore, LastSeenBlock,
    MemoryCheckpointStore,
};
pub use config::{ScannerBuilder, ScannerConfig};
pub use cursor::ScanCursor;
pub use error::ScanError;
pub use manager::{Manager, Service};
pub use scanner::{BlockScanner, ScanProgress, ScannerHandle};
pub use source::HeaderSource;
pub use types::{BlockHeader, ScannerState};
