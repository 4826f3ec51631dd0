//! Streaming context snapshot export and restore.

mod metadata;

pub mod export;
pub mod import;

pub use export::export_snapshot;
pub use import::{import_snapshot, ImportOutcome, PRUNED_CHUNK_SIZE};
