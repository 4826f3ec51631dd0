//! # Tezsnap
//!
//! A streaming snapshot engine for bootstrapping blockchain nodes
//! without replaying the full chain history.
//!
//! ## Features
//!
//! - **Single-pass export**: the context Merkle tree is walked once,
//!   deduplicated by sub-tree hash
//! - **Bounded memory**: 1 MiB buffered framing on both sides,
//!   history restored in 5,000-block chunks
//! - **Self-describing stream**: versioned metadata frame, typed
//!   command alphabet, hard reject on version mismatch
//! - **Store-agnostic**: the backing Merkle store and block types are
//!   supplied through the [`ContextStore`] adapter
//!
//! ## Quick Start
//!
//! ```ignore
//! use tezsnap::{export_snapshot, import_snapshot, HistoryMode};
//!
//! // Export the context reachable from `head` plus its history.
//! let file = std::fs::File::create("chain.snapshot")?;
//! export_snapshot(&store, file, &head, &caboose, HistoryMode::Full, |header| {
//!     Ok(chain.predecessor_of(header))
//! })?;
//!
//! // Restore it into a fresh store.
//! let file = std::fs::File::open("chain.snapshot")?;
//! let outcome = import_snapshot(
//!     &fresh_store,
//!     file,
//!     |chunk| block_store.persist(chunk),
//!     |pred, hash, pruned| policy.check(pred, hash, pruned),
//! )?;
//! # Ok::<(), tezsnap::SnapshotError>(())
//! ```
//!
//! The engine owns only the stream: descriptors are opened and closed
//! by the caller, and partial output after a failed export is the
//! caller's to delete.

pub mod api;
pub mod snapshot;
pub mod store;
pub mod stream;

pub use api::error::{SnapshotError, SnapshotResult};
pub use api::types::{HistoryMode, SnapshotMetadata, CURRENT_VERSION};
pub use snapshot::export::export_snapshot;
pub use snapshot::import::{import_snapshot, ImportOutcome, PRUNED_CHUNK_SIZE};
pub use store::{ContextStore, MemoryContextStore, TreeKind};
pub use stream::codec::{Decoder, WireDecode, WireEncode};
pub use stream::{FrameReader, FrameWriter};
