pub mod error;
pub mod types;

pub use error::{SnapshotError, SnapshotResult};
pub use types::{HistoryMode, SnapshotMetadata, CURRENT_VERSION};
