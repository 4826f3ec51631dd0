use thiserror::Error;

pub type SnapshotResult<T> = Result<T, SnapshotError>;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("system write error: {reason}")]
    SystemWriteError { reason: String },

    #[error("system read error: {reason}")]
    SystemReadError { reason: String },

    #[error("no context found for block header ({} bytes)", header.len())]
    ContextNotFound { header: Vec<u8> },

    #[error("bad {ty} hash (got {got}, expected {expected})")]
    BadHash {
        ty: &'static str,
        got: String,
        expected: String,
    },

    #[error("inconsistent snapshot file")]
    InconsistentSnapshotFile,

    #[error("inconsistent snapshot data")]
    InconsistentSnapshotData,

    #[error("missing snapshot data")]
    MissingSnapshotData,

    #[error("invalid snapshot version (got {got:?}, expected {expected:?})")]
    InvalidSnapshotVersion { got: String, expected: String },

    #[error("failed to restore context")]
    RestoreContextFailure,
}

impl SnapshotError {
    pub(crate) fn read(err: std::io::Error) -> Self {
        Self::SystemReadError {
            reason: err.to_string(),
        }
    }

    pub(crate) fn write(err: std::io::Error) -> Self {
        Self::SystemWriteError {
            reason: err.to_string(),
        }
    }
}
