use std::fmt;

use serde::{Deserialize, Serialize};

/// Version literal recorded in the first frame of every snapshot.
///
/// Any mismatch on import is a hard reject.
pub const CURRENT_VERSION: &str = "tezos-snapshot-1.0.0";

/// History retention policy recorded in the snapshot metadata.
///
/// The engine carries the mode through the stream without interpreting
/// it; retention decisions belong to the surrounding node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryMode {
    Full,
    Rolling,
    Archive,
}

impl HistoryMode {
    pub(crate) fn wire_tag(self) -> u8 {
        match self {
            Self::Full => 0,
            Self::Rolling => 1,
            Self::Archive => 2,
        }
    }

    pub(crate) fn from_wire_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Full),
            1 => Some(Self::Rolling),
            2 => Some(Self::Archive),
            _ => None,
        }
    }
}

impl fmt::Display for HistoryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Rolling => write!(f, "rolling"),
            Self::Archive => write!(f, "archive"),
        }
    }
}

/// Contents of the metadata frame that opens every snapshot stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub version: String,
    pub mode: HistoryMode,
}

impl SnapshotMetadata {
    pub fn current(mode: HistoryMode) -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            mode,
        }
    }
}
