//! The metadata frame that opens every snapshot.
//!
//! Checked before either side touches payload: a version mismatch is a
//! hard reject and must happen before any write hits the destination
//! store.

use crate::api::error::{SnapshotError, SnapshotResult};
use crate::api::types::{HistoryMode, SnapshotMetadata, CURRENT_VERSION};
use crate::stream::codec::{self, Decoder};

pub(crate) fn encode_metadata(meta: &SnapshotMetadata, out: &mut Vec<u8>) {
    codec::put_bytes(out, meta.version.as_bytes());
    out.push(meta.mode.wire_tag());
}

pub(crate) fn decode_metadata(payload: &[u8]) -> SnapshotResult<SnapshotMetadata> {
    let mut input = Decoder::new(payload);
    let version = input.read_string()?;
    let mode = HistoryMode::from_wire_tag(input.read_u8()?)
        .ok_or(SnapshotError::InconsistentSnapshotFile)?;
    if !input.is_empty() {
        return Err(SnapshotError::InconsistentSnapshotFile);
    }
    Ok(SnapshotMetadata { version, mode })
}

pub(crate) fn check_version(meta: &SnapshotMetadata) -> SnapshotResult<()> {
    if meta.version != CURRENT_VERSION {
        return Err(SnapshotError::InvalidSnapshotVersion {
            got: meta.version.clone(),
            expected: CURRENT_VERSION.to_string(),
        });
    }
    Ok(())
}
