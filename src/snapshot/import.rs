//! Snapshot reader.
//!
//! Consumes the stream in two passes. The first rebuilds the context
//! tree inside a scoped write batch and commits it at the root record;
//! the second replays the pruned-block history through the caller's
//! persistence and validation callbacks. The version guard runs before
//! anything touches the destination store.

use std::io::Read;

use crate::api::error::{SnapshotError, SnapshotResult};
use crate::api::types::HistoryMode;
use crate::store::ContextStore;
use crate::stream::codec::{Decoder, WireDecode};
use crate::stream::reader::FrameReader;
use crate::stream::{TAG_BLOB, TAG_END, TAG_LOOT, TAG_NODE, TAG_PROOT, TAG_ROOT};

use super::metadata;

/// Pruned blocks are handed to the persistence callback in chunks of
/// this many, so multi-million-block histories restore with bounded
/// memory.
pub const PRUNED_CHUNK_SIZE: usize = 5_000;

/// Everything a restored snapshot yields besides the context itself.
pub struct ImportOutcome<S: ContextStore> {
    /// Header returned by the store when the context was committed.
    pub block_header: S::BlockHeader,
    /// The caboose block's header and operations.
    pub block_data: S::BlockData,
    /// History mode recorded in the snapshot metadata.
    pub history_mode: HistoryMode,
    /// Header of the oldest pruned block, `None` for an empty history.
    pub oldest_header: Option<S::BlockHeader>,
    /// Hashes of the restored blocks, oldest first.
    pub block_hashes: Vec<S::BlockHash>,
    /// Protocol activations, newest first (backward-walk order).
    pub protocol_data: Vec<S::ProtocolData>,
}

/// Restores a snapshot from `input` into `store`.
///
/// `store_pruned_blocks` persists history chunks in the order they are
/// handed over; `validate` sees every pruned block together with its
/// successor's header (`None` for the first one) and may abort the
/// import by returning an error.
pub fn import_snapshot<S, R, P, V>(
    store: &S,
    input: R,
    mut store_pruned_blocks: P,
    mut validate: V,
) -> SnapshotResult<ImportOutcome<S>>
where
    S: ContextStore,
    R: Read,
    P: FnMut(Vec<(S::BlockHash, S::PrunedBlock)>) -> SnapshotResult<()>,
    V: FnMut(Option<&S::BlockHeader>, &S::BlockHash, &S::PrunedBlock) -> SnapshotResult<()>,
{
    let mut reader = FrameReader::new(input);

    let meta = metadata::decode_metadata(reader.read_frame()?)?;
    metadata::check_version(&meta)?;

    // First pass: rebuild the tree, commit at the root record.
    let (block_header, block_data) = store.batch(|batch| {
        let mut ctxt = store.make_context();
        loop {
            match read_command::<S, R>(&mut reader)? {
                Command::Blob(data) => {
                    let tree = store.add_bytes(batch, &data)?;
                    ctxt = store.update_context(ctxt, tree);
                }
                Command::Node(children) => {
                    let tree = store
                        .add_dir(batch, &children)?
                        .ok_or(SnapshotError::RestoreContextFailure)?;
                    ctxt = store.update_context(ctxt, tree);
                }
                Command::Root {
                    header,
                    info,
                    parents,
                    block_data,
                } => {
                    let header = store
                        .set_context(info, parents, ctxt, header)?
                        .ok_or(SnapshotError::InconsistentSnapshotData)?;
                    return Ok((header, block_data));
                }
                _ => return Err(SnapshotError::InconsistentSnapshotData),
            }
        }
    })?;

    // Second pass: history.
    let mut pred_header: Option<S::BlockHeader> = None;
    let mut block_hashes: Vec<S::BlockHash> = Vec::new();
    let mut protocol_data: Vec<S::ProtocolData> = Vec::new();
    let mut chunk: Vec<(S::BlockHash, S::PrunedBlock)> = Vec::new();
    loop {
        match read_command::<S, R>(&mut reader)? {
            Command::Proot(pruned) => {
                let header = store.pruned_header(&pruned);
                let hash = store.block_hash(&header);
                validate(pred_header.as_ref(), &hash, &pruned)?;
                block_hashes.push(hash.clone());
                chunk.push((hash, pruned));
                pred_header = Some(header);
                if chunk.len() == PRUNED_CHUNK_SIZE {
                    store_pruned_blocks(std::mem::take(&mut chunk))?;
                }
            }
            Command::Loot(data) => {
                store_pruned_blocks(std::mem::take(&mut chunk))?;
                protocol_data.push(data);
            }
            Command::End => break,
            _ => return Err(SnapshotError::InconsistentSnapshotData),
        }
    }
    if !chunk.is_empty() {
        store_pruned_blocks(std::mem::take(&mut chunk))?;
    }

    // Stream order is newest to oldest; callers want oldest first.
    block_hashes.reverse();

    tracing::info!(
        pruned_blocks = block_hashes.len(),
        protocol_upgrades = protocol_data.len(),
        mode = %meta.mode,
        "Snapshot import complete"
    );

    Ok(ImportOutcome {
        block_header,
        block_data,
        history_mode: meta.mode,
        oldest_header: pred_header,
        block_hashes,
        protocol_data,
    })
}

enum Command<S: ContextStore> {
    Root {
        header: S::BlockHeader,
        info: S::CommitInfo,
        parents: Vec<S::CommitHash>,
        block_data: S::BlockData,
    },
    Node(Vec<(String, S::Hash)>),
    Blob(Vec<u8>),
    Proot(S::PrunedBlock),
    Loot(S::ProtocolData),
    End,
}

fn read_command<S: ContextStore, R: Read>(
    reader: &mut FrameReader<R>,
) -> SnapshotResult<Command<S>> {
    let mut input = Decoder::new(reader.read_frame()?);
    let command = match input.read_u8()? {
        TAG_ROOT => {
            let header = S::BlockHeader::decode(&mut input)?;
            let info = S::CommitInfo::decode(&mut input)?;
            let count = input.read_count()?;
            let mut parents = Vec::with_capacity(count);
            for _ in 0..count {
                parents.push(S::CommitHash::decode(&mut input)?);
            }
            let block_data = S::BlockData::decode(&mut input)?;
            Command::Root {
                header,
                info,
                parents,
                block_data,
            }
        }
        TAG_NODE => {
            let count = input.read_count()?;
            let mut children = Vec::with_capacity(count);
            for _ in 0..count {
                let name = input.read_string()?;
                let hash = S::Hash::decode(&mut input)?;
                children.push((name, hash));
            }
            Command::Node(children)
        }
        TAG_BLOB => Command::Blob(input.read_bytes()?.to_vec()),
        TAG_PROOT => Command::Proot(S::PrunedBlock::decode(&mut input)?),
        TAG_LOOT => Command::Loot(S::ProtocolData::decode(&mut input)?),
        TAG_END => Command::End,
        _ => return Err(SnapshotError::InconsistentSnapshotFile),
    };
    if !input.is_empty() {
        return Err(SnapshotError::InconsistentSnapshotFile);
    }
    Ok(command)
}
