//! Snapshot writer.
//!
//! Walks the context tree rooted at the requested block once, in
//! depth-first post-order, deduplicating sub-trees by content hash so
//! that shared state is emitted a single time. The tree section is
//! followed by the root record, the pruned-block history walked
//! backwards from the caboose, the protocol activations, and the end
//! marker.

use std::io::Write;

use hashbrown::HashSet;

use crate::api::error::{SnapshotError, SnapshotResult};
use crate::api::types::{HistoryMode, SnapshotMetadata};
use crate::store::{ContextStore, TreeKind};
use crate::stream::codec::{self, WireEncode};
use crate::stream::writer::FrameWriter;
use crate::stream::{TAG_BLOB, TAG_END, TAG_LOOT, TAG_NODE, TAG_PROOT, TAG_ROOT};

use super::metadata;

/// Writes a complete snapshot of the context reachable from `header`
/// to `out`, followed by the block history supplied by
/// `pruned_iterator`. Returns the number of bytes produced.
///
/// `pruned_iterator` maps a header to the predecessor's pruned block
/// (`None` at the tail of the kept history) and any protocol
/// activation recorded at that step.
pub fn export_snapshot<S, W, I>(
    store: &S,
    out: W,
    header: &S::BlockHeader,
    block_data: &S::BlockData,
    mode: HistoryMode,
    mut pruned_iterator: I,
) -> SnapshotResult<u64>
where
    S: ContextStore,
    W: Write,
    I: FnMut(&S::BlockHeader) -> SnapshotResult<(Option<S::PrunedBlock>, Option<S::ProtocolData>)>,
{
    let mut exporter = Exporter {
        store,
        writer: FrameWriter::new(out),
        visited: HashSet::new(),
        nodes: 0,
        blobs: 0,
    };

    let mut payload = Vec::new();
    metadata::encode_metadata(&SnapshotMetadata::current(mode), &mut payload);
    exporter.writer.write_frame(&payload)?;

    let ctx = store.get_context(header)?.ok_or_else(|| {
        let mut bytes = Vec::new();
        header.encode(&mut bytes);
        SnapshotError::ContextNotFound { header: bytes }
    })?;

    exporter.write_tree(store.context_tree(&ctx))?;
    exporter.write_root(
        header,
        &store.context_info(&ctx),
        &store.context_parents(&ctx),
        block_data,
    )?;

    let mut protocol_data = Vec::new();
    let mut pruned_count: u64 = 0;
    let mut current = store.block_data_header(block_data);
    loop {
        let (pred, activation) = pruned_iterator(&current)?;
        if let Some(data) = activation {
            protocol_data.push(data);
        }
        match pred {
            None => break,
            Some(pruned) => {
                current = store.pruned_header(&pruned);
                exporter.write_proot(&pruned)?;
                pruned_count += 1;
            }
        }
    }
    for data in &protocol_data {
        exporter.write_loot(data)?;
    }
    exporter.write_end()?;
    exporter.writer.finish()?;

    let written = exporter.writer.bytes_written();
    tracing::info!(
        bytes = written,
        tree_nodes = exporter.nodes,
        blobs = exporter.blobs,
        pruned_blocks = pruned_count,
        protocol_upgrades = protocol_data.len(),
        "Snapshot export complete"
    );
    Ok(written)
}

struct Exporter<'a, S: ContextStore, W: Write> {
    store: &'a S,
    writer: FrameWriter<W>,
    visited: HashSet<S::Hash>,
    nodes: u64,
    blobs: u64,
}

enum Step<S: ContextStore> {
    /// Enumerate a sub-tree's children and schedule them.
    Descend(S::Tree),
    /// Reach one child; the visited check happens here so that a hash
    /// first covered by an earlier sibling's sub-tree is skipped.
    Child {
        tree: S::Tree,
        hash: S::Hash,
        kind: TreeKind,
    },
    /// Emit the node record once every child has been handled.
    Emit(Vec<(String, S::Hash)>),
}

impl<S: ContextStore, W: Write> Exporter<'_, S, W> {
    /// Depth-first post-order emission with an explicit stack; context
    /// trees get deep enough that recursion is not an option.
    fn write_tree(&mut self, root: S::Tree) -> SnapshotResult<()> {
        let mut stack = vec![Step::<S>::Descend(root)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Descend(tree) => {
                    let mut children = self.store.tree_list(&tree)?;
                    // Adapter order is unspecified; the stream is canonical.
                    children.sort_by(|a, b| a.0.cmp(&b.0));
                    let mut record = Vec::with_capacity(children.len());
                    let mut pending = Vec::with_capacity(children.len());
                    for (name, kind) in children {
                        let child = self
                            .store
                            .sub_tree(&tree, &[&name])?
                            .ok_or(SnapshotError::InconsistentSnapshotData)?;
                        let hash = self.store.tree_hash(&child);
                        record.push((name, hash.clone()));
                        pending.push(Step::Child {
                            tree: child,
                            hash,
                            kind,
                        });
                    }
                    stack.push(Step::Emit(record));
                    // Reversed so children pop in ascending step order.
                    while let Some(child) = pending.pop() {
                        stack.push(child);
                    }
                }
                Step::Child { tree, hash, kind } => {
                    if !self.visited.insert(hash) {
                        continue;
                    }
                    match kind {
                        TreeKind::Contents => {
                            let data = self
                                .store
                                .tree_content(&tree)?
                                .ok_or(SnapshotError::InconsistentSnapshotData)?;
                            self.write_blob(&data)?;
                        }
                        TreeKind::Node => stack.push(Step::Descend(tree)),
                    }
                }
                Step::Emit(record) => self.write_node(&record)?,
            }
        }
        Ok(())
    }

    fn write_blob(&mut self, data: &[u8]) -> SnapshotResult<()> {
        let mut payload = Vec::with_capacity(data.len() + 5);
        payload.push(TAG_BLOB);
        codec::put_bytes(&mut payload, data);
        self.blobs += 1;
        self.writer.write_frame(&payload)
    }

    fn write_node(&mut self, children: &[(String, S::Hash)]) -> SnapshotResult<()> {
        let mut payload = Vec::new();
        payload.push(TAG_NODE);
        codec::put_count(&mut payload, children.len());
        for (name, hash) in children {
            codec::put_bytes(&mut payload, name.as_bytes());
            hash.encode(&mut payload);
        }
        self.nodes += 1;
        self.writer.write_frame(&payload)
    }

    fn write_root(
        &mut self,
        header: &S::BlockHeader,
        info: &S::CommitInfo,
        parents: &[S::CommitHash],
        block_data: &S::BlockData,
    ) -> SnapshotResult<()> {
        let mut payload = Vec::new();
        payload.push(TAG_ROOT);
        header.encode(&mut payload);
        info.encode(&mut payload);
        codec::put_count(&mut payload, parents.len());
        for parent in parents {
            parent.encode(&mut payload);
        }
        block_data.encode(&mut payload);
        self.writer.write_frame(&payload)
    }

    fn write_proot(&mut self, pruned: &S::PrunedBlock) -> SnapshotResult<()> {
        let mut payload = Vec::new();
        payload.push(TAG_PROOT);
        pruned.encode(&mut payload);
        self.writer.write_frame(&payload)
    }

    fn write_loot(&mut self, data: &S::ProtocolData) -> SnapshotResult<()> {
        let mut payload = Vec::new();
        payload.push(TAG_LOOT);
        data.encode(&mut payload);
        self.writer.write_frame(&payload)
    }

    fn write_end(&mut self) -> SnapshotResult<()> {
        self.writer.write_frame(&[TAG_END])
    }
}
