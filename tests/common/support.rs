// Shared by every integration test crate; not all of them use every
// helper.
#![allow(dead_code)]

use std::path::PathBuf;

use tempfile::TempDir;

use tezsnap::store::memory::{
    BlockHash, CommitHash, MemoryBlockData, MemoryBlockHeader, MemoryCommitInfo,
    MemoryContextStore, MemoryProtocolData, MemoryPrunedBlock, NodeHash,
};
use tezsnap::store::{ContextStore, TreeKind};
use tezsnap::{Decoder, SnapshotResult, WireDecode, CURRENT_VERSION};

pub fn snapshot_file(name: &str) -> (TempDir, PathBuf) {
    let root = std::env::current_dir().unwrap().join("target/testdata");
    std::fs::create_dir_all(&root).unwrap();
    let dir = tempfile::tempdir_in(&root).unwrap();
    let path = dir.path().join(name);
    (dir, path)
}

pub fn test_header(level: u64, context_root: NodeHash) -> MemoryBlockHeader {
    let mut predecessor = [0u8; 32];
    predecessor[..8].copy_from_slice(&level.wrapping_sub(1).to_be_bytes());
    MemoryBlockHeader {
        level,
        predecessor: BlockHash(predecessor),
        context_root,
        timestamp: 1_600_000_000 + level,
    }
}

pub fn pruned_block(level: u64) -> MemoryPrunedBlock {
    MemoryPrunedBlock {
        header: test_header(level, NodeHash([0; 32])),
        proof: level.to_be_bytes().to_vec(),
    }
}

/// Predecessor iterator over a synthetic chain running from `genesis`
/// up to whatever header it is first called with. Activations are
/// reported at the given levels.
pub fn chain_iterator(
    genesis: u64,
    activations: Vec<u64>,
) -> impl FnMut(
    &MemoryBlockHeader,
) -> SnapshotResult<(Option<MemoryPrunedBlock>, Option<MemoryProtocolData>)> {
    move |header| {
        let activation = activations
            .contains(&header.level)
            .then(|| MemoryProtocolData(format!("activation-at-{}", header.level).into_bytes()));
        let pred = (header.level > genesis).then(|| pruned_block(header.level - 1));
        Ok((pred, activation))
    }
}

/// A committed store with a small but structurally interesting tree:
/// nested directories, a duplicated leaf, and a top-level leaf.
pub fn seeded_store(level: u64) -> (MemoryContextStore, MemoryBlockHeader, MemoryBlockData) {
    let store = MemoryContextStore::new();
    let root = store.insert(None, &["data", "contracts", "alice"], b"balance:100");
    let root = store.insert(Some(root), &["data", "contracts", "bob"], b"balance:42");
    let root = store.insert(Some(root), &["data", "rolls", "0"], b"owner:alice");
    let root = store.insert(Some(root), &["cache", "x"], b"duplicated");
    let root = store.insert(Some(root), &["cache", "y"], b"duplicated");
    let root = store.insert(Some(root), &["version"], b"1.0");

    let header = test_header(level, root);
    store.commit(
        MemoryCommitInfo {
            author: "baker-7".to_string(),
            message: format!("commit at level {level}"),
            timestamp: 1_600_000_000 + level,
        },
        vec![CommitHash([3; 32])],
        &header,
    );
    let block_data = MemoryBlockData {
        header: header.clone(),
        operations: vec![b"op-endorsement".to_vec(), b"op-transfer".to_vec()],
    };
    (store, header, block_data)
}

/// Reads back a leaf under the committed context of `header`.
pub fn leaf_under(
    store: &MemoryContextStore,
    header: &MemoryBlockHeader,
    path: &[&str],
) -> Option<Vec<u8>> {
    let ctx = store.get_context(header).unwrap()?;
    let tree = store.context_tree(&ctx);
    let leaf = store.sub_tree(&tree, path).unwrap()?;
    store.tree_content(&leaf).unwrap()
}

/// Wrapper that lists children in reverse order, standing in for
/// adapters whose enumeration order is arbitrary.
pub struct ReversedListStore(pub MemoryContextStore);

impl ContextStore for ReversedListStore {
    type Hash = NodeHash;
    type CommitHash = CommitHash;
    type BlockHash = BlockHash;
    type CommitInfo = MemoryCommitInfo;
    type BlockHeader = MemoryBlockHeader;
    type PrunedBlock = MemoryPrunedBlock;
    type BlockData = MemoryBlockData;
    type ProtocolData = MemoryProtocolData;
    type Context = <MemoryContextStore as ContextStore>::Context;
    type Tree = <MemoryContextStore as ContextStore>::Tree;
    type Batch = <MemoryContextStore as ContextStore>::Batch;

    fn get_context(&self, header: &Self::BlockHeader) -> SnapshotResult<Option<Self::Context>> {
        self.0.get_context(header)
    }

    fn context_tree(&self, ctx: &Self::Context) -> Self::Tree {
        self.0.context_tree(ctx)
    }

    fn context_info(&self, ctx: &Self::Context) -> Self::CommitInfo {
        self.0.context_info(ctx)
    }

    fn context_parents(&self, ctx: &Self::Context) -> Vec<Self::CommitHash> {
        self.0.context_parents(ctx)
    }

    fn sub_tree(&self, tree: &Self::Tree, key: &[&str]) -> SnapshotResult<Option<Self::Tree>> {
        self.0.sub_tree(tree, key)
    }

    fn tree_list(&self, tree: &Self::Tree) -> SnapshotResult<Vec<(String, TreeKind)>> {
        let mut entries = self.0.tree_list(tree)?;
        entries.reverse();
        Ok(entries)
    }

    fn tree_hash(&self, tree: &Self::Tree) -> Self::Hash {
        self.0.tree_hash(tree)
    }

    fn tree_content(&self, tree: &Self::Tree) -> SnapshotResult<Option<Vec<u8>>> {
        self.0.tree_content(tree)
    }

    fn make_context(&self) -> Self::Context {
        self.0.make_context()
    }

    fn update_context(&self, ctx: Self::Context, tree: Self::Tree) -> Self::Context {
        self.0.update_context(ctx, tree)
    }

    fn batch<T>(
        &self,
        f: impl FnOnce(&mut Self::Batch) -> SnapshotResult<T>,
    ) -> SnapshotResult<T> {
        self.0.batch(f)
    }

    fn add_bytes(&self, batch: &mut Self::Batch, data: &[u8]) -> SnapshotResult<Self::Tree> {
        self.0.add_bytes(batch, data)
    }

    fn add_dir(
        &self,
        batch: &mut Self::Batch,
        children: &[(String, Self::Hash)],
    ) -> SnapshotResult<Option<Self::Tree>> {
        self.0.add_dir(batch, children)
    }

    fn set_context(
        &self,
        info: Self::CommitInfo,
        parents: Vec<Self::CommitHash>,
        ctx: Self::Context,
        header: Self::BlockHeader,
    ) -> SnapshotResult<Option<Self::BlockHeader>> {
        self.0.set_context(info, parents, ctx, header)
    }

    fn block_hash(&self, header: &Self::BlockHeader) -> Self::BlockHash {
        self.0.block_hash(header)
    }

    fn pruned_header(&self, pruned: &Self::PrunedBlock) -> Self::BlockHeader {
        self.0.pruned_header(pruned)
    }

    fn block_data_header(&self, data: &Self::BlockData) -> Self::BlockHeader {
        self.0.block_data_header(data)
    }
}

/// One parsed frame of a produced snapshot.
#[derive(Debug, PartialEq)]
pub enum ScannedFrame {
    Meta { version: String, mode_tag: u8 },
    Blob(Vec<u8>),
    Node(Vec<(String, NodeHash)>),
    Root,
    Proot(MemoryPrunedBlock),
    Loot(MemoryProtocolData),
    End,
}

/// Re-parses a snapshot byte stream frame by frame. Panics on any
/// malformation: scanned streams are expected to be well-formed.
pub fn scan_stream(bytes: &[u8]) -> Vec<ScannedFrame> {
    let mut frames = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        assert!(pos + 8 <= bytes.len(), "truncated frame header");
        let len = u64::from_be_bytes(bytes[pos..pos + 8].try_into().unwrap()) as usize;
        pos += 8;
        assert!(pos + len <= bytes.len(), "truncated frame payload");
        let payload = &bytes[pos..pos + len];
        pos += len;

        let mut input = Decoder::new(payload);
        if frames.is_empty() {
            let version = input.read_string().unwrap();
            let mode_tag = input.read_u8().unwrap();
            frames.push(ScannedFrame::Meta { version, mode_tag });
            continue;
        }
        let frame = match input.read_u8().unwrap() {
            b'b' => ScannedFrame::Blob(input.read_bytes().unwrap().to_vec()),
            b'd' => {
                let count = input.read_count().unwrap();
                let mut children = Vec::with_capacity(count);
                for _ in 0..count {
                    let name = input.read_string().unwrap();
                    let hash = NodeHash::decode(&mut input).unwrap();
                    children.push((name, hash));
                }
                ScannedFrame::Node(children)
            }
            b'r' => ScannedFrame::Root,
            b'p' => ScannedFrame::Proot(MemoryPrunedBlock::decode(&mut input).unwrap()),
            b'l' => ScannedFrame::Loot(MemoryProtocolData::decode(&mut input).unwrap()),
            b'e' => ScannedFrame::End,
            tag => panic!("unknown command tag {tag:#04x}"),
        };
        frames.push(frame);
    }
    frames
}

pub fn raw_frame(payload: &[u8]) -> Vec<u8> {
    let mut bytes = (payload.len() as u64).to_be_bytes().to_vec();
    bytes.extend_from_slice(payload);
    bytes
}

/// A well-formed metadata frame for the current version, full mode.
pub fn metadata_frame() -> Vec<u8> {
    let mut payload = (CURRENT_VERSION.len() as u32).to_be_bytes().to_vec();
    payload.extend_from_slice(CURRENT_VERSION.as_bytes());
    payload.push(0);
    raw_frame(&payload)
}
