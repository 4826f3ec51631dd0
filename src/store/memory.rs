//! In-memory context store.
//!
//! Reference implementation of [`ContextStore`] backing the test suite
//! and bootstrap tooling: a content-addressed node map plus a commit
//! map, hashed with blake3. Not meant to hold a real chain's context,
//! but it honors every contract the engine relies on, including batch
//! staging and commit linkage checks.

use std::fmt;

use hashbrown::HashMap;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::api::error::{SnapshotError, SnapshotResult};
use crate::store::{ContextStore, TreeKind};
use crate::stream::codec::{Decoder, WireDecode, WireEncode};

pub const HASH_BYTES: usize = 32;

/// Content hash of a tree node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHash(pub [u8; HASH_BYTES]);

/// Hash identifying a block.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockHash(pub [u8; HASH_BYTES]);

/// Hash identifying a persisted commit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitHash(pub [u8; HASH_BYTES]);

impl fmt::Debug for NodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHash({})", short_hex(&self.0))
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", short_hex(&self.0))
    }
}

impl fmt::Debug for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitHash({})", short_hex(&self.0))
    }
}

fn short_hex(bytes: &[u8]) -> String {
    bytes[..4].iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBlockHeader {
    pub level: u64,
    pub predecessor: BlockHash,
    pub context_root: NodeHash,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCommitInfo {
    pub author: String,
    pub message: String,
    pub timestamp: u64,
}

/// A block stripped down to its header and verification data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryPrunedBlock {
    pub header: MemoryBlockHeader,
    pub proof: Vec<u8>,
}

/// The caboose block's header together with its operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBlockData {
    pub header: MemoryBlockHeader,
    pub operations: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryProtocolData(pub Vec<u8>);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum MemoryNode {
    Leaf(Vec<u8>),
    Dir(Vec<(String, NodeHash)>),
}

/// Content hash of a leaf holding `data`.
pub fn leaf_hash(data: &[u8]) -> NodeHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[0u8]);
    hasher.update(data);
    NodeHash(*hasher.finalize().as_bytes())
}

/// Content hash of a directory. Entries must already be sorted by
/// step name.
pub fn dir_hash(entries: &[(String, NodeHash)]) -> NodeHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[1u8]);
    for (name, hash) in entries {
        hasher.update(&(name.len() as u32).to_be_bytes());
        hasher.update(name.as_bytes());
        hasher.update(&hash.0);
    }
    NodeHash(*hasher.finalize().as_bytes())
}

/// Context under construction or attached to a commit.
#[derive(Debug, Clone)]
pub struct MemoryContext {
    root: Option<NodeHash>,
    info: MemoryCommitInfo,
    parents: Vec<CommitHash>,
}

/// Tree handle; nodes live in the store, the handle is just the hash.
#[derive(Debug, Clone, Copy)]
pub struct MemoryTree {
    hash: NodeHash,
}

/// Staged node additions, merged into the store when the batch scope
/// closes successfully and dropped otherwise.
#[derive(Default)]
pub struct MemoryBatch {
    staged: HashMap<NodeHash, MemoryNode>,
}

#[derive(Clone)]
struct CommitRecord {
    root: NodeHash,
    info: MemoryCommitInfo,
    parents: Vec<CommitHash>,
}

#[derive(Default)]
struct StoreInner {
    nodes: HashMap<NodeHash, MemoryNode>,
    commits: HashMap<BlockHash, CommitRecord>,
}

pub struct MemoryContextStore {
    inner: RwLock<StoreInner>,
}

impl Default for MemoryContextStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryContextStore {
    pub fn new() -> Self {
        let store = Self {
            inner: RwLock::new(StoreInner::default()),
        };
        // A fresh context's tree is the empty directory.
        store
            .inner
            .write()
            .nodes
            .insert(dir_hash(&[]), MemoryNode::Dir(Vec::new()));
        store
    }

    /// Installs a leaf at `path` under `root` (creating intermediate
    /// directories) and returns the new root hash. `None` starts from
    /// an empty tree.
    pub fn insert(&self, root: Option<NodeHash>, path: &[&str], data: &[u8]) -> NodeHash {
        let mut inner = self.inner.write();
        insert_at(&mut inner.nodes, root, path, data)
    }

    /// Records a commit for `header`, taking the context root from the
    /// header itself. Returns the block hash the commit is keyed by.
    pub fn commit(
        &self,
        info: MemoryCommitInfo,
        parents: Vec<CommitHash>,
        header: &MemoryBlockHeader,
    ) -> BlockHash {
        let hash = self.block_hash(header);
        self.inner.write().commits.insert(
            hash,
            CommitRecord {
                root: header.context_root,
                info,
                parents,
            },
        );
        hash
    }

    /// Handle for the tree rooted at `hash`.
    pub fn tree(&self, hash: NodeHash) -> MemoryTree {
        MemoryTree { hash }
    }

    pub fn node_count(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn commit_count(&self) -> usize {
        self.inner.read().commits.len()
    }
}

fn insert_at(
    nodes: &mut HashMap<NodeHash, MemoryNode>,
    at: Option<NodeHash>,
    path: &[&str],
    data: &[u8],
) -> NodeHash {
    if path.is_empty() {
        let hash = leaf_hash(data);
        nodes.insert(hash, MemoryNode::Leaf(data.to_vec()));
        return hash;
    }
    let step = path[0];
    // A leaf in the way is replaced by a directory.
    let mut entries = match at.and_then(|hash| nodes.get(&hash)) {
        Some(MemoryNode::Dir(entries)) => entries.clone(),
        _ => Vec::new(),
    };
    let at_child = entries
        .iter()
        .find(|(name, _)| name == step)
        .map(|(_, hash)| *hash);
    let new_child = insert_at(nodes, at_child, &path[1..], data);
    match entries.iter_mut().find(|(name, _)| name == step) {
        Some(entry) => entry.1 = new_child,
        None => entries.push((step.to_string(), new_child)),
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    let hash = dir_hash(&entries);
    nodes.insert(hash, MemoryNode::Dir(entries));
    hash
}

impl ContextStore for MemoryContextStore {
    type Hash = NodeHash;
    type CommitHash = CommitHash;
    type BlockHash = BlockHash;
    type CommitInfo = MemoryCommitInfo;
    type BlockHeader = MemoryBlockHeader;
    type PrunedBlock = MemoryPrunedBlock;
    type BlockData = MemoryBlockData;
    type ProtocolData = MemoryProtocolData;
    type Context = MemoryContext;
    type Tree = MemoryTree;
    type Batch = MemoryBatch;

    fn get_context(&self, header: &MemoryBlockHeader) -> SnapshotResult<Option<MemoryContext>> {
        let hash = self.block_hash(header);
        let inner = self.inner.read();
        Ok(inner.commits.get(&hash).map(|record| MemoryContext {
            root: Some(record.root),
            info: record.info.clone(),
            parents: record.parents.clone(),
        }))
    }

    fn context_tree(&self, ctx: &MemoryContext) -> MemoryTree {
        MemoryTree {
            hash: ctx.root.unwrap_or_else(|| dir_hash(&[])),
        }
    }

    fn context_info(&self, ctx: &MemoryContext) -> MemoryCommitInfo {
        ctx.info.clone()
    }

    fn context_parents(&self, ctx: &MemoryContext) -> Vec<CommitHash> {
        ctx.parents.clone()
    }

    fn sub_tree(&self, tree: &MemoryTree, key: &[&str]) -> SnapshotResult<Option<MemoryTree>> {
        let inner = self.inner.read();
        let mut current = tree.hash;
        for step in key {
            let entries = match inner.nodes.get(&current) {
                Some(MemoryNode::Dir(entries)) => entries,
                _ => return Ok(None),
            };
            match entries.iter().find(|(name, _)| name == step) {
                Some((_, hash)) => current = *hash,
                None => return Ok(None),
            }
        }
        Ok(Some(MemoryTree { hash: current }))
    }

    fn tree_list(&self, tree: &MemoryTree) -> SnapshotResult<Vec<(String, TreeKind)>> {
        let inner = self.inner.read();
        let entries = match inner.nodes.get(&tree.hash) {
            Some(MemoryNode::Dir(entries)) => entries,
            Some(MemoryNode::Leaf(_)) => return Ok(Vec::new()),
            None => return Err(SnapshotError::InconsistentSnapshotData),
        };
        entries
            .iter()
            .map(|(name, hash)| {
                let kind = match inner.nodes.get(hash) {
                    Some(MemoryNode::Leaf(_)) => TreeKind::Contents,
                    Some(MemoryNode::Dir(_)) => TreeKind::Node,
                    None => return Err(SnapshotError::InconsistentSnapshotData),
                };
                Ok((name.clone(), kind))
            })
            .collect()
    }

    fn tree_hash(&self, tree: &MemoryTree) -> NodeHash {
        tree.hash
    }

    fn tree_content(&self, tree: &MemoryTree) -> SnapshotResult<Option<Vec<u8>>> {
        let inner = self.inner.read();
        Ok(match inner.nodes.get(&tree.hash) {
            Some(MemoryNode::Leaf(data)) => Some(data.clone()),
            _ => None,
        })
    }

    fn make_context(&self) -> MemoryContext {
        MemoryContext {
            root: None,
            info: MemoryCommitInfo::default(),
            parents: Vec::new(),
        }
    }

    fn update_context(&self, ctx: MemoryContext, tree: MemoryTree) -> MemoryContext {
        MemoryContext {
            root: Some(tree.hash),
            ..ctx
        }
    }

    fn batch<T>(
        &self,
        f: impl FnOnce(&mut MemoryBatch) -> SnapshotResult<T>,
    ) -> SnapshotResult<T> {
        let mut batch = MemoryBatch::default();
        let value = f(&mut batch)?;
        self.inner.write().nodes.extend(batch.staged);
        Ok(value)
    }

    fn add_bytes(&self, batch: &mut MemoryBatch, data: &[u8]) -> SnapshotResult<MemoryTree> {
        let hash = leaf_hash(data);
        batch.staged.insert(hash, MemoryNode::Leaf(data.to_vec()));
        Ok(MemoryTree { hash })
    }

    fn add_dir(
        &self,
        batch: &mut MemoryBatch,
        children: &[(String, NodeHash)],
    ) -> SnapshotResult<Option<MemoryTree>> {
        {
            let inner = self.inner.read();
            for (_, hash) in children {
                if !batch.staged.contains_key(hash) && !inner.nodes.contains_key(hash) {
                    return Ok(None);
                }
            }
        }
        let mut entries = children.to_vec();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        if entries.windows(2).any(|pair| pair[0].0 == pair[1].0) {
            return Ok(None);
        }
        let hash = dir_hash(&entries);
        batch.staged.insert(hash, MemoryNode::Dir(entries));
        Ok(Some(MemoryTree { hash }))
    }

    fn set_context(
        &self,
        info: MemoryCommitInfo,
        parents: Vec<CommitHash>,
        ctx: MemoryContext,
        header: MemoryBlockHeader,
    ) -> SnapshotResult<Option<MemoryBlockHeader>> {
        match ctx.root {
            Some(root) if root == header.context_root => {
                let hash = self.block_hash(&header);
                self.inner.write().commits.insert(
                    hash,
                    CommitRecord {
                        root,
                        info,
                        parents,
                    },
                );
                Ok(Some(header))
            }
            _ => Ok(None),
        }
    }

    fn block_hash(&self, header: &MemoryBlockHeader) -> BlockHash {
        let mut buf = Vec::new();
        encode_bin(header, &mut buf);
        BlockHash(*blake3::hash(&buf).as_bytes())
    }

    fn pruned_header(&self, pruned: &MemoryPrunedBlock) -> MemoryBlockHeader {
        pruned.header.clone()
    }

    fn block_data_header(&self, data: &MemoryBlockData) -> MemoryBlockHeader {
        data.header.clone()
    }
}

fn encode_bin<T: Serialize>(value: &T, out: &mut Vec<u8>) {
    bincode::serialize_into(&mut *out, value).expect("in-memory value serialization cannot fail");
}

fn decode_bin<T: DeserializeOwned>(input: &mut Decoder<'_>) -> SnapshotResult<T> {
    let mut rest = input.remaining();
    let before = rest.len();
    let value =
        bincode::deserialize_from(&mut rest).map_err(|_| SnapshotError::InconsistentSnapshotFile)?;
    input.advance(before - rest.len())?;
    Ok(value)
}

impl WireEncode for NodeHash {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
    }
}

impl WireDecode for NodeHash {
    fn decode(input: &mut Decoder<'_>) -> SnapshotResult<Self> {
        let bytes = input.read_slice(HASH_BYTES)?;
        Ok(Self(bytes.try_into().unwrap()))
    }
}

impl WireEncode for CommitHash {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
    }
}

impl WireDecode for CommitHash {
    fn decode(input: &mut Decoder<'_>) -> SnapshotResult<Self> {
        let bytes = input.read_slice(HASH_BYTES)?;
        Ok(Self(bytes.try_into().unwrap()))
    }
}

impl WireEncode for MemoryBlockHeader {
    fn encode(&self, out: &mut Vec<u8>) {
        encode_bin(self, out);
    }
}

impl WireDecode for MemoryBlockHeader {
    fn decode(input: &mut Decoder<'_>) -> SnapshotResult<Self> {
        decode_bin(input)
    }
}

impl WireEncode for MemoryCommitInfo {
    fn encode(&self, out: &mut Vec<u8>) {
        encode_bin(self, out);
    }
}

impl WireDecode for MemoryCommitInfo {
    fn decode(input: &mut Decoder<'_>) -> SnapshotResult<Self> {
        decode_bin(input)
    }
}

impl WireEncode for MemoryPrunedBlock {
    fn encode(&self, out: &mut Vec<u8>) {
        encode_bin(self, out);
    }
}

impl WireDecode for MemoryPrunedBlock {
    fn decode(input: &mut Decoder<'_>) -> SnapshotResult<Self> {
        decode_bin(input)
    }
}

impl WireEncode for MemoryBlockData {
    fn encode(&self, out: &mut Vec<u8>) {
        encode_bin(self, out);
    }
}

impl WireDecode for MemoryBlockData {
    fn decode(input: &mut Decoder<'_>) -> SnapshotResult<Self> {
        decode_bin(input)
    }
}

impl WireEncode for MemoryProtocolData {
    fn encode(&self, out: &mut Vec<u8>) {
        encode_bin(self, out);
    }
}

impl WireDecode for MemoryProtocolData {
    fn decode(input: &mut Decoder<'_>) -> SnapshotResult<Self> {
        decode_bin(input)
    }
}
