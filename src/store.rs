//! Contract between the snapshot engine and a context store.
//!
//! The engine never touches a concrete database: everything it needs
//! from the Merkle-tree store and the chain's block types is expressed
//! through [`ContextStore`]. Adapters supply the wire codecs for their
//! opaque types through the trait bounds on the associated types.

use crate::api::error::SnapshotResult;
use crate::stream::codec::{WireDecode, WireEncode};

pub mod memory;

pub use memory::MemoryContextStore;

/// Kind tag for a direct child of an interior tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeKind {
    /// The child is a leaf carrying raw bytes.
    Contents,
    /// The child is an interior node.
    Node,
}

/// Capability bundle over a content-addressed Merkle context store and
/// its block metadata types.
///
/// `Hash` equality must coincide with content equality: two sub-trees
/// share a hash iff they are the same tree. The exporter's
/// deduplication and the importer's `add_dir` linkage both lean on
/// this.
pub trait ContextStore {
    type Hash: Clone + Eq + std::hash::Hash + WireEncode + WireDecode;
    type CommitHash: WireEncode + WireDecode;
    type BlockHash: Clone;
    type CommitInfo: WireEncode + WireDecode;
    type BlockHeader: Clone + WireEncode + WireDecode;
    type PrunedBlock: WireEncode + WireDecode;
    type BlockData: WireEncode + WireDecode;
    type ProtocolData: WireEncode + WireDecode;
    type Context;
    type Tree;
    type Batch;

    /// Fetches the context attached to a block, if the store has one.
    fn get_context(&self, header: &Self::BlockHeader) -> SnapshotResult<Option<Self::Context>>;

    fn context_tree(&self, ctx: &Self::Context) -> Self::Tree;
    fn context_info(&self, ctx: &Self::Context) -> Self::CommitInfo;
    fn context_parents(&self, ctx: &Self::Context) -> Vec<Self::CommitHash>;

    /// Child lookup by path; `None` if any step is absent or crosses a
    /// leaf.
    fn sub_tree(&self, tree: &Self::Tree, key: &[&str]) -> SnapshotResult<Option<Self::Tree>>;

    /// Direct children with their kinds. The order is unspecified; the
    /// engine canonicalizes before anything reaches the stream.
    fn tree_list(&self, tree: &Self::Tree) -> SnapshotResult<Vec<(String, TreeKind)>>;

    fn tree_hash(&self, tree: &Self::Tree) -> Self::Hash;

    /// Leaf payload; `None` for interior nodes.
    fn tree_content(&self, tree: &Self::Tree) -> SnapshotResult<Option<Vec<u8>>>;

    fn make_context(&self) -> Self::Context;
    fn update_context(&self, ctx: Self::Context, tree: Self::Tree) -> Self::Context;

    /// Runs `f` with a write batch scoped to the call. Whatever the
    /// batch holds is released on every exit path; staged work becomes
    /// visible only if `f` succeeds.
    fn batch<T>(
        &self,
        f: impl FnOnce(&mut Self::Batch) -> SnapshotResult<T>,
    ) -> SnapshotResult<T>;

    /// Installs a leaf in the batch and returns its tree handle.
    fn add_bytes(&self, batch: &mut Self::Batch, data: &[u8]) -> SnapshotResult<Self::Tree>;

    /// Installs an interior node from child hashes. `None` when any
    /// child hash is unknown to the batch, which on import means the
    /// stream referenced a node it never delivered.
    fn add_dir(
        &self,
        batch: &mut Self::Batch,
        children: &[(String, Self::Hash)],
    ) -> SnapshotResult<Option<Self::Tree>>;

    /// Commits a context and links it to `header`. `None` on linkage
    /// mismatch.
    fn set_context(
        &self,
        info: Self::CommitInfo,
        parents: Vec<Self::CommitHash>,
        ctx: Self::Context,
        header: Self::BlockHeader,
    ) -> SnapshotResult<Option<Self::BlockHeader>>;

    fn block_hash(&self, header: &Self::BlockHeader) -> Self::BlockHash;
    fn pruned_header(&self, pruned: &Self::PrunedBlock) -> Self::BlockHeader;
    fn block_data_header(&self, data: &Self::BlockData) -> Self::BlockHeader;
}
