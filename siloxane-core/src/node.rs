use std::sync::{Arc, OnceLock};

use crate::error::{Result, SszError};
use crate::gindex::GIndex;
use crate::hash::{Chunk, Root, zero_hash};

/// A node of a persistent binary merkle tree.
///
/// Nodes are immutable. Updating a tree rebuilds the branches along the path
/// to the changed node and shares every other subtree with the original, so
/// older trees stay valid and cheap to keep around.
#[derive(Clone)]
pub enum Node {
    /// A single 32-byte chunk.
    Leaf(Chunk),
    /// A perfect all-zero subtree of the given depth, never materialized.
    Zero(u32),
    /// An internal node with two children and a lazily computed root.
    Branch(Arc<Branch>),
}

/// The shared part of an internal node.
///
/// The root is computed on first access and then cached. Concurrent callers
/// may both compute it; the first write wins and both values are identical.
pub struct Branch {
    left: Node,
    right: Node,
    root: OnceLock<Root>,
}

impl Branch {
    pub fn left(&self) -> &Node {
        &self.left
    }

    pub fn right(&self) -> &Node {
        &self.right
    }
}

impl Node {
    pub fn leaf(chunk: Chunk) -> Self {
        Node::Leaf(chunk)
    }

    pub fn zero(depth: u32) -> Self {
        Node::Zero(depth)
    }

    pub fn branch(left: Node, right: Node) -> Self {
        Node::Branch(Arc::new(Branch {
            left,
            right,
            root: OnceLock::new(),
        }))
    }

    /// Builds a leaf from the little-endian bytes of a length or selector.
    pub fn from_u64(value: u64) -> Self {
        let mut chunk = [0u8; 32];
        chunk[..8].copy_from_slice(&value.to_le_bytes());
        Node::Leaf(chunk)
    }

    /// Returns the hash tree root, computing and caching it if necessary.
    pub fn root(&self) -> Root {
        match self {
            Node::Leaf(chunk) => Root::from_bytes(*chunk),
            Node::Zero(depth) => zero_hash(*depth as usize),
            Node::Branch(branch) => *branch
                .root
                .get_or_init(|| Root::combine(&branch.left.root(), &branch.right.root())),
        }
    }

    /// Returns true if the root has already been computed.
    pub fn is_hashed(&self) -> bool {
        match self {
            Node::Branch(branch) => branch.root.get().is_some(),
            _ => true,
        }
    }

    /// Returns the chunk held by a depth-zero node.
    pub fn chunk(&self) -> Option<Chunk> {
        match self {
            Node::Leaf(chunk) => Some(*chunk),
            Node::Zero(0) => Some([0u8; 32]),
            _ => None,
        }
    }

    /// Returns the two children, expanding zero subtrees on the fly.
    pub fn children(&self) -> Option<(Node, Node)> {
        match self {
            Node::Leaf(_) | Node::Zero(0) => None,
            Node::Zero(depth) => Some((Node::Zero(depth - 1), Node::Zero(depth - 1))),
            Node::Branch(branch) => Some((branch.left.clone(), branch.right.clone())),
        }
    }

    /// Reads the `u64` stored in the first 8 bytes of a leaf.
    pub fn read_u64(&self) -> Option<u64> {
        let chunk = self.chunk()?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&chunk[..8]);
        Some(u64::from_le_bytes(bytes))
    }

    /// Returns the node at `gindex` relative to this node.
    pub fn get(&self, gindex: GIndex) -> Result<Node> {
        let mut node = self.clone();
        for go_right in gindex.path() {
            let (left, right) = node.children().ok_or(SszError::MissingNode(gindex))?;
            node = if go_right { right } else { left };
        }
        Ok(node)
    }

    /// Returns a new tree with the node at `gindex` replaced.
    ///
    /// Only the branches on the path to `gindex` are rebuilt; everything else
    /// is shared with `self`.
    pub fn set(&self, gindex: GIndex, replacement: Node) -> Result<Node> {
        let path: Vec<bool> = gindex.path().collect();
        self.set_path(&path, gindex, replacement)
    }

    fn set_path(&self, path: &[bool], gindex: GIndex, replacement: Node) -> Result<Node> {
        let Some((&go_right, rest)) = path.split_first() else {
            return Ok(replacement);
        };
        let (left, right) = self.children().ok_or(SszError::MissingNode(gindex))?;
        Ok(if go_right {
            Node::branch(left, right.set_path(rest, gindex, replacement)?)
        } else {
            Node::branch(left.set_path(rest, gindex, replacement)?, right)
        })
    }

    /// Builds a perfect tree of `depth` levels from chunks, padding with zeros.
    pub fn from_chunks(depth: u32, chunks: &[Chunk]) -> Result<Node> {
        let nodes: Vec<Node> = chunks.iter().copied().map(Node::Leaf).collect();
        Node::from_nodes(depth, &nodes)
    }

    /// Builds a perfect tree of `depth` levels whose leftmost subtrees at the
    /// bottom level are `nodes`; the remainder is zero-filled.
    pub fn from_nodes(depth: u32, nodes: &[Node]) -> Result<Node> {
        let capacity = 1u128 << depth;
        if nodes.len() as u128 > capacity {
            return Err(SszError::CollectionTooLong {
                len: nodes.len() as u64,
                max: u64::try_from(capacity).unwrap_or(u64::MAX),
            });
        }
        Ok(Node::build(depth, nodes))
    }

    /// Like [`Node::from_nodes`], for callers that already know `nodes` fits.
    pub(crate) fn build(depth: u32, nodes: &[Node]) -> Node {
        if nodes.is_empty() {
            return Node::Zero(depth);
        }
        if depth == 0 {
            return nodes[0].clone();
        }
        let half = 1usize.checked_shl(depth - 1).unwrap_or(usize::MAX);
        let split = nodes.len().min(half);
        let (left, right) = nodes.split_at(split);
        Node::branch(Node::build(depth - 1, left), Node::build(depth - 1, right))
    }

    /// A tree of `depth` levels whose leftmost `count` bottom subtrees are all
    /// `node`. Full subtrees are shared, so this never materializes `count` copies.
    pub(crate) fn repeat(depth: u32, node: &Node, count: u64) -> Node {
        if count == 0 {
            return Node::Zero(depth);
        }
        if depth == 0 {
            return node.clone();
        }
        let half = 1u64 << (depth - 1);
        if count <= half {
            return Node::branch(Node::repeat(depth - 1, node, count), Node::Zero(depth - 1));
        }
        let mut full = node.clone();
        for _ in 1..depth {
            full = Node::branch(full.clone(), full);
        }
        Node::branch(full, Node::repeat(depth - 1, node, count - half))
    }

    /// Reads the leftmost `count` chunks at `depth` levels below this node.
    pub fn collect_chunks(&self, depth: u32, count: usize) -> Result<Vec<Chunk>> {
        let mut out = Vec::with_capacity(count);
        self.collect(depth, count, GIndex::ROOT, &mut |node, gindex| {
            out.push(node.chunk().ok_or(SszError::MissingNode(gindex))?);
            Ok(())
        })?;
        Ok(out)
    }

    /// Reads the leftmost `count` subtrees at `depth` levels below this node.
    pub fn collect_nodes(&self, depth: u32, count: usize) -> Result<Vec<Node>> {
        let mut out = Vec::with_capacity(count);
        self.collect(depth, count, GIndex::ROOT, &mut |node, _| {
            out.push(node.clone());
            Ok(())
        })?;
        Ok(out)
    }

    fn collect(
        &self,
        depth: u32,
        count: usize,
        gindex: GIndex,
        visit: &mut dyn FnMut(&Node, GIndex) -> Result<()>,
    ) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        if depth == 0 {
            return visit(self, gindex);
        }
        let half = 1usize.checked_shl(depth - 1).unwrap_or(usize::MAX);
        if let Node::Zero(zero_depth) = self {
            if *zero_depth < depth {
                return Err(SszError::MissingNode(gindex));
            }
            let below = Node::Zero(zero_depth - depth);
            for _ in 0..count.min(half.saturating_mul(2)) {
                visit(&below, gindex)?;
            }
            return Ok(());
        }
        let (left, right) = self.children().ok_or(SszError::MissingNode(gindex))?;
        left.collect(depth - 1, count.min(half), gindex.left(), visit)?;
        right.collect(depth - 1, count.saturating_sub(half), gindex.right(), visit)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.root() == other.root()
    }
}

impl Eq for Node {}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Leaf(chunk) => write!(f, "Leaf({})", Root::from_bytes(*chunk)),
            Node::Zero(depth) => write!(f, "Zero({depth})"),
            Node::Branch(branch) => f
                .debug_struct("Branch")
                .field("root", &branch.root.get())
                .finish_non_exhaustive(),
        }
    }
}
