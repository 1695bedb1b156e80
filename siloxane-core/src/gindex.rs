use std::fmt;

/// A generalized index: the position of a node in a binary tree.
///
/// The root is `1`; the children of node `i` are `2i` (left) and `2i + 1`
/// (right). Reading the bits below the leading one from most to least
/// significant gives the path from the root, `0` meaning left.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GIndex(u64);

impl GIndex {
    pub const ROOT: GIndex = GIndex(1);

    /// Wraps a raw index. Zero is not a valid position.
    pub fn new(raw: u64) -> Option<Self> {
        (raw != 0).then_some(GIndex(raw))
    }

    /// The node `index` positions from the left at `depth` levels below the root.
    ///
    /// # Panics
    ///
    /// Panics if `depth >= 64` or `index` does not fit in `depth` bits.
    pub fn at_depth(depth: u32, index: u64) -> Self {
        assert!(depth < 64, "tree depth {depth} out of range");
        assert!(index >> depth == 0, "index {index} does not fit depth {depth}");
        GIndex((1 << depth) | index)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Number of edges between the root and this node.
    pub fn depth(self) -> u32 {
        63 - self.0.leading_zeros()
    }

    /// Offset of this node within its level.
    pub fn index_at_depth(self) -> u64 {
        self.0 ^ (1 << self.depth())
    }

    pub fn left(self) -> Self {
        GIndex(self.0 << 1)
    }

    pub fn right(self) -> Self {
        GIndex((self.0 << 1) | 1)
    }

    pub fn parent(self) -> Option<Self> {
        (self.0 > 1).then_some(GIndex(self.0 >> 1))
    }

    pub fn sibling(self) -> Option<Self> {
        (self.0 > 1).then_some(GIndex(self.0 ^ 1))
    }

    pub fn is_right(self) -> bool {
        self.0 & 1 == 1
    }

    /// Addresses `child` relative to the subtree rooted at `self`.
    ///
    /// Returns `None` if the result would not fit in 64 bits.
    pub fn concat(self, child: GIndex) -> Option<Self> {
        let child_depth = child.depth();
        if self.depth() + child_depth >= 64 {
            return None;
        }
        Some(GIndex((self.0 << child_depth) | child.index_at_depth()))
    }

    /// Path from the root to this node; `true` means "go right".
    pub fn path(self) -> impl Iterator<Item = bool> {
        let depth = self.depth();
        let raw = self.0;
        (0..depth).rev().map(move |bit| (raw >> bit) & 1 == 1)
    }
}

impl fmt::Debug for GIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GIndex({})", self.0)
    }
}

impl fmt::Display for GIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
