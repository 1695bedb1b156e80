use std::marker::PhantomData;

use crate::codec;
use crate::error::{DecodeError, Result, SszError};
use crate::gindex::GIndex;
use crate::hash::{Chunk, DefaultHasher, Hasher, Root, depth_for};
use crate::node::Node;
use crate::schema::Schema;

/// Chunk-level merkleization under an arbitrary hasher.
///
/// Backing trees always hash with [`DefaultHasher`]; this computes the same
/// roots from flat chunk lists, or recomputes a tree's root under another
/// hash function without touching its cache.
pub struct Merkleizer<H: Hasher = DefaultHasher>(PhantomData<H>);

impl<H: Hasher> Merkleizer<H> {
    /// Roots of all-zero subtrees of depth `0..=depth`.
    fn zero_hashes(depth: u32) -> Vec<Chunk> {
        let mut zeros = vec![[0u8; 32]];
        for d in 0..depth as usize {
            zeros.push(H::hash_pair(&zeros[d], &zeros[d]));
        }
        zeros
    }

    /// Merkleizes `chunks` padded with zero chunks to the next power of two
    /// of `limit`, or of `chunks.len()` when there is no limit.
    pub fn merkleize(chunks: &[Chunk], limit: Option<u64>) -> Result<Root> {
        let count = chunks.len() as u64;
        let limit = limit.unwrap_or(count);
        if count > limit {
            return Err(SszError::CollectionTooLong { len: count, max: limit });
        }
        let depth = depth_for(limit);
        let zeros = Self::zero_hashes(depth);
        let mut layer = chunks.to_vec();
        for zero in zeros.iter().take(depth as usize) {
            if layer.is_empty() {
                break;
            }
            if layer.len() % 2 == 1 {
                layer.push(*zero);
            }
            layer = layer
                .chunks_exact(2)
                .map(|pair| H::hash_pair(&pair[0], &pair[1]))
                .collect();
        }
        Ok(Root::from_bytes(
            layer.first().copied().unwrap_or(zeros[depth as usize]),
        ))
    }

    pub fn mix_in_length(root: &Root, len: u64) -> Root {
        Root::from_bytes(H::hash_pair(root.as_bytes(), &u64_chunk(len)))
    }

    pub fn mix_in_selector(root: &Root, selector: u8) -> Root {
        Root::from_bytes(H::hash_pair(root.as_bytes(), &u64_chunk(selector as u64)))
    }

    /// Root of a backing tree under `H`, ignoring cached roots.
    pub fn node_root(node: &Node) -> Root {
        match node {
            Node::Leaf(chunk) => Root::from_bytes(*chunk),
            Node::Zero(depth) => Root::from_bytes(Self::zero_hashes(*depth)[*depth as usize]),
            Node::Branch(branch) => Root::from_bytes(H::hash_pair(
                Self::node_root(branch.left()).as_bytes(),
                Self::node_root(branch.right()).as_bytes(),
            )),
        }
    }
}

fn u64_chunk(value: u64) -> Chunk {
    let mut chunk = [0u8; 32];
    chunk[..8].copy_from_slice(&value.to_le_bytes());
    chunk
}

/// Hash tree root of an encoded value.
pub fn hash_tree_root(schema: &Schema, bytes: &[u8]) -> std::result::Result<Root, DecodeError> {
    Ok(codec::decode(schema, bytes)?.root())
}

/// Returns the sibling roots along the path to `gindex`, deepest first.
pub fn prove(node: &Node, gindex: GIndex) -> Result<Vec<Root>> {
    let mut branch = Vec::with_capacity(gindex.depth() as usize);
    let mut current = node.clone();
    for go_right in gindex.path() {
        let (left, right) = current.children().ok_or(SszError::MissingNode(gindex))?;
        if go_right {
            branch.push(left.root());
            current = right;
        } else {
            branch.push(right.root());
            current = left;
        }
    }
    branch.reverse();
    Ok(branch)
}

/// Checks that `leaf` sits at `gindex` under `root` given its sibling branch.
pub fn verify_branch(leaf: &Root, branch: &[Root], gindex: GIndex, root: &Root) -> bool {
    if branch.len() != gindex.depth() as usize {
        return false;
    }
    let mut current = *leaf;
    let mut position = gindex;
    for sibling in branch {
        current = if position.is_right() {
            Root::combine(sibling, &current)
        } else {
            Root::combine(&current, sibling)
        };
        let Some(parent) = position.parent() else {
            return false;
        };
        position = parent;
    }
    current == *root
}
