use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::LazyLock;

/// Width of a merkle leaf in bytes.
pub const BYTES_PER_CHUNK: usize = 32;

/// Deepest zero subtree the precomputed table covers.
pub const MAX_TREE_DEPTH: usize = 64;

/// A single merkle leaf.
pub type Chunk = [u8; BYTES_PER_CHUNK];

/// A hash function used to combine merkle nodes.
///
/// Implementations must be deterministic: the backing tree caches roots and
/// assumes that hashing the same input twice yields the same bytes.
pub trait Hasher: Send + Sync + 'static {
    /// Hashes an arbitrary byte string.
    fn hash(data: &[u8]) -> [u8; 32];

    /// Hashes the concatenation of two sibling nodes.
    fn hash_pair(left: &Chunk, right: &Chunk) -> [u8; 32] {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(left);
        buf[32..].copy_from_slice(right);
        Self::hash(&buf)
    }
}

/// SHA-256, the hash the tree-hashing format is defined over.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    fn hash(data: &[u8]) -> [u8; 32] {
        Sha256::digest(data).into()
    }

    fn hash_pair(left: &Chunk, right: &Chunk) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(left);
        hasher.update(right);
        hasher.finalize().into()
    }
}

/// Blake3, for commitments that do not need to interoperate with SHA-256 trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl Hasher for Blake3Hasher {
    fn hash(data: &[u8]) -> [u8; 32] {
        *blake3::hash(data).as_bytes()
    }
}

/// The hasher whose roots are cached inside backing trees.
pub type DefaultHasher = Sha256Hasher;

/// A 32-byte hash tree root.
///
/// Roots are serialized as byte strings, not as arrays of integers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Root([u8; 32]);

impl Serialize for Root {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Root {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RootVisitor;

        impl serde::de::Visitor<'_> for RootVisitor {
            type Value = Root;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("32-byte root")
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                <[u8; 32]>::try_from(v)
                    .map(Root)
                    .map_err(|_| E::invalid_length(v.len(), &"32 bytes"))
            }
        }

        deserializer.deserialize_bytes(RootVisitor)
    }
}

impl Root {
    /// The all-zero root, equal to an all-zero chunk.
    pub const ZERO: Root = Root([0u8; 32]);

    /// Hashes arbitrary data with the default hasher.
    pub fn from_data(data: &[u8]) -> Self {
        Root(DefaultHasher::hash(data))
    }

    /// Wraps raw bytes without hashing them.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Root(bytes)
    }

    /// Returns the root as a byte array.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Combines two roots with the default hasher.
    pub fn combine(left: &Root, right: &Root) -> Root {
        Root(DefaultHasher::hash_pair(&left.0, &right.0))
    }
}

impl From<[u8; 32]> for Root {
    fn from(bytes: [u8; 32]) -> Self {
        Root(bytes)
    }
}

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Root({})", self)
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

static ZERO_HASHES: LazyLock<Vec<Root>> = LazyLock::new(|| {
    let mut hashes = Vec::with_capacity(MAX_TREE_DEPTH + 1);
    hashes.push(Root::ZERO);
    for depth in 1..=MAX_TREE_DEPTH {
        let below = hashes[depth - 1];
        hashes.push(Root::combine(&below, &below));
    }
    hashes
});

/// Root of a perfect all-zero subtree of the given depth under the default hasher.
///
/// # Panics
///
/// Panics if `depth` exceeds [`MAX_TREE_DEPTH`].
pub fn zero_hash(depth: usize) -> Root {
    ZERO_HASHES[depth]
}

/// Number of levels needed for a tree with `count` leaves.
pub fn depth_for(count: u64) -> u32 {
    if count <= 1 {
        0
    } else {
        64 - (count - 1).leading_zeros()
    }
}
