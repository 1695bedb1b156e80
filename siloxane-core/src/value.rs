use crate::bytes::{FixedBytes, Uint256};
use crate::collection::{List, Vector};
use crate::container::Container;
use crate::error::{Result, SszError};
use crate::gindex::GIndex;
use crate::hash::{BYTES_PER_CHUNK, Chunk};
use crate::node::Node;
use crate::schema::Schema;
use crate::union::Union;

/// A value of some schema.
///
/// Scalars and byte strings are held directly. Composite values are views
/// over a backing tree: reading one of their elements decodes only the
/// leaves it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Uint8(u8),
    Uint64(u64),
    Uint256(Uint256),
    /// Contents of a byte vector or byte list.
    Bytes(Vec<u8>),
    Vector(Vector),
    List(List),
    Union(Union),
    Container(Container),
}

impl Value {
    /// Short description of the value's shape, for error messages.
    pub fn kind_name(&self) -> String {
        match self {
            Value::Bool(_) => "bool".into(),
            Value::Uint8(_) => "uint8".into(),
            Value::Uint64(_) => "uint64".into(),
            Value::Uint256(_) => "uint256".into(),
            Value::Bytes(bytes) => format!("{} bytes", bytes.len()),
            Value::Vector(vector) => Schema::Vector(vector.schema().clone()).to_string(),
            Value::List(list) => Schema::List(list.schema().clone()).to_string(),
            Value::Union(union) => Schema::Union(union.schema().clone()).to_string(),
            Value::Container(container) => container.schema().name().to_string(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            Value::Uint8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_uint256(&self) -> Option<Uint256> {
        match self {
            Value::Uint256(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Copies a byte value of exactly `N` bytes into a fixed array.
    pub fn to_fixed_bytes<const N: usize>(&self) -> Option<FixedBytes<N>> {
        self.as_bytes().and_then(FixedBytes::from_slice)
    }

    pub fn as_vector(&self) -> Option<&Vector> {
        match self {
            Value::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_union(&self) -> Option<&Union> {
        match self {
            Value::Union(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Value::Container(v) => Some(v),
            _ => None,
        }
    }

    /// Checks this value against `schema` and builds its backing tree.
    pub fn to_node(&self, schema: &Schema) -> Result<Node> {
        match (schema, self) {
            (Schema::Bool, Value::Bool(_))
            | (Schema::Uint8, Value::Uint8(_))
            | (Schema::Uint64, Value::Uint64(_))
            | (Schema::Uint256, Value::Uint256(_)) => {
                let mut chunk = [0u8; BYTES_PER_CHUNK];
                let mut buf = Vec::with_capacity(32);
                self.write_basic(&mut buf);
                chunk[..buf.len()].copy_from_slice(&buf);
                Ok(Node::leaf(chunk))
            }
            (Schema::ByteVector(len), Value::Bytes(bytes)) => {
                if bytes.len() != *len {
                    return Err(SszError::LengthMismatch {
                        expected: *len as u64,
                        actual: bytes.len() as u64,
                    });
                }
                Node::from_chunks(schema.data_depth(), &pack_bytes(bytes))
            }
            (Schema::ByteList(max_len), Value::Bytes(bytes)) => {
                let len = bytes.len() as u64;
                if len > *max_len {
                    return Err(SszError::CollectionTooLong { len, max: *max_len });
                }
                let data = Node::from_chunks(schema.data_depth(), &pack_bytes(bytes))?;
                Ok(Node::branch(data, Node::from_u64(len)))
            }
            (Schema::Vector(expected), Value::Vector(vector))
                if **expected == **vector.schema() =>
            {
                Ok(vector.node().clone())
            }
            (Schema::List(expected), Value::List(list)) if **expected == **list.schema() => {
                Ok(list.node().clone())
            }
            (Schema::Union(expected), Value::Union(union)) if **expected == **union.schema() => {
                Ok(union.node().clone())
            }
            (Schema::Container(expected), Value::Container(container))
                if **expected == **container.schema() =>
            {
                Ok(container.node().clone())
            }
            _ => Err(SszError::SchemaMismatch {
                expected: schema.to_string(),
                found: self.kind_name(),
            }),
        }
    }

    /// Reads a value of `schema` from its backing tree.
    pub fn from_node(schema: &Schema, node: &Node) -> Result<Value> {
        match schema {
            Schema::Bool | Schema::Uint8 | Schema::Uint64 | Schema::Uint256 => {
                let chunk = node.chunk().ok_or(SszError::MissingNode(GIndex::ROOT))?;
                Ok(Value::read_basic(schema, &chunk))
            }
            Schema::ByteVector(len) => {
                let count = len.div_ceil(BYTES_PER_CHUNK);
                let chunks = node.collect_chunks(schema.data_depth(), count)?;
                Ok(Value::Bytes(unpack_bytes(&chunks, *len)))
            }
            Schema::ByteList(max_len) => {
                let (data, len) = split_length(node)?;
                if len > *max_len {
                    return Err(SszError::CollectionTooLong { len, max: *max_len });
                }
                let len = len as usize;
                let count = len.div_ceil(BYTES_PER_CHUNK);
                let chunks = data.collect_chunks(schema.data_depth(), count)?;
                Ok(Value::Bytes(unpack_bytes(&chunks, len)))
            }
            Schema::Vector(vector) => Ok(Value::Vector(Vector::from_node(
                vector.clone(),
                node.clone(),
            ))),
            Schema::List(list) => Ok(Value::List(List::from_node(list.clone(), node.clone())?)),
            Schema::Union(union) => Ok(Value::Union(Union::from_node(
                union.clone(),
                node.clone(),
            )?)),
            Schema::Container(container) => Ok(Value::Container(Container::from_node(
                container.clone(),
                node.clone(),
            ))),
        }
    }

    /// Appends the little-endian encoding of a basic value.
    pub(crate) fn write_basic(&self, out: &mut Vec<u8>) {
        match self {
            Value::Bool(v) => out.push(u8::from(*v)),
            Value::Uint8(v) => out.push(*v),
            Value::Uint64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::Uint256(v) => out.extend_from_slice(&v.to_le_bytes()),
            _ => {}
        }
    }

    /// Reads a basic value from the start of `bytes`, which must hold at least
    /// `schema.basic_size()` bytes.
    pub(crate) fn read_basic(schema: &Schema, bytes: &[u8]) -> Value {
        match schema {
            Schema::Bool => Value::Bool(bytes[0] == 1),
            Schema::Uint8 => Value::Uint8(bytes[0]),
            Schema::Uint64 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes[..8]);
                Value::Uint64(u64::from_le_bytes(buf))
            }
            _ => {
                let mut buf = [0u8; 32];
                buf.copy_from_slice(&bytes[..32]);
                Value::Uint256(Uint256::from_le_bytes(buf))
            }
        }
    }

    /// Returns true if this is a basic value of `schema`.
    pub(crate) fn matches_basic(&self, schema: &Schema) -> bool {
        matches!(
            (schema, self),
            (Schema::Bool, Value::Bool(_))
                | (Schema::Uint8, Value::Uint8(_))
                | (Schema::Uint64, Value::Uint64(_))
                | (Schema::Uint256, Value::Uint256(_))
        )
    }
}

/// Splits a length-mixed node into its data subtree and length.
pub(crate) fn split_length(node: &Node) -> Result<(Node, u64)> {
    let (data, len) = node
        .children()
        .ok_or(SszError::MissingNode(GIndex::ROOT.left()))?;
    let len = len
        .read_u64()
        .ok_or(SszError::MissingNode(GIndex::ROOT.right()))?;
    Ok((data, len))
}

/// Splits bytes into zero-padded chunks.
pub(crate) fn pack_bytes(bytes: &[u8]) -> Vec<Chunk> {
    bytes
        .chunks(BYTES_PER_CHUNK)
        .map(|piece| {
            let mut chunk = [0u8; BYTES_PER_CHUNK];
            chunk[..piece.len()].copy_from_slice(piece);
            chunk
        })
        .collect()
}

/// Concatenates chunks and truncates to `len` bytes.
pub(crate) fn unpack_bytes(chunks: &[Chunk], len: usize) -> Vec<u8> {
    let mut out: Vec<u8> = chunks.iter().flatten().copied().collect();
    out.truncate(len);
    out
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::Uint8(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint64(v)
    }
}

impl From<Uint256> for Value {
    fn from(v: Uint256) -> Self {
        Value::Uint256(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<const N: usize> From<FixedBytes<N>> for Value {
    fn from(v: FixedBytes<N>) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Vector> for Value {
    fn from(v: Vector) -> Self {
        Value::Vector(v)
    }
}

impl From<List> for Value {
    fn from(v: List) -> Self {
        Value::List(v)
    }
}

impl From<Union> for Value {
    fn from(v: Union) -> Self {
        Value::Union(v)
    }
}

impl From<Container> for Value {
    fn from(v: Container) -> Self {
        Value::Container(v)
    }
}
