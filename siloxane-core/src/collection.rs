use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::codec;
use crate::error::{Result, SszError};
use crate::gindex::GIndex;
use crate::hash::{BYTES_PER_CHUNK, Root};
use crate::node::Node;
use crate::schema::{ListSchema, Schema, VectorSchema};
use crate::value::{Value, pack_bytes, split_length};

/// A fixed-length sequence backed by a merkle tree.
#[derive(Clone)]
pub struct Vector {
    schema: Arc<VectorSchema>,
    node: Node,
}

impl Vector {
    /// Builds a vector from exactly `schema.len()` elements.
    pub fn new(schema: Arc<VectorSchema>, elements: Vec<Value>) -> Result<Self> {
        if elements.len() != schema.len() {
            return Err(SszError::LengthMismatch {
                expected: schema.len() as u64,
                actual: elements.len() as u64,
            });
        }
        let node = build_data(schema.element(), schema.data_depth(), &elements)?;
        Ok(Vector { schema, node })
    }

    /// Wraps an existing backing tree.
    pub fn from_node(schema: Arc<VectorSchema>, node: Node) -> Self {
        Vector { schema, node }
    }

    pub fn from_bytes(schema: Arc<VectorSchema>, bytes: &[u8]) -> Result<Self> {
        let node = codec::decode(&Schema::Vector(schema.clone()), bytes)?;
        Ok(Vector { schema, node })
    }

    pub fn schema(&self) -> &Arc<VectorSchema> {
        &self.schema
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn len(&self) -> usize {
        self.schema.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schema.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<Value> {
        check_index(index, self.len())?;
        read_element(self.schema.element(), self.schema.data_depth(), &self.node, index)
    }

    /// Returns a copy with the element at `index` replaced.
    pub fn set(&self, index: usize, value: Value) -> Result<Self> {
        check_index(index, self.len())?;
        let node = write_element(
            self.schema.element(),
            self.schema.data_depth(),
            &self.node,
            index,
            &value,
        )?;
        Ok(Vector {
            schema: self.schema.clone(),
            node,
        })
    }

    pub fn to_vec(&self) -> Result<Vec<Value>> {
        read_all(self.schema.element(), self.schema.data_depth(), &self.node, self.len())
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<Value>> + '_ {
        (0..self.len()).map(|i| self.get(i))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        codec::encode(&Schema::Vector(self.schema.clone()), &self.node)
    }

    pub fn hash_tree_root(&self) -> Root {
        self.node.root()
    }
}

impl PartialEq for Vector {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.node.root() == other.node.root()
    }
}

impl fmt::Debug for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vector")
            .field("schema", &Schema::Vector(self.schema.clone()).to_string())
            .field("root", &self.node.root())
            .finish()
    }
}

/// A sequence of at most `max_len` elements backed by a merkle tree.
///
/// The tree holds a data subtree sized for `max_len` elements on the left and
/// the current length on the right.
#[derive(Clone)]
pub struct List {
    schema: Arc<ListSchema>,
    node: Node,
    len: usize,
}

impl List {
    /// Builds a list, failing with `CollectionTooLong` past `schema.max_len()`.
    pub fn new(schema: Arc<ListSchema>, elements: Vec<Value>) -> Result<Self> {
        let len = elements.len() as u64;
        if len > schema.max_len() {
            return Err(SszError::CollectionTooLong {
                len,
                max: schema.max_len(),
            });
        }
        let data = build_data(schema.element(), schema.data_depth(), &elements)?;
        Ok(List {
            node: Node::branch(data, Node::from_u64(len)),
            len: elements.len(),
            schema,
        })
    }

    pub fn empty(schema: Arc<ListSchema>) -> Self {
        List {
            node: Node::branch(Node::zero(schema.data_depth()), Node::zero(0)),
            len: 0,
            schema,
        }
    }

    /// Wraps an existing backing tree, validating its length leaf.
    pub fn from_node(schema: Arc<ListSchema>, node: Node) -> Result<Self> {
        let (_, len) = split_length(&node)?;
        if len > schema.max_len() {
            return Err(SszError::CollectionTooLong {
                len,
                max: schema.max_len(),
            });
        }
        Ok(List {
            schema,
            node,
            len: len as usize,
        })
    }

    pub fn from_bytes(schema: Arc<ListSchema>, bytes: &[u8]) -> Result<Self> {
        let node = codec::decode(&Schema::List(schema.clone()), bytes)?;
        List::from_node(schema, node)
    }

    pub fn schema(&self) -> &Arc<ListSchema> {
        &self.schema
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn data(&self) -> Result<Node> {
        self.node.get(GIndex::ROOT.left())
    }

    pub fn get(&self, index: usize) -> Result<Value> {
        check_index(index, self.len)?;
        read_element(self.schema.element(), self.schema.data_depth(), &self.data()?, index)
    }

    /// Returns a copy with the element at `index` replaced.
    pub fn set(&self, index: usize, value: Value) -> Result<Self> {
        check_index(index, self.len)?;
        let data = write_element(
            self.schema.element(),
            self.schema.data_depth(),
            &self.data()?,
            index,
            &value,
        )?;
        Ok(List {
            schema: self.schema.clone(),
            node: self.node.set(GIndex::ROOT.left(), data)?,
            len: self.len,
        })
    }

    /// Returns a copy with `value` appended.
    pub fn push(&self, value: Value) -> Result<Self> {
        let len = self.len as u64 + 1;
        if len > self.schema.max_len() {
            return Err(SszError::CollectionTooLong {
                len,
                max: self.schema.max_len(),
            });
        }
        let data = write_element(
            self.schema.element(),
            self.schema.data_depth(),
            &self.data()?,
            self.len,
            &value,
        )?;
        trace!(len, "appended list element");
        Ok(List {
            schema: self.schema.clone(),
            node: Node::branch(data, Node::from_u64(len)),
            len: self.len + 1,
        })
    }

    pub fn to_vec(&self) -> Result<Vec<Value>> {
        read_all(self.schema.element(), self.schema.data_depth(), &self.data()?, self.len)
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<Value>> + '_ {
        (0..self.len).map(|i| self.get(i))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        codec::encode(&Schema::List(self.schema.clone()), &self.node)
    }

    pub fn hash_tree_root(&self) -> Root {
        self.node.root()
    }
}

impl PartialEq for List {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.node.root() == other.node.root()
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List")
            .field("schema", &Schema::List(self.schema.clone()).to_string())
            .field("len", &self.len)
            .field("root", &self.node.root())
            .finish()
    }
}

fn check_index(index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(SszError::IndexOutOfRange {
            index: index as u64,
            len: len as u64,
        });
    }
    Ok(())
}

/// Builds the data subtree for a sequence of elements.
///
/// Basic elements are packed densely into chunks; composite elements each
/// contribute their own subtree as one leaf position.
fn build_data(element: &Schema, depth: u32, elements: &[Value]) -> Result<Node> {
    if element.is_basic() {
        let mut bytes = Vec::new();
        for value in elements {
            if !value.matches_basic(element) {
                return Err(SszError::SchemaMismatch {
                    expected: element.to_string(),
                    found: value.kind_name(),
                });
            }
            value.write_basic(&mut bytes);
        }
        Node::from_chunks(depth, &pack_bytes(&bytes))
    } else {
        let nodes = elements
            .iter()
            .map(|value| value.to_node(element))
            .collect::<Result<Vec<_>>>()?;
        Node::from_nodes(depth, &nodes)
    }
}

/// Locates a basic element: the leaf holding it and its byte offset within the leaf.
fn basic_position(size: usize, depth: u32, index: usize) -> (GIndex, usize) {
    let per_chunk = BYTES_PER_CHUNK / size;
    let leaf = GIndex::at_depth(depth, (index / per_chunk) as u64);
    (leaf, (index % per_chunk) * size)
}

fn read_element(element: &Schema, depth: u32, data: &Node, index: usize) -> Result<Value> {
    match element.basic_size() {
        Some(size) => {
            let (leaf, offset) = basic_position(size, depth, index);
            let chunk = data.get(leaf)?.chunk().ok_or(SszError::MissingNode(leaf))?;
            Ok(Value::read_basic(element, &chunk[offset..offset + size]))
        }
        None => Value::from_node(element, &data.get(GIndex::at_depth(depth, index as u64))?),
    }
}

fn write_element(
    element: &Schema,
    depth: u32,
    data: &Node,
    index: usize,
    value: &Value,
) -> Result<Node> {
    match element.basic_size() {
        Some(size) => {
            if !value.matches_basic(element) {
                return Err(SszError::SchemaMismatch {
                    expected: element.to_string(),
                    found: value.kind_name(),
                });
            }
            let (leaf, offset) = basic_position(size, depth, index);
            let mut chunk = data.get(leaf)?.chunk().ok_or(SszError::MissingNode(leaf))?;
            let mut bytes = Vec::with_capacity(size);
            value.write_basic(&mut bytes);
            chunk[offset..offset + size].copy_from_slice(&bytes);
            data.set(leaf, Node::leaf(chunk))
        }
        None => data.set(
            GIndex::at_depth(depth, index as u64),
            value.to_node(element)?,
        ),
    }
}

fn read_all(element: &Schema, depth: u32, data: &Node, len: usize) -> Result<Vec<Value>> {
    match element.basic_size() {
        Some(size) => {
            let chunks = data.collect_chunks(depth, (len * size).div_ceil(BYTES_PER_CHUNK))?;
            let bytes: Vec<u8> = chunks.iter().flatten().copied().collect();
            Ok(bytes
                .chunks_exact(size)
                .take(len)
                .map(|piece| Value::read_basic(element, piece))
                .collect())
        }
        None => data
            .collect_nodes(depth, len)?
            .iter()
            .map(|node| Value::from_node(element, node))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hasher;
    use crate::merkle::Merkleizer;

    fn u64_list(max_len: u64) -> Arc<ListSchema> {
        Arc::new(ListSchema::new(Schema::Uint64, max_len).unwrap())
    }

    fn u64s(values: &[u64]) -> Vec<Value> {
        values.iter().copied().map(Value::Uint64).collect()
    }

    #[test]
    fn list_at_capacity_and_beyond() {
        let schema = u64_list(4);
        assert_eq!(List::new(schema.clone(), u64s(&[1, 2, 3, 4])).unwrap().len(), 4);
        assert_eq!(
            List::new(schema, u64s(&[1, 2, 3, 4, 5])).unwrap_err(),
            SszError::CollectionTooLong { len: 5, max: 4 }
        );
    }

    #[test]
    fn list_index_out_of_range() {
        let list = List::new(u64_list(8), u64s(&[10, 20])).unwrap();
        assert_eq!(list.get(1).unwrap(), Value::Uint64(20));
        assert_eq!(
            list.get(2).unwrap_err(),
            SszError::IndexOutOfRange { index: 2, len: 2 }
        );
    }

    #[test]
    fn packed_elements_share_chunks() {
        let list = List::new(u64_list(8), u64s(&[1, 2, 3, 4, 5])).unwrap();
        let data = list.node().get(GIndex::ROOT.left()).unwrap();
        let first = data.get(GIndex::at_depth(1, 0)).unwrap().chunk().unwrap();
        assert_eq!(first[0], 1);
        assert_eq!(first[8], 2);
        assert_eq!(first[24], 4);
        assert_eq!(list.to_vec().unwrap(), u64s(&[1, 2, 3, 4, 5]));
    }

    #[test]
    fn empty_list_commits_to_zero_length() {
        let empty = List::empty(u64_list(4));
        let one_zero = List::new(u64_list(4), u64s(&[0])).unwrap();

        let zero = Root::ZERO;
        assert_eq!(
            empty.hash_tree_root(),
            Merkleizer::<crate::hash::Sha256Hasher>::mix_in_length(&zero, 0)
        );
        assert_eq!(
            one_zero.hash_tree_root(),
            Merkleizer::<crate::hash::Sha256Hasher>::mix_in_length(&zero, 1)
        );
        assert_ne!(empty.hash_tree_root(), one_zero.hash_tree_root());
        assert_eq!(empty, List::new(u64_list(4), Vec::new()).unwrap());
    }

    #[test]
    fn push_matches_direct_construction() {
        let schema = u64_list(16);
        let mut list = List::empty(schema.clone());
        for v in 0..9u64 {
            list = list.push(Value::Uint64(v)).unwrap();
        }
        let direct = List::new(schema, (0..9u64).map(Value::Uint64).collect()).unwrap();
        assert_eq!(list.hash_tree_root(), direct.hash_tree_root());
        assert_eq!(list.len(), 9);
    }

    #[test]
    fn push_past_capacity() {
        let list = List::new(u64_list(1), u64s(&[1])).unwrap();
        assert_eq!(
            list.push(Value::Uint64(2)).unwrap_err(),
            SszError::CollectionTooLong { len: 2, max: 1 }
        );
    }

    #[test]
    fn set_leaves_original_untouched() {
        let list = List::new(u64_list(8), u64s(&[1, 2, 3])).unwrap();
        let updated = list.set(1, Value::Uint64(99)).unwrap();
        assert_eq!(list.get(1).unwrap(), Value::Uint64(2));
        assert_eq!(updated.get(1).unwrap(), Value::Uint64(99));
        assert_eq!(updated.get(0).unwrap(), Value::Uint64(1));
    }

    #[test]
    fn composite_list_elements() {
        let schema = Arc::new(ListSchema::new(Schema::byte_list(8), 4).unwrap());
        let list = List::new(
            schema.clone(),
            vec![Value::Bytes(vec![1, 2]), Value::Bytes(vec![])],
        )
        .unwrap();
        assert_eq!(list.get(0).unwrap(), Value::Bytes(vec![1, 2]));
        let pushed = list.push(Value::Bytes(vec![3])).unwrap();
        let direct = List::new(
            schema,
            vec![
                Value::Bytes(vec![1, 2]),
                Value::Bytes(vec![]),
                Value::Bytes(vec![3]),
            ],
        )
        .unwrap();
        assert_eq!(pushed.hash_tree_root(), direct.hash_tree_root());
    }

    #[test]
    fn list_rejects_wrong_element_type() {
        let err = List::new(u64_list(4), vec![Value::Bool(true)]).unwrap_err();
        assert!(matches!(err, SszError::SchemaMismatch { .. }));
    }

    #[test]
    fn vector_requires_exact_width() {
        let schema = Arc::new(VectorSchema::new(Schema::Uint8, 3).unwrap());
        let err = Vector::new(schema.clone(), vec![Value::Uint8(1)]).unwrap_err();
        assert_eq!(
            err,
            SszError::LengthMismatch {
                expected: 3,
                actual: 1
            }
        );
        let vector = Vector::new(schema, vec![Value::Uint8(1), Value::Uint8(2), Value::Uint8(3)])
            .unwrap();
        assert_eq!(vector.get(2).unwrap(), Value::Uint8(3));
        assert!(vector.get(3).is_err());
        let mut chunk = [0u8; 32];
        chunk[..3].copy_from_slice(&[1, 2, 3]);
        assert_eq!(vector.hash_tree_root(), Root::from_bytes(chunk));
    }

    #[test]
    fn vector_of_roots() {
        let schema = Arc::new(VectorSchema::new(Schema::BYTES32, 3).unwrap());
        let elements: Vec<Value> = (1..=3u8).map(|b| Value::Bytes(vec![b; 32])).collect();
        let vector = Vector::new(schema, elements).unwrap();
        let expected = crate::hash::Sha256Hasher::hash_pair(
            &crate::hash::Sha256Hasher::hash_pair(&[1; 32], &[2; 32]),
            &crate::hash::Sha256Hasher::hash_pair(&[3; 32], &[0; 32]),
        );
        assert_eq!(vector.hash_tree_root().as_bytes(), &expected);
        let updated = vector.set(2, Value::Bytes(vec![9; 32])).unwrap();
        assert_eq!(updated.get(2).unwrap(), Value::Bytes(vec![9; 32]));
        assert_eq!(vector.get(2).unwrap(), Value::Bytes(vec![3; 32]));
    }
}
