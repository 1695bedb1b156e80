use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, SszError};
use crate::gindex::GIndex;
use crate::hash::{BYTES_PER_CHUNK, depth_for};
use crate::node::Node;

/// Width of an offset in the variable-size part of an encoding.
pub const BYTES_PER_OFFSET: usize = 4;

/// Width of a union selector prefix.
pub const BYTES_PER_SELECTOR: usize = 1;

/// Largest number of variants a union may declare.
pub const MAX_UNION_VARIANTS: usize = 128;

/// Deepest data tree a collection may have. Its leaves must fit a [`GIndex`].
pub const MAX_DATA_DEPTH: u32 = 63;

/// Type system for tree-backed values.
///
/// The set of shapes is closed: scalars, fixed-width and bounded byte
/// strings, fixed vectors, bounded lists, unions and containers. Composite
/// schemas are reference-counted so that cloning a schema is cheap and two
/// values built from the same schema can share it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schema {
    /// One byte, `0` or `1`.
    Bool,
    Uint8,
    Uint64,
    Uint256,
    /// Exactly `n` bytes.
    ByteVector(usize),
    /// Up to `max_len` bytes.
    ByteList(u64),
    /// A fixed number of elements of one schema.
    Vector(Arc<VectorSchema>),
    /// Up to a maximum number of elements of one schema.
    List(Arc<ListSchema>),
    /// One value drawn from an ordered set of variant schemas.
    Union(Arc<UnionSchema>),
    /// Ordered named fields.
    Container(Arc<ContainerSchema>),
}

impl Schema {
    pub const BYTES20: Schema = Schema::ByteVector(20);
    pub const BYTES32: Schema = Schema::ByteVector(32);

    /// Creates a fixed-width byte vector schema. The width must be non-zero.
    pub fn byte_vector(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(SszError::InvalidSchema("byte vector of width 0".into()));
        }
        Ok(Schema::ByteVector(len))
    }

    pub fn byte_list(max_len: u64) -> Self {
        Schema::ByteList(max_len)
    }

    pub fn vector(element: Schema, len: usize) -> Result<Self> {
        Ok(Schema::Vector(Arc::new(VectorSchema::new(element, len)?)))
    }

    pub fn list(element: Schema, max_len: u64) -> Result<Self> {
        Ok(Schema::List(Arc::new(ListSchema::new(element, max_len)?)))
    }

    pub fn union(variants: impl IntoIterator<Item = Schema>) -> Result<Self> {
        Ok(Schema::Union(Arc::new(UnionSchema::new(variants)?)))
    }

    pub fn container<S: Into<String>>(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = (S, Schema)>,
    ) -> Result<Self> {
        Ok(Schema::Container(Arc::new(ContainerSchema::new(name, fields)?)))
    }

    /// Returns true for scalars that are packed into chunks.
    pub fn is_basic(&self) -> bool {
        self.basic_size().is_some()
    }

    /// Width of a basic value in bytes.
    pub fn basic_size(&self) -> Option<usize> {
        match self {
            Schema::Bool | Schema::Uint8 => Some(1),
            Schema::Uint64 => Some(8),
            Schema::Uint256 => Some(32),
            _ => None,
        }
    }

    /// Encoded width if it is the same for every value of this schema.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            Schema::Bool | Schema::Uint8 | Schema::Uint64 | Schema::Uint256 => self.basic_size(),
            Schema::ByteVector(len) => Some(*len),
            Schema::Vector(vector) => vector.element.fixed_size()?.checked_mul(vector.len),
            Schema::Container(container) => container.fixed_size(),
            Schema::ByteList(_) | Schema::List(_) | Schema::Union(_) => None,
        }
    }

    pub fn is_fixed_size(&self) -> bool {
        self.fixed_size().is_some()
    }

    /// Number of leaves reserved for this value's data, before padding.
    ///
    /// Lists reserve room for their maximum length, so every list of a schema
    /// has the same tree shape regardless of how many elements it holds.
    pub fn chunk_count(&self) -> u64 {
        match self {
            Schema::Bool | Schema::Uint8 | Schema::Uint64 | Schema::Uint256 => 1,
            Schema::ByteVector(len) => packed_chunks(*len as u64, 1),
            Schema::ByteList(max_len) => packed_chunks(*max_len, 1),
            Schema::Vector(vector) => vector.chunk_count(),
            Schema::List(list) => list.chunk_limit(),
            Schema::Union(_) => 1,
            Schema::Container(container) => container.len() as u64,
        }
    }

    /// Depth of the data tree (below any length or selector mix-in).
    pub fn data_depth(&self) -> u32 {
        depth_for(self.chunk_count())
    }

    /// Backing tree of this schema's default value.
    pub fn default_node(&self) -> Node {
        match self {
            Schema::Bool | Schema::Uint8 | Schema::Uint64 | Schema::Uint256 => Node::zero(0),
            Schema::ByteVector(_) => Node::zero(self.data_depth()),
            Schema::ByteList(_) | Schema::List(_) => {
                Node::branch(Node::zero(self.data_depth()), Node::zero(0))
            }
            Schema::Vector(vector) => {
                if vector.element.is_basic() {
                    Node::zero(self.data_depth())
                } else {
                    let element = vector.element.default_node();
                    Node::repeat(self.data_depth(), &element, vector.len as u64)
                }
            }
            Schema::Union(union) => Node::branch(union.variants[0].default_node(), Node::zero(0)),
            Schema::Container(container) => container.default_node(),
        }
    }
}

fn check_element(element: &Schema) -> Result<()> {
    if element.fixed_size() == Some(0) {
        return Err(SszError::InvalidSchema(format!("element {element} has zero width")));
    }
    Ok(())
}

fn check_depth(depth: u32, describe: impl FnOnce() -> String) -> Result<()> {
    if depth > MAX_DATA_DEPTH {
        return Err(SszError::InvalidSchema(format!(
            "{} needs a tree of depth {depth}",
            describe()
        )));
    }
    Ok(())
}

fn packed_chunks(count: u64, size: usize) -> u64 {
    let bytes = count as u128 * size as u128;
    let chunks = bytes.div_ceil(BYTES_PER_CHUNK as u128);
    u64::try_from(chunks).unwrap_or(u64::MAX)
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schema::Bool => f.write_str("bool"),
            Schema::Uint8 => f.write_str("uint8"),
            Schema::Uint64 => f.write_str("uint64"),
            Schema::Uint256 => f.write_str("uint256"),
            Schema::ByteVector(len) => write!(f, "ByteVector[{len}]"),
            Schema::ByteList(max_len) => write!(f, "ByteList[{max_len}]"),
            Schema::Vector(vector) => write!(f, "Vector[{}, {}]", vector.element, vector.len),
            Schema::List(list) => write!(f, "List[{}, {}]", list.element, list.max_len),
            Schema::Union(union) => {
                f.write_str("Union[")?;
                for (i, variant) in union.variants.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{variant}")?;
                }
                f.write_str("]")
            }
            Schema::Container(container) => f.write_str(&container.name),
        }
    }
}

/// A fixed number of elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorSchema {
    element: Schema,
    len: usize,
}

impl VectorSchema {
    pub fn new(element: Schema, len: usize) -> Result<Self> {
        if len == 0 {
            return Err(SszError::InvalidSchema(format!("Vector[{element}, 0]")));
        }
        check_element(&element)?;
        let schema = VectorSchema { element, len };
        check_depth(schema.data_depth(), || format!("Vector[{}, {len}]", schema.element))?;
        Ok(schema)
    }

    pub fn element(&self) -> &Schema {
        &self.element
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn chunk_count(&self) -> u64 {
        match self.element.basic_size() {
            Some(size) => packed_chunks(self.len as u64, size),
            None => self.len as u64,
        }
    }

    pub fn data_depth(&self) -> u32 {
        depth_for(self.chunk_count())
    }
}

/// Up to `max_len` elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSchema {
    element: Schema,
    max_len: u64,
}

impl ListSchema {
    /// Fails with `InvalidSchema` if the element has zero width or the
    /// limit needs a data tree too deep to address.
    pub fn new(element: Schema, max_len: u64) -> Result<Self> {
        check_element(&element)?;
        let schema = ListSchema { element, max_len };
        check_depth(schema.data_depth(), || format!("List[{}, {max_len}]", schema.element))?;
        Ok(schema)
    }

    pub fn element(&self) -> &Schema {
        &self.element
    }

    pub fn max_len(&self) -> u64 {
        self.max_len
    }

    /// Leaves reserved for `max_len` elements.
    pub fn chunk_limit(&self) -> u64 {
        match self.element.basic_size() {
            Some(size) => packed_chunks(self.max_len, size),
            None => self.max_len,
        }
    }

    pub fn data_depth(&self) -> u32 {
        depth_for(self.chunk_limit())
    }
}

/// An ordered set of variant schemas selected by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionSchema {
    variants: Vec<Schema>,
}

impl UnionSchema {
    pub fn new(variants: impl IntoIterator<Item = Schema>) -> Result<Self> {
        let variants: Vec<Schema> = variants.into_iter().collect();
        if variants.is_empty() || variants.len() > MAX_UNION_VARIANTS {
            return Err(SszError::InvalidSchema(format!(
                "union with {} variants",
                variants.len()
            )));
        }
        Ok(UnionSchema { variants })
    }

    pub fn variants(&self) -> &[Schema] {
        &self.variants
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Returns the schema selected by `selector`.
    pub fn variant(&self, selector: u8) -> Result<&Schema> {
        self.variants
            .get(selector as usize)
            .ok_or(SszError::InvalidSelector {
                selector: u64::from(selector),
                variants: self.variants.len(),
            })
    }
}

/// A named record with ordered fields.
///
/// Field order is part of the schema: it fixes both the byte layout and the
/// position of each field's subtree in the backing tree.
#[derive(Debug, Clone)]
pub struct ContainerSchema {
    name: String,
    fields: IndexMap<String, Schema>,
    depth: u32,
}

impl PartialEq for ContainerSchema {
    fn eq(&self, other: &Self) -> bool {
        // IndexMap equality ignores order, which is significant here
        self.name == other.name && self.fields.iter().eq(other.fields.iter())
    }
}

impl Eq for ContainerSchema {}

impl ContainerSchema {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = (S, Schema)>,
    ) -> Result<Self> {
        let name = name.into();
        let mut map = IndexMap::new();
        for (field, schema) in fields {
            let field = field.into();
            if map.contains_key(&field) {
                return Err(SszError::InvalidSchema(format!(
                    "{name} declares field `{field}` twice"
                )));
            }
            map.insert(field, schema);
        }
        if map.is_empty() {
            return Err(SszError::InvalidSchema(format!("{name} has no fields")));
        }
        let depth = depth_for(map.len() as u64);
        Ok(ContainerSchema {
            name,
            fields: map,
            depth,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Depth of the field layer of the backing tree.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Number of field slots after padding to a power of two.
    pub fn padded_chunk_count(&self) -> u64 {
        1 << self.depth
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Schema)> {
        self.fields.iter().map(|(name, schema)| (name.as_str(), schema))
    }

    /// Looks up a field by name, returning its position and schema.
    pub fn field(&self, name: &str) -> Option<(usize, &Schema)> {
        self.fields
            .get_full(name)
            .map(|(index, _, schema)| (index, schema))
    }

    pub fn field_at(&self, index: usize) -> Option<(&str, &Schema)> {
        self.fields
            .get_index(index)
            .map(|(name, schema)| (name.as_str(), schema))
    }

    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.fields
            .get_index_of(name)
            .ok_or_else(|| SszError::UnknownField(name.to_string()))
    }

    /// Position of a field's subtree in the container's backing tree.
    pub fn field_gindex(&self, name: &str) -> Result<GIndex> {
        Ok(self.gindex_at(self.index_of(name)?))
    }

    pub(crate) fn gindex_at(&self, index: usize) -> GIndex {
        GIndex::at_depth(self.depth, index as u64)
    }

    /// Encoded width if every field is fixed-size.
    pub fn fixed_size(&self) -> Option<usize> {
        self.fields
            .values()
            .try_fold(0usize, |acc, schema| acc.checked_add(schema.fixed_size()?))
    }

    /// Width of the fixed region: inline fields plus one offset per variable field.
    pub fn fixed_region_size(&self) -> usize {
        self.fields
            .values()
            .map(|schema| schema.fixed_size().unwrap_or(BYTES_PER_OFFSET))
            .sum()
    }

    pub(crate) fn default_node(&self) -> Node {
        let defaults: Vec<Node> = self.fields.values().map(Schema::default_node).collect();
        Node::build(self.depth, &defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ContainerSchema {
        ContainerSchema::new(
            "Sample",
            [
                ("a", Schema::Uint64),
                ("b", Schema::byte_list(4)),
                ("c", Schema::BYTES32),
            ],
        )
        .unwrap()
    }

    #[test]
    fn fixed_sizes() {
        assert_eq!(Schema::Bool.fixed_size(), Some(1));
        assert_eq!(Schema::Uint256.fixed_size(), Some(32));
        assert_eq!(Schema::BYTES20.fixed_size(), Some(20));
        assert_eq!(Schema::vector(Schema::Uint64, 3).unwrap().fixed_size(), Some(24));
        assert_eq!(Schema::byte_list(10).fixed_size(), None);
        assert_eq!(Schema::list(Schema::Uint64, 10).unwrap().fixed_size(), None);
        assert_eq!(
            Schema::vector(Schema::byte_list(2), 2).unwrap().fixed_size(),
            None
        );
    }

    #[test]
    fn chunk_counts_follow_capacity() {
        assert_eq!(Schema::byte_list(4).chunk_count(), 1);
        assert_eq!(Schema::byte_list(33).chunk_count(), 2);
        assert_eq!(Schema::list(Schema::Uint64, 4).unwrap().chunk_count(), 1);
        assert_eq!(Schema::list(Schema::Uint64, 5).unwrap().chunk_count(), 2);
        assert_eq!(Schema::list(Schema::BYTES32, 5).unwrap().chunk_count(), 5);
        assert_eq!(Schema::byte_list(1 << 30).data_depth(), 25);
        assert_eq!(Schema::byte_list(0).data_depth(), 0);
    }

    #[test]
    fn container_layout() {
        let schema = sample();
        assert_eq!(schema.depth(), 2);
        assert_eq!(schema.padded_chunk_count(), 4);
        assert_eq!(schema.fixed_region_size(), 8 + 4 + 32);
        assert_eq!(schema.fixed_size(), None);
        assert_eq!(schema.field_gindex("c").unwrap().get(), 6);
        assert_eq!(schema.field("b").map(|(i, _)| i), Some(1));
        assert_eq!(
            schema.field_gindex("missing").unwrap_err(),
            SszError::UnknownField("missing".into())
        );
    }

    #[test]
    fn invalid_schemas() {
        assert!(Schema::vector(Schema::Uint8, 0).is_err());
        assert!(Schema::byte_vector(0).is_err());
        assert!(Schema::union(Vec::new()).is_err());
        assert!(ContainerSchema::new("Empty", Vec::<(&str, Schema)>::new()).is_err());
        assert!(ContainerSchema::new("Dup", [("x", Schema::Bool), ("x", Schema::Uint8)]).is_err());
    }

    #[test]
    fn collections_need_addressable_trees() {
        assert!(matches!(
            ListSchema::new(Schema::BYTES32, u64::MAX),
            Err(SszError::InvalidSchema(_))
        ));
        assert!(ListSchema::new(Schema::BYTES32, 1 << 63).is_ok());
        assert_eq!(
            ListSchema::new(Schema::BYTES32, 1 << 63).unwrap().data_depth(),
            MAX_DATA_DEPTH
        );
        assert!(Schema::list(Schema::Uint8, u64::MAX).is_ok());
        assert!(Schema::vector(Schema::BYTES32, usize::MAX).is_err());
    }

    #[test]
    fn zero_width_elements_are_rejected() {
        assert!(Schema::list(Schema::ByteVector(0), 4).is_err());
        assert!(Schema::vector(Schema::ByteVector(0), 2).is_err());
        let empty = Schema::container("Empty", [("x", Schema::ByteVector(0))]).unwrap();
        assert!(matches!(
            Schema::list(empty, 4),
            Err(SszError::InvalidSchema(_))
        ));
    }

    #[test]
    fn default_vector_of_composites() {
        let element = Schema::byte_list(4);
        let vector = Schema::vector(element.clone(), 5).unwrap();
        let explicit = Node::from_nodes(3, &vec![element.default_node(); 5]).unwrap();
        assert_eq!(vector.default_node().root(), explicit.root());
    }

    #[test]
    fn union_variant_lookup() {
        let union = UnionSchema::new([Schema::Uint8, Schema::byte_list(8)]).unwrap();
        assert_eq!(union.variant(1).unwrap(), &Schema::byte_list(8));
        assert_eq!(
            union.variant(2).unwrap_err(),
            SszError::InvalidSelector {
                selector: 2,
                variants: 2
            }
        );
    }

    #[test]
    fn field_order_is_identity() {
        let ab = ContainerSchema::new("P", [("a", Schema::Uint8), ("b", Schema::Uint64)]).unwrap();
        let ba = ContainerSchema::new("P", [("b", Schema::Uint64), ("a", Schema::Uint8)]).unwrap();
        assert_ne!(ab, ba);
        assert_eq!(ab, ab.clone());
    }

    #[test]
    fn display_names() {
        let list = Schema::list(Schema::Uint64, 16).unwrap();
        assert_eq!(list.to_string(), "List[uint64, 16]");
        let container = Schema::Container(Arc::new(sample()));
        assert_eq!(container.to_string(), "Sample");
    }

    #[test]
    fn default_list_has_zero_length() {
        let list = Schema::list(Schema::Uint64, 16).unwrap();
        let node = list.default_node();
        assert_eq!(node.get(GIndex::ROOT.right()).unwrap().read_u64(), Some(0));
    }
}
