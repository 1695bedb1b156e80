use std::fmt;
use std::sync::Arc;

use crate::codec;
use crate::error::{Result, SszError};
use crate::gindex::GIndex;
use crate::hash::Root;
use crate::node::Node;
use crate::schema::{Schema, UnionSchema};
use crate::value::Value;

/// A tagged value: a selector naming one variant, and that variant's value.
///
/// The backing tree is `branch(value, selector)`, so the root commits to both.
#[derive(Clone)]
pub struct Union {
    schema: Arc<UnionSchema>,
    selector: u8,
    node: Node,
}

impl Union {
    /// Wraps `value` as variant `selector`.
    ///
    /// Fails with `InvalidSelector` if the selector is out of range or the
    /// value does not fit the selected variant.
    pub fn new(schema: Arc<UnionSchema>, selector: u8, value: Value) -> Result<Self> {
        let variant = schema.variant(selector)?;
        let value_node = value.to_node(variant).map_err(|err| match err {
            SszError::SchemaMismatch { .. } => SszError::InvalidSelector {
                selector: u64::from(selector),
                variants: schema.len(),
            },
            other => other,
        })?;
        Ok(Union {
            node: Node::branch(value_node, Node::from_u64(selector as u64)),
            schema,
            selector,
        })
    }

    /// Wraps an existing backing tree, validating its selector leaf.
    pub fn from_node(schema: Arc<UnionSchema>, node: Node) -> Result<Self> {
        let raw = node
            .get(GIndex::ROOT.right())?
            .read_u64()
            .ok_or(SszError::MissingNode(GIndex::ROOT.right()))?;
        let selector = u8::try_from(raw)
            .ok()
            .filter(|&s| (s as usize) < schema.len())
            .ok_or(SszError::InvalidSelector {
                selector: raw,
                variants: schema.len(),
            })?;
        Ok(Union {
            schema,
            selector,
            node,
        })
    }

    pub fn from_bytes(schema: Arc<UnionSchema>, bytes: &[u8]) -> Result<Self> {
        let node = codec::decode(&Schema::Union(schema.clone()), bytes)?;
        Union::from_node(schema, node)
    }

    pub fn schema(&self) -> &Arc<UnionSchema> {
        &self.schema
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn selector(&self) -> u8 {
        self.selector
    }

    pub fn variant_schema(&self) -> Result<&Schema> {
        self.schema.variant(self.selector)
    }

    /// Reads the selected variant's value.
    pub fn value(&self) -> Result<Value> {
        let variant = self.schema.variant(self.selector)?;
        Value::from_node(variant, &self.node.get(GIndex::ROOT.left())?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        codec::encode(&Schema::Union(self.schema.clone()), &self.node)
    }

    pub fn hash_tree_root(&self) -> Root {
        self.node.root()
    }
}

impl PartialEq for Union {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.node.root() == other.node.root()
    }
}

impl fmt::Debug for Union {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Union")
            .field("selector", &self.selector)
            .field("root", &self.node.root())
            .finish()
    }
}
