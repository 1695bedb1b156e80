use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::{instrument, trace};

use crate::codec;
use crate::error::{Result, SszError};
use crate::hash::Root;
use crate::merkle;
use crate::node::Node;
use crate::schema::{ContainerSchema, Schema};
use crate::value::Value;

/// An instance of a container schema.
///
/// Holds the schema and a backing tree whose leaves at depth
/// `schema.depth()` are the fields' subtrees. Field reads decode only the
/// subtree they need and are memoized per instance. Derived instances share
/// every unmodified subtree with their source.
#[derive(Clone)]
pub struct Container {
    schema: Arc<ContainerSchema>,
    node: Node,
    cache: Arc<[OnceLock<Value>]>,
}

fn empty_cache(len: usize) -> Arc<[OnceLock<Value>]> {
    (0..len).map(|_| OnceLock::new()).collect()
}

impl Container {
    /// Builds an instance from one value per field, in field order.
    ///
    /// The first value that does not fit its field fails with
    /// `FieldValidation` naming that field.
    pub fn new(schema: Arc<ContainerSchema>, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(SszError::LengthMismatch {
                expected: schema.len() as u64,
                actual: values.len() as u64,
            });
        }
        let nodes = schema
            .fields()
            .zip(&values)
            .map(|((name, field), value)| value.to_node(field).map_err(|err| err.in_field(name)))
            .collect::<Result<Vec<_>>>()?;
        let node = Node::from_nodes(schema.depth(), &nodes)?;
        let cache: Arc<[OnceLock<Value>]> = values.into_iter().map(OnceLock::from).collect();
        Ok(Container {
            schema,
            node,
            cache,
        })
    }

    /// Builds an instance from `(name, value)` pairs, which may come in any
    /// order but must name every field exactly once.
    pub fn from_named<S: AsRef<str>>(
        schema: Arc<ContainerSchema>,
        values: impl IntoIterator<Item = (S, Value)>,
    ) -> Result<Self> {
        let mut slots: Vec<Option<Value>> = vec![None; schema.len()];
        for (name, value) in values {
            let index = schema.index_of(name.as_ref())?;
            slots[index] = Some(value);
        }
        let values = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| {
                    let name = schema.field_at(index).map(|(name, _)| name).unwrap_or_default();
                    SszError::SchemaMismatch {
                        expected: schema.name().to_string(),
                        found: format!("no value for `{name}`"),
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Container::new(schema, values)
    }

    /// The instance whose every field holds its schema's default value.
    pub fn default_for(schema: Arc<ContainerSchema>) -> Self {
        let node = schema.default_node();
        Container::from_node(schema, node)
    }

    /// Wraps an existing backing tree. Fields are validated when read.
    pub fn from_node(schema: Arc<ContainerSchema>, node: Node) -> Self {
        let cache = empty_cache(schema.len());
        Container {
            schema,
            node,
            cache,
        }
    }

    #[instrument(skip_all, fields(container = %schema.name(), len = bytes.len()))]
    pub fn from_bytes(schema: Arc<ContainerSchema>, bytes: &[u8]) -> Result<Self> {
        let node = codec::decode(&Schema::Container(schema.clone()), bytes)?;
        Ok(Container::from_node(schema, node))
    }

    pub fn schema(&self) -> &Arc<ContainerSchema> {
        &self.schema
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn hash_tree_root(&self) -> Root {
        self.node.root()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        codec::encode(&Schema::Container(self.schema.clone()), &self.node)
    }

    /// Reads a field by name.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.get_at(self.schema.index_of(name)?)
    }

    /// Reads the field at position `index`.
    pub fn get_at(&self, index: usize) -> Result<Value> {
        let slot = self.cache.get(index).ok_or(SszError::IndexOutOfRange {
            index: index as u64,
            len: self.schema.len() as u64,
        })?;
        if let Some(value) = slot.get() {
            return Ok(value.clone());
        }
        let (name, field) = self.schema.field_at(index).ok_or(SszError::IndexOutOfRange {
            index: index as u64,
            len: self.schema.len() as u64,
        })?;
        let node = self.node.get(self.schema.gindex_at(index))?;
        let value = Value::from_node(field, &node).map_err(|err| err.in_field(name))?;
        Ok(slot.get_or_init(|| value).clone())
    }

    /// The subtree backing a field.
    pub fn field_node(&self, name: &str) -> Result<Node> {
        self.node.get(self.schema.field_gindex(name)?)
    }

    /// Sibling hashes proving a field's root against this instance's root.
    pub fn field_proof(&self, name: &str) -> Result<Vec<Root>> {
        merkle::prove(&self.node, self.schema.field_gindex(name)?)
    }

    /// Returns a copy with one field replaced.
    ///
    /// Only the branches between the root and the field are rebuilt; all
    /// other subtrees and any already-read field values are shared.
    pub fn with_field(&self, name: &str, value: Value) -> Result<Self> {
        let (index, field) = self
            .schema
            .field(name)
            .ok_or_else(|| SszError::UnknownField(name.to_string()))?;
        let replacement = value.to_node(field).map_err(|err| err.in_field(name))?;
        let node = self.node.set(self.schema.gindex_at(index), replacement)?;
        trace!(container = %self.schema.name(), field = name, "replaced field");

        let cache: Arc<[OnceLock<Value>]> = self
            .cache
            .iter()
            .enumerate()
            .map(|(i, slot)| if i == index { OnceLock::new() } else { slot.clone() })
            .collect();
        let _ = cache[index].set(value);
        Ok(Container {
            schema: self.schema.clone(),
            node,
            cache,
        })
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.node.root() == other.node.root()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("schema", &self.schema.name())
            .field("root", &self.node.root())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::Uint256;

    fn schema() -> Arc<ContainerSchema> {
        Arc::new(
            ContainerSchema::new(
                "Header",
                [
                    ("slot", Schema::Uint64),
                    ("fee", Schema::Uint256),
                    ("hash", Schema::BYTES32),
                    ("extra", Schema::byte_list(8)),
                    ("flag", Schema::Bool),
                ],
            )
            .unwrap(),
        )
    }

    fn sample() -> Container {
        Container::new(
            schema(),
            vec![
                Value::Uint64(7),
                Value::Uint256(Uint256::from(1000u64)),
                Value::Bytes(vec![0xab; 32]),
                Value::Bytes(vec![1, 2, 3]),
                Value::Bool(true),
            ],
        )
        .unwrap()
    }

    #[test]
    fn fields_read_back() {
        let c = sample();
        assert_eq!(c.get("slot").unwrap(), Value::Uint64(7));
        assert_eq!(c.get("extra").unwrap(), Value::Bytes(vec![1, 2, 3]));
        assert_eq!(c.get_at(4).unwrap(), Value::Bool(true));
        assert_eq!(c.get("nope").unwrap_err(), SszError::UnknownField("nope".into()));
        assert!(matches!(
            c.get_at(5),
            Err(SszError::IndexOutOfRange { index: 5, len: 5 })
        ));
    }

    #[test]
    fn lazy_reads_from_tree() {
        let c = Container::from_node(schema(), sample().node().clone());
        assert!(c.cache.iter().all(|slot| slot.get().is_none()));
        assert_eq!(c.get("hash").unwrap(), Value::Bytes(vec![0xab; 32]));
        assert!(c.cache[2].get().is_some());
        assert!(c.cache[0].get().is_none());
    }

    #[test]
    fn invalid_field_is_named() {
        let err = Container::new(
            schema(),
            vec![
                Value::Uint64(7),
                Value::Uint256(Uint256::ZERO),
                Value::Bytes(vec![0; 31]),
                Value::Bytes(vec![]),
                Value::Bool(false),
            ],
        )
        .unwrap_err();
        match err {
            SszError::FieldValidation { field, source } => {
                assert_eq!(field, "hash");
                assert_eq!(
                    *source,
                    SszError::LengthMismatch {
                        expected: 32,
                        actual: 31
                    }
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn wrong_field_count() {
        let err = Container::new(schema(), vec![Value::Uint64(1)]).unwrap_err();
        assert_eq!(
            err,
            SszError::LengthMismatch {
                expected: 5,
                actual: 1
            }
        );
    }

    #[test]
    fn with_field_matches_direct_construction() {
        let original = sample();
        let derived = original.with_field("slot", Value::Uint64(8)).unwrap();
        let direct = Container::new(
            schema(),
            vec![
                Value::Uint64(8),
                Value::Uint256(Uint256::from(1000u64)),
                Value::Bytes(vec![0xab; 32]),
                Value::Bytes(vec![1, 2, 3]),
                Value::Bool(true),
            ],
        )
        .unwrap();
        assert_eq!(derived.hash_tree_root(), direct.hash_tree_root());
        assert_eq!(derived, direct);
        assert_eq!(original.get("slot").unwrap(), Value::Uint64(7));
        assert_eq!(derived.get("slot").unwrap(), Value::Uint64(8));
    }

    #[test]
    fn with_field_shares_other_subtrees() {
        let original = sample();
        let derived = original.with_field("slot", Value::Uint64(9)).unwrap();
        let (Node::Branch(a), Node::Branch(b)) = (original.node(), derived.node()) else {
            panic!("container root is a branch");
        };
        assert!(matches!(
            (a.right(), b.right()),
            (Node::Branch(x), Node::Branch(y)) if Arc::ptr_eq(x, y)
        ));
        for name in ["fee", "hash", "extra", "flag"] {
            assert_eq!(original.get(name).unwrap(), derived.get(name).unwrap());
        }
    }

    #[test]
    fn with_field_validates() {
        let err = sample().with_field("extra", Value::Bytes(vec![0; 9])).unwrap_err();
        assert!(matches!(err, SszError::FieldValidation { ref field, .. } if field == "extra"));
        assert!(matches!(
            sample().with_field("missing", Value::Bool(true)),
            Err(SszError::UnknownField(_))
        ));
    }

    #[test]
    fn named_construction_ignores_order() {
        let c = Container::from_named(
            schema(),
            [
                ("flag", Value::Bool(true)),
                ("extra", Value::Bytes(vec![1, 2, 3])),
                ("hash", Value::Bytes(vec![0xab; 32])),
                ("fee", Value::Uint256(Uint256::from(1000u64))),
                ("slot", Value::Uint64(7)),
            ],
        )
        .unwrap();
        assert_eq!(c, sample());
        let missing = Container::from_named(schema(), [("slot", Value::Uint64(1))]);
        assert!(matches!(missing, Err(SszError::SchemaMismatch { .. })));
    }

    #[test]
    fn default_instance() {
        let c = Container::default_for(schema());
        assert_eq!(c.get("slot").unwrap(), Value::Uint64(0));
        assert_eq!(c.get("extra").unwrap(), Value::Bytes(vec![]));
        assert_eq!(c.get("flag").unwrap(), Value::Bool(false));
        let explicit = Container::new(
            schema(),
            vec![
                Value::Uint64(0),
                Value::Uint256(Uint256::ZERO),
                Value::Bytes(vec![0; 32]),
                Value::Bytes(vec![]),
                Value::Bool(false),
            ],
        )
        .unwrap();
        assert_eq!(c.hash_tree_root(), explicit.hash_tree_root());
    }

    #[test]
    fn field_proof_verifies() {
        let c = sample();
        let proof = c.field_proof("extra").unwrap();
        let leaf = c.field_node("extra").unwrap().root();
        let gindex = c.schema().field_gindex("extra").unwrap();
        assert!(merkle::verify_branch(&leaf, &proof, gindex, &c.hash_tree_root()));
    }
}
