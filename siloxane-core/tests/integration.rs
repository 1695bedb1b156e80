//! Integration tests covering encoding, commitments and derived instances.

use siloxane_core::{
    Container, ContainerSchema, DecodeError, DefaultHasher, GIndex, List, ListSchema, Merkleizer,
    Node, Root, Schema, SszError, Uint256, Union, UnionSchema, Value, merkle,
};
use std::sync::Arc;

fn pair_schema() -> Arc<ContainerSchema> {
    Arc::new(
        ContainerSchema::new("Pair", [("a", Schema::Uint64), ("b", Schema::byte_list(4))]).unwrap(),
    )
}

/// A record with every kind of field: fixed scalars, a byte vector, a byte
/// list, a list of sub-records and a union.
fn record_schema() -> Arc<ContainerSchema> {
    let entry = Schema::container(
        "Entry",
        [("id", Schema::Uint64), ("tag", Schema::byte_list(16))],
    )
    .unwrap();
    Arc::new(
        ContainerSchema::new(
            "Record",
            [
                ("id", Schema::Uint64),
                ("owner", Schema::BYTES20),
                ("balance", Schema::Uint256),
                ("memo", Schema::byte_list(64)),
                ("entries", Schema::list(entry, 8).unwrap()),
                ("scores", Schema::list(Schema::Uint64, 100).unwrap()),
                ("payload", Schema::union([Schema::byte_list(32), Schema::Uint64]).unwrap()),
                ("active", Schema::Bool),
            ],
        )
        .unwrap(),
    )
}

fn entry(schema: &ContainerSchema, id: u64, tag: &[u8]) -> Value {
    let Schema::List(entries) = schema.field("entries").unwrap().1 else {
        panic!("entries is a list");
    };
    let Schema::Container(entry) = entries.element() else {
        panic!("entries hold containers");
    };
    Value::Container(
        Container::new(
            entry.clone(),
            vec![Value::Uint64(id), Value::Bytes(tag.to_vec())],
        )
        .unwrap(),
    )
}

fn record() -> Container {
    let schema = record_schema();
    let Schema::List(entries) = schema.field("entries").unwrap().1.clone() else {
        panic!("entries is a list");
    };
    let Schema::List(scores) = schema.field("scores").unwrap().1.clone() else {
        panic!("scores is a list");
    };
    let Schema::Union(payload) = schema.field("payload").unwrap().1.clone() else {
        panic!("payload is a union");
    };
    let entries = List::new(
        entries,
        vec![entry(&schema, 1, b"alpha"), entry(&schema, 2, b""), entry(&schema, 3, b"gamma")],
    )
    .unwrap();
    let scores = List::new(scores, (0..37u64).map(|s| Value::Uint64(s * 3)).collect()).unwrap();
    let payload = Union::new(payload, 0, Value::Bytes(b"opaque".to_vec())).unwrap();
    Container::new(
        schema,
        vec![
            Value::Uint64(42),
            Value::Bytes(vec![0x11; 20]),
            Value::Uint256(Uint256::from(u128::MAX)),
            Value::Bytes(b"hello".to_vec()),
            Value::List(entries),
            Value::List(scores),
            Value::Union(payload),
            Value::Bool(true),
        ],
    )
    .unwrap()
}

#[test]
fn pair_encodes_with_offset_table() {
    let pair = Container::new(
        pair_schema(),
        vec![Value::Uint64(1), Value::Bytes(vec![0xaa, 0xbb])],
    )
    .unwrap();
    let bytes = pair.to_bytes().unwrap();
    assert_eq!(
        bytes,
        [0x01, 0, 0, 0, 0, 0, 0, 0, 0x0c, 0, 0, 0, 0xaa, 0xbb]
    );

    let decoded = Container::from_bytes(pair_schema(), &bytes).unwrap();
    assert_eq!(decoded.get("a").unwrap(), Value::Uint64(1));
    assert_eq!(decoded.get("b").unwrap(), Value::Bytes(vec![0xaa, 0xbb]));
    assert_eq!(decoded, pair);
}

#[test]
fn round_trip_preserves_every_field() {
    let original = record();
    let bytes = original.to_bytes().unwrap();
    let decoded = Container::from_bytes(record_schema(), &bytes).unwrap();

    for (name, _) in record_schema().fields() {
        assert_eq!(decoded.get(name).unwrap(), original.get(name).unwrap(), "field {name}");
    }
    assert_eq!(decoded.hash_tree_root(), original.hash_tree_root());
    assert_eq!(decoded.to_bytes().unwrap(), bytes);
}

#[test]
fn nested_values_are_readable() {
    let decoded = Container::from_bytes(record_schema(), &record().to_bytes().unwrap()).unwrap();
    let entries = decoded.get("entries").unwrap();
    let entries = entries.as_list().unwrap();
    assert_eq!(entries.len(), 3);
    let third = entries.get(2).unwrap();
    assert_eq!(third.as_container().unwrap().get("tag").unwrap(), Value::Bytes(b"gamma".to_vec()));

    let scores = decoded.get("scores").unwrap();
    assert_eq!(scores.as_list().unwrap().get(36).unwrap(), Value::Uint64(108));

    let payload = decoded.get("payload").unwrap();
    let payload = payload.as_union().unwrap();
    assert_eq!(payload.selector(), 0);
    assert_eq!(payload.value().unwrap(), Value::Bytes(b"opaque".to_vec()));
}

#[test]
fn encoding_is_independent_of_history() {
    let direct = record();
    let derived = direct
        .with_field("id", Value::Uint64(7))
        .unwrap()
        .with_field("memo", Value::Bytes(b"changed".to_vec()))
        .unwrap()
        .with_field("id", Value::Uint64(42))
        .unwrap()
        .with_field("memo", Value::Bytes(b"hello".to_vec()))
        .unwrap();
    assert_eq!(derived.to_bytes().unwrap(), direct.to_bytes().unwrap());
    assert_eq!(derived.hash_tree_root(), direct.hash_tree_root());
}

#[test]
fn derived_instance_leaves_source_intact() {
    let source = record();
    let before = source.get("memo").unwrap();
    let derived = source.with_field("active", Value::Bool(false)).unwrap();

    for (name, _) in record_schema().fields().filter(|(name, _)| *name != "active") {
        assert_eq!(derived.get(name).unwrap(), source.get(name).unwrap(), "field {name}");
    }
    assert_eq!(source.get("memo").unwrap(), before);
    assert_eq!(source.get("active").unwrap(), Value::Bool(true));
    assert_eq!(derived.get("active").unwrap(), Value::Bool(false));
    assert_ne!(derived.hash_tree_root(), source.hash_tree_root());
}

#[test]
fn list_boundary() {
    let schema = Arc::new(ListSchema::new(Schema::byte_list(4), 3).unwrap());
    let full: Vec<Value> = (0..3u8).map(|b| Value::Bytes(vec![b])).collect();
    let list = List::new(schema.clone(), full.clone()).unwrap();
    assert_eq!(list.len(), 3);

    let mut over = full;
    over.push(Value::Bytes(vec![]));
    assert_eq!(
        List::new(schema, over).unwrap_err(),
        SszError::CollectionTooLong { len: 4, max: 3 }
    );
}

#[test]
fn list_limits_are_checked_when_the_schema_is_built() {
    assert!(matches!(
        ListSchema::new(Schema::BYTES32, u64::MAX),
        Err(SszError::InvalidSchema(_))
    ));
    assert!(matches!(
        Schema::list(Schema::ByteVector(0), 4),
        Err(SszError::InvalidSchema(_))
    ));

    let widest = Arc::new(ListSchema::new(Schema::BYTES32, 1 << 63).unwrap());
    let list = List::new(widest.clone(), vec![Value::Bytes(vec![7; 32])]).unwrap();
    assert_eq!(list.get(0).unwrap(), Value::Bytes(vec![7; 32]));
    let decoded = List::from_bytes(widest, &list.to_bytes().unwrap()).unwrap();
    assert_eq!(decoded.hash_tree_root(), list.hash_tree_root());
}

#[test]
fn empty_list_differs_from_single_zero() {
    let schema = Arc::new(ListSchema::new(Schema::Uint64, 4).unwrap());
    let empty = List::new(schema.clone(), vec![]).unwrap();
    let single = List::new(schema, vec![Value::Uint64(0)]).unwrap();

    let zero_data = Merkleizer::<DefaultHasher>::merkleize(&[], Some(1)).unwrap();
    assert_eq!(empty.hash_tree_root(), Merkleizer::<DefaultHasher>::mix_in_length(&zero_data, 0));
    assert_eq!(single.hash_tree_root(), Merkleizer::<DefaultHasher>::mix_in_length(&zero_data, 1));
    assert_ne!(empty.hash_tree_root(), single.hash_tree_root());
}

#[test]
fn union_selector_at_variant_count() {
    let schema = Arc::new(UnionSchema::new([Schema::Uint8, Schema::byte_list(4)]).unwrap());
    assert_eq!(
        Union::new(schema.clone(), 2, Value::Uint8(1)).unwrap_err(),
        SszError::InvalidSelector { selector: 2, variants: 2 }
    );
    assert!(matches!(
        Union::from_bytes(schema, &[2, 1]),
        Err(SszError::Decode(DecodeError::InvalidSelector { selector: 2, .. }))
    ));
}

#[test]
fn union_round_trip() {
    let schema = Arc::new(UnionSchema::new([Schema::Uint8, Schema::byte_list(4)]).unwrap());
    let union = Union::new(schema.clone(), 1, Value::Bytes(vec![9, 8])).unwrap();
    let bytes = union.to_bytes().unwrap();
    assert_eq!(bytes, [1, 9, 8]);
    let decoded = Union::from_bytes(schema, &bytes).unwrap();
    assert_eq!(decoded, union);
    assert_eq!(
        decoded.hash_tree_root(),
        Merkleizer::<DefaultHasher>::mix_in_selector(
            &Value::Bytes(vec![9, 8])
                .to_node(&Schema::byte_list(4))
                .unwrap()
                .root(),
            1
        )
    );
}

#[test]
fn cached_root_matches_independent_merkleization() {
    let pair = Container::new(
        pair_schema(),
        vec![Value::Uint64(1), Value::Bytes(vec![0xaa, 0xbb])],
    )
    .unwrap();

    let mut a = [0u8; 32];
    a[0] = 1;
    let mut b = [0u8; 32];
    b[..2].copy_from_slice(&[0xaa, 0xbb]);
    let b_root = Merkleizer::<DefaultHasher>::mix_in_length(
        &Merkleizer::<DefaultHasher>::merkleize(&[b], Some(1)).unwrap(),
        2,
    );
    let expected = Merkleizer::<DefaultHasher>::merkleize(&[a, *b_root.as_bytes()], None).unwrap();
    assert_eq!(pair.hash_tree_root(), expected);
    assert_eq!(Merkleizer::<DefaultHasher>::node_root(record().node()), record().hash_tree_root());
}

#[test]
fn decode_rejects_malformed_input() {
    let schema = pair_schema();
    let err = Container::from_bytes(schema.clone(), &[0; 10]).unwrap_err();
    assert_eq!(
        err,
        SszError::Decode(DecodeError::Truncated { position: 0, fixed: 12, actual: 10 })
    );

    let mut bad_offset = vec![0u8; 8];
    bad_offset.extend_from_slice(&20u32.to_le_bytes());
    assert!(matches!(
        Container::from_bytes(schema.clone(), &bad_offset),
        Err(SszError::Decode(DecodeError::FirstOffsetMismatch {
            position: 8,
            offset: 20,
            expected: 12
        }))
    ));

    let mut too_long = vec![0u8; 8];
    too_long.extend_from_slice(&12u32.to_le_bytes());
    too_long.extend_from_slice(&[1, 2, 3, 4, 5]);
    let Err(SszError::Decode(err)) = Container::from_bytes(schema, &too_long) else {
        panic!("five bytes exceed ByteList[4]");
    };
    assert!(matches!(err, DecodeError::InField { ref field, .. } if field == "b"));
    assert_eq!(err.root_cause(), &DecodeError::TooLong { position: 12, count: 5, max: 4 });
}

#[test]
fn hash_tree_root_of_encoding() {
    let original = record();
    let bytes = original.to_bytes().unwrap();
    let schema = Schema::Container(record_schema());
    assert_eq!(merkle::hash_tree_root(&schema, &bytes).unwrap(), original.hash_tree_root());
}

#[test]
fn field_proofs_verify_against_root() {
    let record = record();
    let root = record.hash_tree_root();
    for (name, _) in record_schema().fields() {
        let gindex = record.schema().field_gindex(name).unwrap();
        let proof = record.field_proof(name).unwrap();
        let leaf = record.field_node(name).unwrap().root();
        assert!(merkle::verify_branch(&leaf, &proof, gindex, &root), "field {name}");
    }

    // A list element, addressed through the field, the data subtree and the element index
    let entries_gindex = record.schema().field_gindex("entries").unwrap();
    let element = entries_gindex
        .concat(GIndex::ROOT.left())
        .and_then(|data| data.concat(GIndex::at_depth(3, 2)))
        .unwrap();
    let proof = merkle::prove(record.node(), element).unwrap();
    let leaf = record.node().get(element).unwrap().root();
    assert!(merkle::verify_branch(&leaf, &proof, element, &root));
}

#[test]
fn roots_agree_across_threads() {
    let record = record();
    let fresh = Container::from_bytes(record_schema(), &record.to_bytes().unwrap()).unwrap();
    let roots: Vec<Root> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4).map(|_| scope.spawn(|| fresh.hash_tree_root())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(roots.iter().all(|root| *root == record.hash_tree_root()));
}

#[test]
fn very_large_limits_stay_cheap() {
    let schema = Arc::new(ListSchema::new(Schema::byte_list(1 << 30), 1 << 20).unwrap());
    let list = List::new(schema.clone(), vec![Value::Bytes(vec![1, 2, 3])]).unwrap();
    let decoded = List::from_bytes(schema, &list.to_bytes().unwrap()).unwrap();
    assert_eq!(decoded.hash_tree_root(), list.hash_tree_root());
    assert!(matches!(list.node(), Node::Branch(_)));
}
