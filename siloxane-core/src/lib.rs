//! Siloxane is a schema-driven serialization and merkleization engine.
//!
//! Core concepts:
//! - **Schema**: A closed set of shapes (scalars, byte strings, vectors, bounded lists,
//!   unions, containers) that fixes both the byte layout and the tree layout of a value
//! - **Node**: An immutable binary merkle tree with cached roots; updates rebuild only the
//!   path to the changed node and share everything else
//! - **Container / List / Vector / Union**: Typed views over a backing tree; reads decode
//!   only the leaves they need
//! - **Codec**: Canonical fixed-region, offset-table, variable-region byte encoding
//! - **Merkleizer**: Hash tree roots from chunks, with length and selector mix-ins
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use siloxane_core::{Container, ContainerSchema, Schema, Value};
//!
//! let schema = Arc::new(
//!     ContainerSchema::new("Pair", [("a", Schema::Uint64), ("b", Schema::byte_list(4))]).unwrap(),
//! );
//! let fields = vec![Value::Uint64(1), Value::Bytes(vec![0xaa, 0xbb])];
//! let pair = Container::new(schema.clone(), fields).unwrap();
//!
//! let bytes = pair.to_bytes().unwrap();
//! assert_eq!(&bytes[8..12], &12u32.to_le_bytes());
//!
//! let decoded = Container::from_bytes(schema, &bytes).unwrap();
//! assert_eq!(decoded.hash_tree_root(), pair.hash_tree_root());
//!
//! // Derived instances share every untouched subtree with their source
//! let updated = pair.with_field("a", Value::Uint64(2)).unwrap();
//! assert_eq!(updated.get("b").unwrap(), pair.get("b").unwrap());
//! ```

mod bytes;
pub mod codec;
mod collection;
mod container;
mod error;
mod gindex;
mod hash;
pub mod merkle;
mod node;
mod schema;
mod union;
mod value;

pub use bytes::{Bytes20, Bytes32, Bytes48, FixedBytes, ParseBytesError, Uint256};
pub use collection::{List, Vector};
pub use container::Container;
pub use error::{DecodeError, Result, SszError};
pub use gindex::GIndex;
pub use hash::{
    BYTES_PER_CHUNK, Blake3Hasher, Chunk, DefaultHasher, Hasher, MAX_TREE_DEPTH, Root,
    Sha256Hasher, zero_hash,
};
pub use merkle::Merkleizer;
pub use node::{Branch, Node};
pub use schema::{
    BYTES_PER_OFFSET, BYTES_PER_SELECTOR, ContainerSchema, ListSchema, MAX_DATA_DEPTH,
    MAX_UNION_VARIANTS, Schema, UnionSchema, VectorSchema,
};
pub use union::Union;
pub use value::Value;
