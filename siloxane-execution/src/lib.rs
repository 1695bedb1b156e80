//! Execution-layer containers built on `siloxane-core`.
//!
//! - **ExecutionPayloadSchema / ExecutionPayload**: the 14-field payload container
//! - **Transaction**: a union whose only variant is an opaque byte list
//! - **ExecutionConfig**: per-network size limits, loadable from TOML
//! - **KzgBackend**: the boundary to an external blob proof implementation

mod config;
mod error;
mod kzg;
mod payload;
mod transaction;

pub use config::ExecutionConfig;
pub use error::{ExecutionError, Result};
pub use kzg::{KzgBackend, KzgCommitment, KzgProof, compute_blob_proof, verify_blob_proof};
pub use payload::{ExecutionPayload, ExecutionPayloadSchema, PayloadFields};
pub use transaction::{OPAQUE_TRANSACTION_SELECTOR, Transaction, TransactionSchema};
