use std::sync::Arc;

use siloxane_core::{Root, Schema, Union, UnionSchema, Value};

use crate::config::ExecutionConfig;
use crate::error::{ExecutionError, Result};

pub const OPAQUE_TRANSACTION_SELECTOR: u8 = 0;

/// Schema of a transaction: a union whose only variant is an opaque byte list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSchema {
    union: Arc<UnionSchema>,
}

impl TransactionSchema {
    pub fn new(config: &ExecutionConfig) -> Result<Self> {
        let opaque = Schema::byte_list(config.max_bytes_per_transaction);
        Ok(Self {
            union: Arc::new(UnionSchema::new([opaque])?),
        })
    }

    pub fn as_schema(&self) -> Schema {
        Schema::Union(self.union.clone())
    }

    pub fn union_schema(&self) -> &Arc<UnionSchema> {
        &self.union
    }

    /// Wraps raw transaction bytes as an opaque transaction.
    pub fn create_opaque(&self, bytes: &[u8]) -> Result<Transaction> {
        let union = Union::new(
            self.union.clone(),
            OPAQUE_TRANSACTION_SELECTOR,
            Value::Bytes(bytes.to_vec()),
        )?;
        Ok(Transaction(union))
    }

    pub fn from_bytes(&self, bytes: &[u8]) -> Result<Transaction> {
        Ok(Transaction(Union::from_bytes(self.union.clone(), bytes)?))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction(Union);

impl Transaction {
    pub fn from_union(union: Union) -> Self {
        Transaction(union)
    }

    pub fn selector(&self) -> u8 {
        self.0.selector()
    }

    /// The raw transaction bytes, if this is an opaque transaction.
    pub fn opaque_transaction(&self) -> Result<Vec<u8>> {
        if self.0.selector() != OPAQUE_TRANSACTION_SELECTOR {
            return Err(ExecutionError::WrongTransactionSelector {
                selector: self.0.selector(),
                expected: OPAQUE_TRANSACTION_SELECTOR,
            });
        }
        match self.0.value()? {
            Value::Bytes(bytes) => Ok(bytes),
            _ => Err(ExecutionError::UnexpectedFieldType("opaque_transaction")),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.0.to_bytes()?)
    }

    pub fn hash_tree_root(&self) -> Root {
        self.0.hash_tree_root()
    }

    pub fn as_union(&self) -> &Union {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Union(self.0)
    }
}
