use std::sync::Arc;

use tracing::trace;

use siloxane_core::{
    Bytes20, Bytes32, Container, ContainerSchema, FixedBytes, List, ListSchema, Root, Schema,
    Uint256, Value,
};

use crate::config::ExecutionConfig;
use crate::error::{ExecutionError, Result};
use crate::transaction::{Transaction, TransactionSchema};

pub const PARENT_HASH: &str = "parent_hash";
pub const COINBASE: &str = "coinbase";
pub const STATE_ROOT: &str = "state_root";
pub const RECEIPT_ROOT: &str = "receipt_root";
pub const LOGS_BLOOM: &str = "logs_bloom";
pub const RANDOM: &str = "random";
pub const BLOCK_NUMBER: &str = "block_number";
pub const GAS_LIMIT: &str = "gas_limit";
pub const GAS_USED: &str = "gas_used";
pub const TIMESTAMP: &str = "timestamp";
pub const EXTRA_DATA: &str = "extra_data";
pub const BASE_FEE_PER_GAS: &str = "base_fee_per_gas";
pub const BLOCK_HASH: &str = "block_hash";
pub const TRANSACTIONS: &str = "transactions";

/// Field values for a new execution payload. Transactions are raw bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadFields {
    pub parent_hash: Bytes32,
    pub coinbase: Bytes20,
    pub state_root: Bytes32,
    pub receipt_root: Bytes32,
    pub logs_bloom: Vec<u8>,
    pub random: Bytes32,
    pub block_number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: Vec<u8>,
    pub base_fee_per_gas: Uint256,
    pub block_hash: Bytes32,
    pub transactions: Vec<Vec<u8>>,
}

/// The 14-field execution payload container, sized by an [`ExecutionConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPayloadSchema {
    container: Arc<ContainerSchema>,
    transactions: Arc<ListSchema>,
    transaction: TransactionSchema,
}

impl ExecutionPayloadSchema {
    pub fn new(config: &ExecutionConfig) -> Result<Self> {
        config.validate()?;
        let transaction = TransactionSchema::new(config)?;
        let transactions = Arc::new(ListSchema::new(
            transaction.as_schema(),
            config.max_transactions_per_payload,
        )?);
        let container = ContainerSchema::new(
            "ExecutionPayload",
            [
                (PARENT_HASH, Schema::BYTES32),
                (COINBASE, Schema::BYTES20),
                (STATE_ROOT, Schema::BYTES32),
                (RECEIPT_ROOT, Schema::BYTES32),
                (LOGS_BLOOM, Schema::byte_vector(config.bytes_per_logs_bloom)?),
                (RANDOM, Schema::BYTES32),
                (BLOCK_NUMBER, Schema::Uint64),
                (GAS_LIMIT, Schema::Uint64),
                (GAS_USED, Schema::Uint64),
                (TIMESTAMP, Schema::Uint64),
                (EXTRA_DATA, Schema::byte_list(config.max_extra_data_bytes)),
                (BASE_FEE_PER_GAS, Schema::Uint256),
                (BLOCK_HASH, Schema::BYTES32),
                (TRANSACTIONS, Schema::List(transactions.clone())),
            ],
        )?;
        Ok(Self {
            container: Arc::new(container),
            transactions,
            transaction,
        })
    }

    pub fn container_schema(&self) -> &Arc<ContainerSchema> {
        &self.container
    }

    pub fn transaction_schema(&self) -> &TransactionSchema {
        &self.transaction
    }

    pub fn transactions_schema(&self) -> &Arc<ListSchema> {
        &self.transactions
    }

    /// Builds a payload, wrapping each transaction as an opaque transaction.
    pub fn create(&self, fields: PayloadFields) -> Result<ExecutionPayload> {
        let transactions = self.transactions_list(&fields.transactions)?;
        let container = Container::new(
            self.container.clone(),
            vec![
                fields.parent_hash.into(),
                fields.coinbase.into(),
                fields.state_root.into(),
                fields.receipt_root.into(),
                fields.logs_bloom.into(),
                fields.random.into(),
                fields.block_number.into(),
                fields.gas_limit.into(),
                fields.gas_used.into(),
                fields.timestamp.into(),
                fields.extra_data.into(),
                fields.base_fee_per_gas.into(),
                fields.block_hash.into(),
                transactions.into(),
            ],
        )?;
        Ok(ExecutionPayload(container))
    }

    /// The payload with every field at its default value.
    pub fn default_payload(&self) -> ExecutionPayload {
        ExecutionPayload(Container::default_for(self.container.clone()))
    }

    pub fn from_bytes(&self, bytes: &[u8]) -> Result<ExecutionPayload> {
        Ok(ExecutionPayload(Container::from_bytes(
            self.container.clone(),
            bytes,
        )?))
    }

    fn transactions_list(&self, transactions: &[Vec<u8>]) -> Result<List> {
        let elements = transactions
            .iter()
            .map(|bytes| -> Result<Value> {
                Ok(self.transaction.create_opaque(bytes)?.into_value())
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(List::new(self.transactions.clone(), elements)?)
    }
}

/// An execution payload backed by a merkle tree.
///
/// Getters decode their field on first access.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPayload(Container);

impl ExecutionPayload {
    pub fn as_container(&self) -> &Container {
        &self.0
    }

    pub fn hash_tree_root(&self) -> Root {
        self.0.hash_tree_root()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.0.to_bytes()?)
    }

    fn fixed<const N: usize>(&self, field: &'static str) -> Result<FixedBytes<N>> {
        self.0
            .get(field)?
            .to_fixed_bytes()
            .ok_or(ExecutionError::UnexpectedFieldType(field))
    }

    fn uint64(&self, field: &'static str) -> Result<u64> {
        self.0
            .get(field)?
            .as_u64()
            .ok_or(ExecutionError::UnexpectedFieldType(field))
    }

    fn bytes(&self, field: &'static str) -> Result<Vec<u8>> {
        match self.0.get(field)? {
            Value::Bytes(bytes) => Ok(bytes),
            _ => Err(ExecutionError::UnexpectedFieldType(field)),
        }
    }

    pub fn parent_hash(&self) -> Result<Bytes32> {
        self.fixed(PARENT_HASH)
    }

    pub fn coinbase(&self) -> Result<Bytes20> {
        self.fixed(COINBASE)
    }

    pub fn state_root(&self) -> Result<Bytes32> {
        self.fixed(STATE_ROOT)
    }

    pub fn receipt_root(&self) -> Result<Bytes32> {
        self.fixed(RECEIPT_ROOT)
    }

    pub fn logs_bloom(&self) -> Result<Vec<u8>> {
        self.bytes(LOGS_BLOOM)
    }

    pub fn random(&self) -> Result<Bytes32> {
        self.fixed(RANDOM)
    }

    pub fn block_number(&self) -> Result<u64> {
        self.uint64(BLOCK_NUMBER)
    }

    pub fn gas_limit(&self) -> Result<u64> {
        self.uint64(GAS_LIMIT)
    }

    pub fn gas_used(&self) -> Result<u64> {
        self.uint64(GAS_USED)
    }

    pub fn timestamp(&self) -> Result<u64> {
        self.uint64(TIMESTAMP)
    }

    pub fn extra_data(&self) -> Result<Vec<u8>> {
        self.bytes(EXTRA_DATA)
    }

    pub fn base_fee_per_gas(&self) -> Result<Uint256> {
        self.0
            .get(BASE_FEE_PER_GAS)?
            .as_uint256()
            .ok_or(ExecutionError::UnexpectedFieldType(BASE_FEE_PER_GAS))
    }

    pub fn block_hash(&self) -> Result<Bytes32> {
        self.fixed(BLOCK_HASH)
    }

    fn transactions_list(&self) -> Result<List> {
        match self.0.get(TRANSACTIONS)? {
            Value::List(list) => Ok(list),
            _ => Err(ExecutionError::UnexpectedFieldType(TRANSACTIONS)),
        }
    }

    pub fn transaction_count(&self) -> Result<usize> {
        Ok(self.transactions_list()?.len())
    }

    pub fn transactions(&self) -> Result<Vec<Transaction>> {
        self.transactions_list()?
            .iter()
            .map(|value| -> Result<Transaction> {
                match value? {
                    Value::Union(union) => Ok(Transaction::from_union(union)),
                    _ => Err(ExecutionError::UnexpectedFieldType(TRANSACTIONS)),
                }
            })
            .collect()
    }

    /// Root of the transactions list, as committed to by the payload root.
    pub fn transactions_root(&self) -> Result<Root> {
        Ok(self.0.field_node(TRANSACTIONS)?.root())
    }

    pub fn with_block_hash(&self, block_hash: Bytes32) -> Result<Self> {
        trace!(%block_hash, "updating payload block hash");
        Ok(ExecutionPayload(self.0.with_field(BLOCK_HASH, block_hash.into())?))
    }

    pub fn with_transactions(
        &self,
        schema: &ExecutionPayloadSchema,
        transactions: &[Vec<u8>],
    ) -> Result<Self> {
        let list = schema.transactions_list(transactions)?;
        Ok(ExecutionPayload(self.0.with_field(TRANSACTIONS, list.into())?))
    }
}
