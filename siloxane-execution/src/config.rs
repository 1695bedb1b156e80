use std::path::Path;

use serde::Deserialize;

use siloxane_core::MAX_DATA_DEPTH;

use crate::error::{ExecutionError, Result};

/// Per-network size limits for execution payload schemas.
///
/// Missing keys take mainnet values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub bytes_per_logs_bloom: usize,
    pub max_extra_data_bytes: u64,
    pub max_transactions_per_payload: u64,
    pub max_bytes_per_transaction: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            bytes_per_logs_bloom: 256,
            max_extra_data_bytes: 32,
            max_transactions_per_payload: 1 << 20,
            max_bytes_per_transaction: 1 << 30,
        }
    }
}

impl ExecutionConfig {
    pub fn mainnet() -> Self {
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ExecutionConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bytes_per_logs_bloom == 0 {
            return Err(ExecutionError::InvalidConfig(
                "bytes_per_logs_bloom must be positive".into(),
            ));
        }
        let max_transactions = 1u64 << MAX_DATA_DEPTH;
        if self.max_transactions_per_payload > max_transactions {
            return Err(ExecutionError::InvalidConfig(format!(
                "max_transactions_per_payload {} exceeds {max_transactions}",
                self.max_transactions_per_payload
            )));
        }
        Ok(())
    }
}
