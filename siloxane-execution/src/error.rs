use thiserror::Error;

use siloxane_core::SszError;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("SSZ error: {0}")]
    Ssz(#[from] SszError),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Transaction has selector {selector}, expected opaque transaction selector {expected}")]
    WrongTransactionSelector { selector: u8, expected: u8 },

    #[error("Field `{0}` does not hold the expected value type")]
    UnexpectedFieldType(&'static str),
}

pub type Result<T> = std::result::Result<T, ExecutionError>;
