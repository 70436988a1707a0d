//! Error types for the storage primitives.

use thiserror::Error;

/// Errors raised while computing or loading stored values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Integer overflow computing {op} on key {key}")]
    Overflow { key: String, op: &'static str },

    #[error("Non-finite result computing {op} on key {key}")]
    NonFinite { key: String, op: &'static str },

    #[error("Value for key {key} is not numeric: {found}")]
    NonNumeric { key: String, found: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
