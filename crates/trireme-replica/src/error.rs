//! Error types for replica operations.
//!
//! Lock contention and causal conflicts are not errors: they are reported
//! through `WriteStatus` and `EventOutcome`.

use crate::config::Strategy;
use thiserror::Error;
use trireme_core::CoreError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReplicaError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Duplicate replica identity: {0}")]
    DuplicateReplica(String),

    #[error("Replica {0} cannot be its own peer")]
    SelfPeer(String),

    #[error("Replica not found: {0}")]
    UnknownReplica(String),

    #[error("Replica {replica} does not carry {expected:?} clock state")]
    ClockMismatch { replica: String, expected: Strategy },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for ReplicaError {
    fn from(err: serde_json::Error) -> Self {
        ReplicaError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReplicaError>;
