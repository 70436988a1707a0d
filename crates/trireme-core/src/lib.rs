//! # trireme-core
//!
//! Storage and coordination-metadata primitives shared by every Trireme
//! replication strategy.
//!
//! This crate provides:
//! - `Number` and `Mutation`: values and the `set`/`add`/`multiply` changes applied to them
//! - `KeyValueMap`: a replica's private copy of the data
//! - `LockMap`: per-key binary locks for the pessimistic strategy
//! - `VectorClock` and `ConflictDetector`: causal classification of events

pub mod causal;
pub mod error;
pub mod lock;
pub mod mutation;
pub mod number;
pub mod store;
pub mod vector_clock;

pub use causal::{CausalOrder, Conflict, ConflictDetector};
pub use error::{CoreError, Result};
pub use lock::{LockGrant, LockMap, LockState};
pub use mutation::Mutation;
pub use number::Number;
pub use store::KeyValueMap;
pub use vector_clock::VectorClock;
