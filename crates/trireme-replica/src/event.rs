//! Observable replica events and receive outcomes.

use serde::{Deserialize, Serialize};
use trireme_core::{CausalOrder, Conflict, Mutation, Number};

/// Result of `receive_event` at one replica.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventOutcome {
    /// Causal classification. `None` for strategies without clocks.
    pub order: Option<CausalOrder>,
    /// Set when the event was concurrent with the receiver's state.
    pub conflict: Option<Conflict>,
}

impl EventOutcome {
    /// Outcome of an event applied without any causal check.
    pub fn unordered() -> Self {
        Self::default()
    }

    pub fn is_conflict(&self) -> bool {
        self.conflict.is_some()
    }
}

/// Events emitted by a replica to its subscribers.
#[derive(Clone, Debug, PartialEq)]
pub enum ReplicaEvent {
    /// A client mutation was applied to the local map.
    LocalWrite {
        key: String,
        mutation: Mutation,
        value: Number,
    },
    /// A peer's value was applied to the local map.
    RemoteWrite { key: String, value: Number },
    /// A local mutation was refused because the key was already locked.
    LockContended { key: String },
    /// A concurrent write was detected and applied anyway.
    ConflictDetected(Conflict),
    /// The vector clock was zeroed.
    ClockReset,
}
