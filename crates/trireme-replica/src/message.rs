//! Messages exchanged between replicas.
//!
//! Every peer interaction is one of these messages, so the coordination
//! algorithms do not change when the in-process transport is swapped for one
//! that serializes them.

use crate::event::EventOutcome;
use serde::{Deserialize, Serialize};
use trireme_core::{LockGrant, Number, VectorClock};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PeerMessage {
    /// Store a value written under the locking protocol.
    Write { key: String, value: Number },
    /// Lock a key on behalf of the sender.
    Lock { key: String },
    /// Release a key locked on behalf of the sender.
    Unlock { key: String },
    /// Replication event. Causal replicas attach a snapshot of their clock.
    Event {
        key: String,
        value: Number,
        clock: Option<VectorClock>,
    },
}

impl PeerMessage {
    pub fn key(&self) -> &str {
        match self {
            PeerMessage::Write { key, .. }
            | PeerMessage::Lock { key }
            | PeerMessage::Unlock { key }
            | PeerMessage::Event { key, .. } => key,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PeerMessage::Write { .. } => "write",
            PeerMessage::Lock { .. } => "lock",
            PeerMessage::Unlock { .. } => "unlock",
            PeerMessage::Event { .. } => "event",
        }
    }
}

/// What a replica answers after handling a `PeerMessage`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PeerReply {
    Ack,
    Lock(LockGrant),
    Event(EventOutcome),
    Rejected(String),
}
