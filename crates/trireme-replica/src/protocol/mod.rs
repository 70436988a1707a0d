//! Replication protocols.
//!
//! A protocol decides what a replica does around a local mutation: which
//! messages go to peers, in what order, and what happens to their replies.
//! All three strategies share the replica's entity model and only differ in
//! the algorithm implemented here.
//!
//! | strategy         | before the write        | after the write              |
//! |------------------|-------------------------|------------------------------|
//! | `Unsynchronized` | nothing                 | `Event` to every peer        |
//! | `Locking`        | local lock, `Lock` out  | `Write` out, `Unlock` out    |
//! | `Causal`         | nothing                 | bump own clock component     |

mod causal;
mod locking;
mod unsynchronized;

pub use causal::CausalDetection;
pub use locking::PessimisticLocking;
pub use unsynchronized::Unsynchronized;

use crate::config::{ReplicaConfig, Strategy};
use crate::error::Result;
use crate::event::EventOutcome;
use crate::id::ReplicaId;
use crate::replica::{ClockState, Replica};
use serde::{Deserialize, Serialize};
use trireme_core::{Mutation, Number, VectorClock};

/// Outcome of a client mutation.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteStatus {
    Applied,
    /// The key was locked at this replica. Retrying is up to the caller.
    LockUnavailable,
}

impl WriteStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, WriteStatus::Applied)
    }
}

pub trait ReplicationProtocol: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// Metadata a fresh replica starts with.
    fn initial_clock(&self, id: &ReplicaId) -> ClockState;

    /// Perform a client mutation at `replica`.
    fn write(&self, replica: &Replica, key: &str, mutation: Mutation) -> Result<WriteStatus>;

    /// Apply a replication event sent by a peer.
    ///
    /// Without clocks the incoming value simply overwrites the local one.
    fn receive_event(
        &self,
        replica: &Replica,
        key: &str,
        value: Number,
        _sender_clock: Option<&VectorClock>,
    ) -> Result<EventOutcome> {
        replica.store_incoming(key, value);
        Ok(EventOutcome::unordered())
    }
}

pub fn for_config(config: &ReplicaConfig) -> Box<dyn ReplicationProtocol> {
    match config.strategy {
        Strategy::Unsynchronized => Box::new(Unsynchronized),
        Strategy::Locking => Box::new(PessimisticLocking),
        Strategy::Causal => Box::new(CausalDetection::new(config.causal)),
    }
}

/// Read-modify-write `key` under the replica's state lock.
pub(crate) fn apply_local(replica: &Replica, key: &str, mutation: Mutation) -> Result<Number> {
    let mut state = replica.state();
    let current = state.store.get(key);
    let value = mutation.apply(key, current)?;
    state.store.insert(key, value);
    Ok(value)
}
