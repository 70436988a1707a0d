//! Causal-conflict detection with vector clocks.
//!
//! Writes are applied locally at once and bump the replica's own clock
//! component. Nothing is sent; propagation is a separate step that carries a
//! snapshot of the sender's clock. The receiver classifies the event against
//! its own clock, reports a conflict when the two are concurrent, and applies
//! the value in every case.
//!
//! Two policy knobs live in `CausalConfig`: whether applying a remote event
//! bumps the receiver's own component, and which components are merged.

use super::{ReplicationProtocol, WriteStatus};
use crate::config::{CausalConfig, MergeScope, Strategy};
use crate::error::Result;
use crate::event::{EventOutcome, ReplicaEvent};
use crate::id::ReplicaId;
use crate::replica::{ClockState, Replica, ReplicaState};
use tracing::{debug, warn};
use trireme_core::{ConflictDetector, Mutation, Number, VectorClock};

#[derive(Clone, Copy, Debug, Default)]
pub struct CausalDetection {
    config: CausalConfig,
}

impl CausalDetection {
    pub fn new(config: CausalConfig) -> Self {
        Self { config }
    }
}

impl ReplicationProtocol for CausalDetection {
    fn strategy(&self) -> Strategy {
        Strategy::Causal
    }

    fn initial_clock(&self, id: &ReplicaId) -> ClockState {
        ClockState::Vector(VectorClock::with_identities([id.as_str()]))
    }

    fn write(&self, replica: &Replica, key: &str, mutation: Mutation) -> Result<WriteStatus> {
        let (value, clock) = {
            let mut guard = replica.state();
            let ReplicaState { store, clock } = &mut *guard;
            let clock = clock.vector_mut().ok_or_else(|| replica.clock_mismatch())?;

            let value = mutation.apply(key, store.get(key))?;
            store.insert(key, value);
            clock.increment(replica.id().as_str());
            (value, clock.clone())
        };

        debug!(replica = %replica.id(), key, op = mutation.name(), %value, %clock, "local write");
        replica.emit(ReplicaEvent::LocalWrite {
            key: key.to_string(),
            mutation,
            value,
        });
        Ok(WriteStatus::Applied)
    }

    fn receive_event(
        &self,
        replica: &Replica,
        key: &str,
        value: Number,
        sender_clock: Option<&VectorClock>,
    ) -> Result<EventOutcome> {
        let empty = VectorClock::new();
        let sender = sender_clock.unwrap_or(&empty);
        let peer_ids = replica.peer_ids();

        let (order, conflict, merged) = {
            let mut guard = replica.state();
            let ReplicaState { store, clock } = &mut *guard;
            let clock = clock.vector_mut().ok_or_else(|| replica.clock_mismatch())?;

            let current = store.get(key);
            let (order, conflict) = ConflictDetector::detect(key, value, current, clock, sender);

            store.insert(key, value);
            if self.config.bump_on_remote_apply {
                clock.increment(replica.id().as_str());
            }
            match self.config.merge_scope {
                MergeScope::PeersOnly => {
                    clock.merge_over(sender, peer_ids.iter().map(|id| id.as_str()))
                }
                MergeScope::AllKnown => clock.merge(sender),
            }
            (order, conflict, clock.clone())
        };

        debug!(replica = %replica.id(), key, %value, ?order, clock = %merged, "applied event");
        if let Some(conflict) = &conflict {
            let current = conflict
                .current
                .map(|v| v.to_string())
                .unwrap_or_else(|| "none".to_string());
            warn!(
                replica = %replica.id(),
                key,
                incoming = %value,
                current = %current,
                "concurrent writes detected"
            );
            replica.emit(ReplicaEvent::ConflictDetected(conflict.clone()));
        }
        replica.emit(ReplicaEvent::RemoteWrite {
            key: key.to_string(),
            value,
        });

        Ok(EventOutcome {
            order: Some(order),
            conflict,
        })
    }
}
