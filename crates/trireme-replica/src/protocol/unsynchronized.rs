//! Unsynchronized replication.
//!
//! Each mutation is applied locally and pushed to every peer straight away.
//! Nothing orders concurrent writers: a peer keeps whichever value reached
//! it last, so concurrent updates to one key are lost without notice.

use super::{apply_local, ReplicationProtocol, WriteStatus};
use crate::config::Strategy;
use crate::error::Result;
use crate::event::ReplicaEvent;
use crate::id::ReplicaId;
use crate::message::PeerMessage;
use crate::replica::{ClockState, Replica};
use tracing::debug;
use trireme_core::Mutation;

#[derive(Clone, Copy, Debug, Default)]
pub struct Unsynchronized;

impl ReplicationProtocol for Unsynchronized {
    fn strategy(&self) -> Strategy {
        Strategy::Unsynchronized
    }

    fn initial_clock(&self, _id: &ReplicaId) -> ClockState {
        ClockState::None
    }

    fn write(&self, replica: &Replica, key: &str, mutation: Mutation) -> Result<WriteStatus> {
        let value = apply_local(replica, key, mutation)?;
        debug!(replica = %replica.id(), key, op = mutation.name(), %value, "local write");
        replica.emit(ReplicaEvent::LocalWrite {
            key: key.to_string(),
            mutation,
            value,
        });

        replica.broadcast(PeerMessage::Event {
            key: key.to_string(),
            value,
            clock: None,
        });
        Ok(WriteStatus::Applied)
    }
}
