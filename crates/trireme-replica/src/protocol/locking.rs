//! Pessimistic locking.
//!
//! ```text
//! 1. local lock held?      -> LockUnavailable
//! 2. lock locally, Lock    -> every peer (replies never fail the write)
//! 3. apply the mutation locally
//! 4. Write                 -> every peer
//! 5. unlock locally, Unlock -> every peer
//! ```
//!
//! Step 1 only inspects this replica's lock map. Two replicas can both pass
//! it before either one's `Lock` message arrives, and each will then write
//! and unlock the other's key. Exclusion holds per replica, not across the
//! system, and is left that way.

use super::{apply_local, ReplicationProtocol, WriteStatus};
use crate::config::Strategy;
use crate::error::Result;
use crate::event::ReplicaEvent;
use crate::id::ReplicaId;
use crate::message::{PeerMessage, PeerReply};
use crate::replica::{ClockState, Replica};
use tracing::{debug, warn};
use trireme_core::{LockGrant, LockMap, Mutation};

#[derive(Clone, Copy, Debug, Default)]
pub struct PessimisticLocking;

impl PessimisticLocking {
    fn try_lock_local(&self, replica: &Replica, key: &str) -> Result<bool> {
        let mut state = replica.state();
        let locks = state
            .clock
            .locks_mut()
            .ok_or_else(|| replica.clock_mismatch())?;
        Ok(locks.try_lock(key))
    }

    fn release(&self, replica: &Replica, key: &str) {
        if let Some(locks) = replica.state().clock.locks_mut() {
            locks.unlock(key);
        }
        replica.broadcast(PeerMessage::Unlock {
            key: key.to_string(),
        });
        debug!(replica = %replica.id(), key, "lock released");
    }
}

impl ReplicationProtocol for PessimisticLocking {
    fn strategy(&self) -> Strategy {
        Strategy::Locking
    }

    fn initial_clock(&self, _id: &ReplicaId) -> ClockState {
        ClockState::Locks(LockMap::new())
    }

    fn write(&self, replica: &Replica, key: &str, mutation: Mutation) -> Result<WriteStatus> {
        if !self.try_lock_local(replica, key)? {
            warn!(replica = %replica.id(), key, op = mutation.name(), "failed to acquire lock, retry");
            replica.emit(ReplicaEvent::LockContended {
                key: key.to_string(),
            });
            return Ok(WriteStatus::LockUnavailable);
        }

        let grants = replica.broadcast(PeerMessage::Lock {
            key: key.to_string(),
        });
        for (peer, reply) in &grants {
            if let Some(PeerReply::Lock(LockGrant::AlreadyLocked)) = reply {
                warn!(replica = %replica.id(), peer = %peer, key, "peer already held the lock; proceeding");
            }
        }

        let applied = apply_local(replica, key, mutation);
        if let Ok(value) = applied {
            debug!(replica = %replica.id(), key, op = mutation.name(), %value, "local write under lock");
            replica.emit(ReplicaEvent::LocalWrite {
                key: key.to_string(),
                mutation,
                value,
            });
            replica.broadcast(PeerMessage::Write {
                key: key.to_string(),
                value,
            });
        }

        self.release(replica, key);
        applied.map(|_| WriteStatus::Applied)
    }
}
