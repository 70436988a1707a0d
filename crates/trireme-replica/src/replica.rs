//! A named replica of the key-value map.
//!
//! A replica owns its map and its coordination metadata outright and reaches
//! its peers only through weak references. Both the map and the metadata sit
//! behind one mutex, so a local read-modify-write and the clock or lock
//! update that goes with it are atomic with respect to other local callers.
//! The mutex is never held while a message is handed to the transport.

use crate::config::{ReplicaConfig, Strategy};
use crate::error::{ReplicaError, Result};
use crate::event::{EventOutcome, ReplicaEvent};
use crate::id::ReplicaId;
use crate::message::{PeerMessage, PeerReply};
use crate::protocol::{self, ReplicationProtocol, WriteStatus};
use crate::transport::{ImmediateTransport, Transport};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use trireme_core::{KeyValueMap, LockGrant, LockMap, LockState, Mutation, Number, VectorClock};

/// Strategy-specific coordination metadata.
#[derive(Clone, Debug, PartialEq)]
pub enum ClockState {
    /// Unsynchronized replicas keep no metadata.
    None,
    Locks(LockMap),
    Vector(VectorClock),
}

impl ClockState {
    pub fn locks(&self) -> Option<&LockMap> {
        match self {
            ClockState::Locks(locks) => Some(locks),
            _ => None,
        }
    }

    pub fn locks_mut(&mut self) -> Option<&mut LockMap> {
        match self {
            ClockState::Locks(locks) => Some(locks),
            _ => None,
        }
    }

    pub fn vector(&self) -> Option<&VectorClock> {
        match self {
            ClockState::Vector(clock) => Some(clock),
            _ => None,
        }
    }

    pub fn vector_mut(&mut self) -> Option<&mut VectorClock> {
        match self {
            ClockState::Vector(clock) => Some(clock),
            _ => None,
        }
    }
}

pub(crate) struct ReplicaState {
    pub(crate) store: KeyValueMap,
    pub(crate) clock: ClockState,
}

struct PeerLink {
    id: ReplicaId,
    replica: Weak<Replica>,
}

/// Replies collected from one fan-out, one entry per live peer.
pub type Deliveries = Vec<(ReplicaId, Option<PeerReply>)>;

pub struct Replica {
    id: ReplicaId,
    config: ReplicaConfig,
    protocol: Box<dyn ReplicationProtocol>,
    transport: Arc<dyn Transport>,
    state: Mutex<ReplicaState>,
    peers: RwLock<Vec<PeerLink>>,
    events: broadcast::Sender<ReplicaEvent>,
}

impl Replica {
    /// Create a replica whose peer calls are delivered immediately.
    pub fn new(
        id: impl Into<ReplicaId>,
        initial: KeyValueMap,
        config: ReplicaConfig,
    ) -> Result<Arc<Self>> {
        Self::with_transport(id, initial, config, Arc::new(ImmediateTransport))
    }

    pub fn with_transport(
        id: impl Into<ReplicaId>,
        initial: KeyValueMap,
        config: ReplicaConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        let id = id.into();
        let protocol = protocol::for_config(&config);
        let clock = protocol.initial_clock(&id);
        let (events, _) = broadcast::channel(config.event_capacity);

        info!(replica = %id, strategy = ?config.strategy, keys = initial.len(), "replica created");

        Ok(Arc::new(Self {
            id,
            config,
            protocol,
            transport,
            state: Mutex::new(ReplicaState {
                store: initial,
                clock,
            }),
            peers: RwLock::new(Vec::new()),
            events,
        }))
    }

    pub fn id(&self) -> &ReplicaId {
        &self.id
    }

    pub fn strategy(&self) -> Strategy {
        self.protocol.strategy()
    }

    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    /// Subscribe to this replica's events.
    pub fn subscribe(&self) -> broadcast::Receiver<ReplicaEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Wiring
    // ------------------------------------------------------------------

    /// Add peers. Causal replicas start tracking each new peer at zero.
    ///
    /// Attaching a replica to itself or attaching the same identity twice
    /// is rejected; nothing is attached in that case.
    pub fn attach_peers(&self, peers: &[Arc<Replica>]) -> Result<()> {
        let mut links = self.peers.write();

        for (i, peer) in peers.iter().enumerate() {
            if peer.id == self.id {
                return Err(ReplicaError::SelfPeer(self.id.to_string()));
            }
            let repeated = peers[..i].iter().any(|p| p.id == peer.id);
            if repeated || links.iter().any(|l| l.id == peer.id) {
                return Err(ReplicaError::DuplicateReplica(peer.id.to_string()));
            }
        }

        let mut state = self.state.lock();
        for peer in peers {
            links.push(PeerLink {
                id: peer.id.clone(),
                replica: Arc::downgrade(peer),
            });
            if let Some(clock) = state.clock.vector_mut() {
                clock.track(peer.id.as_str());
            }
        }

        info!(replica = %self.id, added = peers.len(), total = links.len(), "peers attached");
        Ok(())
    }

    /// Identities of every attached peer, live or not.
    pub fn peer_ids(&self) -> Vec<ReplicaId> {
        self.peers.read().iter().map(|l| l.id.clone()).collect()
    }

    /// Attached peers that are still alive.
    pub fn peers(&self) -> Vec<Arc<Replica>> {
        self.peers
            .read()
            .iter()
            .filter_map(|l| l.replica.upgrade())
            .collect()
    }

    // ------------------------------------------------------------------
    // Client operations
    // ------------------------------------------------------------------

    pub fn set(&self, key: &str, value: impl Into<Number>) -> Result<WriteStatus> {
        self.write(key, Mutation::Set(value.into()))
    }

    pub fn add(&self, key: &str, delta: impl Into<Number>) -> Result<WriteStatus> {
        self.write(key, Mutation::Add(delta.into()))
    }

    pub fn multiply(&self, key: &str, factor: impl Into<Number>) -> Result<WriteStatus> {
        self.write(key, Mutation::Multiply(factor.into()))
    }

    /// Run a mutation through this replica's replication protocol.
    pub fn write(&self, key: &str, mutation: Mutation) -> Result<WriteStatus> {
        self.protocol.write(self, key, mutation)
    }

    /// Read the local copy without any coordination.
    pub fn get_local(&self, key: &str) -> Option<Number> {
        self.state.lock().store.get(key)
    }

    pub fn snapshot(&self) -> BTreeMap<String, Number> {
        self.state.lock().store.snapshot()
    }

    /// A copy of the vector clock, for causal replicas.
    pub fn clock_snapshot(&self) -> Option<VectorClock> {
        self.state.lock().clock.vector().cloned()
    }

    /// Lock state of `key`. Replicas without a lock map always report unlocked.
    pub fn lock_state(&self, key: &str) -> LockState {
        self.state
            .lock()
            .clock
            .locks()
            .map(|locks| locks.state(key))
            .unwrap_or_default()
    }

    /// Zero every component of the vector clock. No-op for other strategies.
    pub fn reset_clock(&self) {
        let reset = match self.state.lock().clock.vector_mut() {
            Some(clock) => {
                clock.reset();
                true
            }
            None => false,
        };
        if reset {
            info!(replica = %self.id, "vector clock reset");
            self.emit(ReplicaEvent::ClockReset);
        }
    }

    /// Send the current value of `key` to every peer as a replication event.
    ///
    /// Causal replicas attach a snapshot of their clock. Returns an empty
    /// list when the key has never been written.
    pub fn propagate(&self, key: &str) -> Deliveries {
        let (value, clock) = {
            let state = self.state.lock();
            (state.store.get(key), state.clock.vector().cloned())
        };

        match value {
            Some(value) => self.broadcast(PeerMessage::Event {
                key: key.to_string(),
                value,
                clock,
            }),
            None => Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Peer-facing operations
    // ------------------------------------------------------------------

    /// Store a value pushed by a peer under the locking protocol.
    pub fn apply_remote_write(&self, key: &str, value: Number) {
        self.store_incoming(key, value);
    }

    /// Lock `key` on behalf of a peer. The key ends up locked either way.
    pub fn apply_remote_lock(&self, key: &str) -> LockGrant {
        let grant = match self.state.lock().clock.locks_mut() {
            Some(locks) => locks.force_lock(key),
            None => LockGrant::Granted,
        };
        debug!(replica = %self.id, key, ?grant, "remote lock");
        grant
    }

    pub fn apply_remote_unlock(&self, key: &str) {
        if let Some(locks) = self.state.lock().clock.locks_mut() {
            locks.unlock(key);
        }
        debug!(replica = %self.id, key, "remote unlock");
    }

    /// Apply a replication event from a peer.
    pub fn receive_event(
        &self,
        key: &str,
        value: Number,
        sender_clock: Option<&VectorClock>,
    ) -> Result<EventOutcome> {
        self.protocol.receive_event(self, key, value, sender_clock)
    }

    /// Entry point used by transports.
    pub fn handle_message(&self, from: &ReplicaId, message: PeerMessage) -> PeerReply {
        debug!(replica = %self.id, from = %from, kind = message.kind(), key = message.key(), "handling peer message");
        match message {
            PeerMessage::Write { key, value } => {
                self.apply_remote_write(&key, value);
                PeerReply::Ack
            }
            PeerMessage::Lock { key } => PeerReply::Lock(self.apply_remote_lock(&key)),
            PeerMessage::Unlock { key } => {
                self.apply_remote_unlock(&key);
                PeerReply::Ack
            }
            PeerMessage::Event { key, value, clock } => {
                match self.receive_event(&key, value, clock.as_ref()) {
                    Ok(outcome) => PeerReply::Event(outcome),
                    Err(e) => {
                        error!(replica = %self.id, from = %from, key = %key, error = %e, "rejected event");
                        PeerReply::Rejected(e.to_string())
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Protocol support
    // ------------------------------------------------------------------

    pub(crate) fn state(&self) -> MutexGuard<'_, ReplicaState> {
        self.state.lock()
    }

    pub(crate) fn emit(&self, event: ReplicaEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Overwrite `key` with a value that came from a peer.
    pub(crate) fn store_incoming(&self, key: &str, value: Number) {
        self.state.lock().store.insert(key, value);
        debug!(replica = %self.id, key, %value, "applied remote write");
        self.emit(ReplicaEvent::RemoteWrite {
            key: key.to_string(),
            value,
        });
    }

    pub(crate) fn clock_mismatch(&self) -> ReplicaError {
        ReplicaError::ClockMismatch {
            replica: self.id.to_string(),
            expected: self.strategy(),
        }
    }

    /// Send `message` to every live peer through the transport.
    pub(crate) fn broadcast(&self, message: PeerMessage) -> Deliveries {
        let targets: Vec<(ReplicaId, Option<Arc<Replica>>)> = self
            .peers
            .read()
            .iter()
            .map(|l| (l.id.clone(), l.replica.upgrade()))
            .collect();

        let mut deliveries = Vec::with_capacity(targets.len());
        for (peer_id, peer) in targets {
            match peer {
                Some(peer) => {
                    let reply = self.transport.deliver(&self.id, &peer, message.clone());
                    if let Some(PeerReply::Rejected(reason)) = &reply {
                        warn!(replica = %self.id, peer = %peer_id, reason = %reason, "peer rejected message");
                    }
                    deliveries.push((peer_id, reply));
                }
                None => {
                    debug!(replica = %self.id, peer = %peer_id, "skipping released peer");
                }
            }
        }
        deliveries
    }
}

impl fmt::Debug for Replica {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replica")
            .field("id", &self.id)
            .field("strategy", &self.strategy())
            .field("peers", &self.peer_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReplicaConfigBuilder;

    fn replica(id: &str, strategy: Strategy) -> Arc<Replica> {
        Replica::new(id, KeyValueMap::new(), ReplicaConfig::new(strategy)).unwrap()
    }

    #[test]
    fn test_initial_clock_state_matches_strategy() {
        assert_eq!(replica("a", Strategy::Unsynchronized).clock_snapshot(), None);
        assert_eq!(replica("a", Strategy::Locking).clock_snapshot(), None);
        assert_eq!(
            replica("a", Strategy::Causal).clock_snapshot(),
            Some(VectorClock::with_identities(["a"]))
        );
    }

    #[test]
    fn test_attach_peers_tracks_clock_entries() {
        let a = replica("a", Strategy::Causal);
        let b = replica("b", Strategy::Causal);
        let c = replica("c", Strategy::Causal);

        a.attach_peers(&[b.clone(), c.clone()]).unwrap();
        assert_eq!(a.peer_ids(), vec![ReplicaId::new("b"), ReplicaId::new("c")]);
        assert_eq!(
            a.clock_snapshot().unwrap(),
            VectorClock::with_identities(["a", "b", "c"])
        );
        // Wiring is not symmetric by itself.
        assert!(b.peer_ids().is_empty());
    }

    #[test]
    fn test_attach_rejects_self_and_duplicates() {
        let a = replica("a", Strategy::Unsynchronized);
        let b = replica("b", Strategy::Unsynchronized);

        assert_eq!(
            a.attach_peers(&[a.clone()]),
            Err(ReplicaError::SelfPeer("a".to_string()))
        );
        assert_eq!(
            a.attach_peers(&[b.clone(), b.clone()]),
            Err(ReplicaError::DuplicateReplica("b".to_string()))
        );
        assert!(a.peer_ids().is_empty());

        a.attach_peers(&[b.clone()]).unwrap();
        assert!(a.attach_peers(&[b.clone()]).is_err());
    }

    #[test]
    fn test_released_peer_is_skipped() {
        let a = replica("a", Strategy::Unsynchronized);
        {
            let b = replica("b", Strategy::Unsynchronized);
            a.attach_peers(&[b]).unwrap();
        }
        assert!(a.peers().is_empty());
        assert_eq!(a.peer_ids().len(), 1);
        assert_eq!(a.set("x", 1).unwrap(), WriteStatus::Applied);
        assert!(a.propagate("x").is_empty());
    }

    #[test]
    fn test_remote_lock_on_replica_without_lock_map() {
        let a = replica("a", Strategy::Causal);
        assert_eq!(a.apply_remote_lock("x"), LockGrant::Granted);
        assert_eq!(a.lock_state("x"), LockState::Unlocked);
    }

    #[test]
    fn test_reset_clock_emits_event() {
        let a = replica("a", Strategy::Causal);
        let mut events = a.subscribe();
        a.set("x", 1).unwrap();
        a.reset_clock();

        assert_eq!(a.clock_snapshot().unwrap().get("a"), 0);
        assert!(matches!(events.try_recv(), Ok(ReplicaEvent::LocalWrite { .. })));
        assert_eq!(events.try_recv(), Ok(ReplicaEvent::ClockReset));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ReplicaConfigBuilder::new().event_capacity(0).build();
        assert!(matches!(
            Replica::new("a", KeyValueMap::new(), config),
            Err(ReplicaError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_handle_message_dispatch() {
        let a = replica("a", Strategy::Locking);
        let from = ReplicaId::new("b");

        let reply = a.handle_message(&from, PeerMessage::Lock { key: "x".into() });
        assert_eq!(reply, PeerReply::Lock(LockGrant::Granted));
        assert_eq!(a.lock_state("x"), LockState::Locked);

        let reply = a.handle_message(
            &from,
            PeerMessage::Write {
                key: "x".into(),
                value: Number::Int(3),
            },
        );
        assert_eq!(reply, PeerReply::Ack);
        assert_eq!(a.get_local("x"), Some(Number::Int(3)));

        a.handle_message(&from, PeerMessage::Unlock { key: "x".into() });
        assert_eq!(a.lock_state("x"), LockState::Unlocked);
    }
}
