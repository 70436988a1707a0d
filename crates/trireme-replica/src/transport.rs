//! Transports deliver `PeerMessage`s between replicas.
//!
//! `ImmediateTransport` hands each message to the peer synchronously and
//! returns its reply. `QueuedTransport` parks messages in flight until the
//! caller delivers them, which makes interleavings and delivery order
//! explicit and reproducible.

use crate::id::ReplicaId;
use crate::message::{PeerMessage, PeerReply};
use crate::replica::Replica;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Delivers messages from one replica to another.
pub trait Transport: Send + Sync {
    /// Send `message` to `to`. Returns the peer's reply when delivery is
    /// synchronous, `None` when the message is only queued.
    fn deliver(&self, from: &ReplicaId, to: &Arc<Replica>, message: PeerMessage)
        -> Option<PeerReply>;
}

/// Calls the peer directly on the sender's thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateTransport;

impl Transport for ImmediateTransport {
    fn deliver(
        &self,
        from: &ReplicaId,
        to: &Arc<Replica>,
        message: PeerMessage,
    ) -> Option<PeerReply> {
        Some(to.handle_message(from, message))
    }
}

/// A message waiting in a `QueuedTransport`.
#[derive(Clone, Debug)]
pub struct InFlight {
    pub from: ReplicaId,
    pub to: ReplicaId,
    pub message: PeerMessage,
    target: Weak<Replica>,
}

/// Holds messages until they are explicitly delivered.
///
/// One queue is normally shared by every replica of a simulated network.
#[derive(Debug, Default)]
pub struct QueuedTransport {
    in_flight: Mutex<VecDeque<InFlight>>,
}

impl QueuedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.lock().is_empty()
    }

    /// Copies of the queued messages, oldest first.
    pub fn pending_messages(&self) -> Vec<InFlight> {
        self.in_flight.lock().iter().cloned().collect()
    }

    /// Deliver the oldest message. Returns `None` once the queue is empty.
    pub fn deliver_next(&self) -> Option<(InFlight, Option<PeerReply>)> {
        let next = self.in_flight.lock().pop_front()?;
        let reply = Self::hand_over(&next);
        Some((next, reply))
    }

    /// Deliver the message at position `idx`, out of order.
    pub fn deliver_at(&self, idx: usize) -> Option<(InFlight, Option<PeerReply>)> {
        let picked = self.in_flight.lock().remove(idx)?;
        let reply = Self::hand_over(&picked);
        Some((picked, reply))
    }

    /// Deliver everything queued, including messages queued while delivering.
    pub fn deliver_all(&self) -> usize {
        let mut delivered = 0;
        while self.deliver_next().is_some() {
            delivered += 1;
        }
        delivered
    }

    /// Deliver, in order, every queued message addressed to `to`.
    pub fn deliver_to(&self, to: &ReplicaId) -> usize {
        self.deliver_matching(|m| &m.to == to)
    }

    /// Deliver, in order, every queued message sent by `from`.
    pub fn deliver_from(&self, from: &ReplicaId) -> usize {
        self.deliver_matching(|m| &m.from == from)
    }

    /// Discard every queued message, returning how many were lost.
    pub fn drop_all(&self) -> usize {
        let mut in_flight = self.in_flight.lock();
        let lost = in_flight.len();
        in_flight.clear();
        lost
    }

    fn deliver_matching(&self, pred: impl Fn(&InFlight) -> bool) -> usize {
        let selected: Vec<InFlight> = {
            let mut in_flight = self.in_flight.lock();
            let (selected, rest): (VecDeque<_>, VecDeque<_>) =
                in_flight.drain(..).partition(|m| pred(m));
            *in_flight = rest;
            selected.into_iter().collect()
        };

        for message in &selected {
            Self::hand_over(message);
        }
        selected.len()
    }

    fn hand_over(in_flight: &InFlight) -> Option<PeerReply> {
        match in_flight.target.upgrade() {
            Some(target) => Some(target.handle_message(&in_flight.from, in_flight.message.clone())),
            None => {
                debug!(to = %in_flight.to, kind = in_flight.message.kind(), "dropping message for released replica");
                None
            }
        }
    }
}

impl Transport for QueuedTransport {
    fn deliver(
        &self,
        from: &ReplicaId,
        to: &Arc<Replica>,
        message: PeerMessage,
    ) -> Option<PeerReply> {
        debug!(from = %from, to = %to.id(), kind = message.kind(), key = message.key(), "queued message");
        self.in_flight.lock().push_back(InFlight {
            from: from.clone(),
            to: to.id().clone(),
            message,
            target: Arc::downgrade(to),
        });
        None
    }
}
