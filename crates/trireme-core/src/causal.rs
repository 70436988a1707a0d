//! Causal classification of an incoming event against a receiver's clock.
//!
//! Given the receiver's clock `Cr` and the sender's clock `Cs`, both compared
//! only over the identities the receiver knows:
//!
//! ```text
//! receiver_ahead = ∀ id ∈ known(Cr): Cr[id] >= Cs[id]
//! sender_ahead   = ∀ id ∈ known(Cr): Cs[id] >= Cr[id]
//!
//! receiver_ahead            => ReceiverAfterSender   (equal clocks land here)
//! sender_ahead              => SenderAfterReceiver
//! neither                   => Concurrent
//! ```
//!
//! Classification is pure. What a replica does with the answer is decided by
//! its replication protocol.

use crate::number::Number;
use crate::vector_clock::VectorClock;
use serde::{Deserialize, Serialize};

/// How an incoming event relates causally to the receiver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CausalOrder {
    /// The receiver is stale; the event should simply be adopted.
    SenderAfterReceiver,
    /// The event is stale or a duplicate.
    ReceiverAfterSender,
    /// Neither clock is component-wise ahead: a genuine causal conflict.
    Concurrent,
}

impl CausalOrder {
    pub fn is_conflict(&self) -> bool {
        matches!(self, CausalOrder::Concurrent)
    }
}

/// Signal raised when a receiver applies a concurrent write.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub key: String,
    /// Value carried by the incoming event.
    pub incoming: Number,
    /// Value the receiver held before applying the event.
    pub current: Option<Number>,
    pub receiver_clock: VectorClock,
    pub sender_clock: VectorClock,
}

/// Compares vector clocks.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConflictDetector;

impl ConflictDetector {
    pub fn classify(receiver: &VectorClock, sender: &VectorClock) -> CausalOrder {
        if receiver.dominates_over_known(sender) {
            CausalOrder::ReceiverAfterSender
        } else if receiver.dominated_over_known(sender) {
            CausalOrder::SenderAfterReceiver
        } else {
            CausalOrder::Concurrent
        }
    }

    /// Classify and, on concurrency, build the conflict report.
    pub fn detect(
        key: &str,
        incoming: Number,
        current: Option<Number>,
        receiver: &VectorClock,
        sender: &VectorClock,
    ) -> (CausalOrder, Option<Conflict>) {
        let order = Self::classify(receiver, sender);
        let conflict = order.is_conflict().then(|| Conflict {
            key: key.to_string(),
            incoming,
            current,
            receiver_clock: receiver.clone(),
            sender_clock: sender.clone(),
        });
        (order, conflict)
    }
}
