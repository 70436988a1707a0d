//! Vector clock for causal-conflict detection.
//!
//! A vector clock maps every replica identity a node knows about to a logical
//! counter. Unlike a sparse version vector, a known identity with a zero
//! counter is kept as an explicit entry: the set of known identities decides
//! which components take part in comparisons and merges.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorClock {
    entries: BTreeMap<String, u64>,
}

impl VectorClock {
    /// Create an empty vector clock.
    pub fn new() -> Self {
        VectorClock {
            entries: BTreeMap::new(),
        }
    }

    /// Create a clock that knows `ids`, every counter at zero.
    pub fn with_identities<S: Into<String>>(ids: impl IntoIterator<Item = S>) -> Self {
        VectorClock {
            entries: ids.into_iter().map(|id| (id.into(), 0)).collect(),
        }
    }

    pub fn from_entries<S: Into<String>>(entries: impl IntoIterator<Item = (S, u64)>) -> Self {
        VectorClock {
            entries: entries.into_iter().map(|(id, c)| (id.into(), c)).collect(),
        }
    }

    /// Counter for a replica. Unknown replicas read as zero.
    pub fn get(&self, replica_id: &str) -> u64 {
        self.entries.get(replica_id).copied().unwrap_or(0)
    }

    pub fn set(&mut self, replica_id: impl Into<String>, counter: u64) {
        self.entries.insert(replica_id.into(), counter);
    }

    /// Start tracking a replica at zero. An already known replica keeps its counter.
    pub fn track(&mut self, replica_id: impl Into<String>) {
        self.entries.entry(replica_id.into()).or_insert(0);
    }

    pub fn knows(&self, replica_id: &str) -> bool {
        self.entries.contains_key(replica_id)
    }

    /// Increment the counter for a replica, returning the new value.
    pub fn increment(&mut self, replica_id: impl Into<String>) -> u64 {
        let entry = self.entries.entry(replica_id.into()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Identities this clock knows, in order.
    pub fn identities(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Component-wise max, restricted to `ids`.
    ///
    /// Each id in `ids` becomes known to this clock even when `other` has no
    /// entry for it.
    pub fn merge_over<'a>(&mut self, other: &VectorClock, ids: impl IntoIterator<Item = &'a str>) {
        for id in ids {
            let current = self.entries.entry(id.to_string()).or_insert(0);
            *current = (*current).max(other.get(id));
        }
    }

    /// Component-wise max over every identity either clock knows.
    pub fn merge(&mut self, other: &VectorClock) {
        for (replica_id, &counter) in &other.entries {
            let current = self.entries.entry(replica_id.clone()).or_insert(0);
            *current = (*current).max(counter);
        }
    }

    /// Create a merged clock without modifying self.
    pub fn merged_with(&self, other: &VectorClock) -> VectorClock {
        let mut result = self.clone();
        result.merge(other);
        result
    }

    /// True if for every identity this clock knows, `self[id] >= other[id]`.
    pub fn dominates_over_known(&self, other: &VectorClock) -> bool {
        self.entries
            .iter()
            .all(|(id, &counter)| counter >= other.get(id))
    }

    /// True if for every identity this clock knows, `other[id] >= self[id]`.
    pub fn dominated_over_known(&self, other: &VectorClock) -> bool {
        self.entries
            .iter()
            .all(|(id, &counter)| other.get(id) >= counter)
    }

    /// Zero every known counter.
    pub fn reset(&mut self) {
        self.entries.values_mut().for_each(|c| *c = 0);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counters.
    pub fn total_events(&self) -> u64 {
        self.entries.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &u64)> {
        self.entries.iter()
    }
}

impl std::fmt::Display for VectorClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (id, counter)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", id, counter)?;
        }
        write!(f, "}}")
    }
}
