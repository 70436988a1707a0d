//! Per-key binary lock map used by the pessimistic locking strategy.
//!
//! A lock map only knows about its own replica. Nothing here coordinates
//! with other replicas' maps, so the map alone cannot guarantee that a key
//! is held by a single replica across the system.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// State of one key's lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockState {
    #[default]
    Unlocked,
    Locked,
}

/// Answer a replica gives when asked to lock a key on behalf of a peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockGrant {
    /// The key was unlocked and is now locked.
    Granted,
    /// The key was already locked. It stays locked.
    AlreadyLocked,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockMap {
    states: BTreeMap<String, LockState>,
}

impl LockMap {
    pub fn new() -> Self {
        LockMap {
            states: BTreeMap::new(),
        }
    }

    /// Absent keys are unlocked.
    pub fn state(&self, key: &str) -> LockState {
        self.states.get(key).copied().unwrap_or_default()
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.state(key) == LockState::Locked
    }

    /// Lock `key` only if it is currently unlocked.
    ///
    /// Returns `false` and leaves the map untouched when the key is held.
    pub fn try_lock(&mut self, key: &str) -> bool {
        if self.is_locked(key) {
            return false;
        }
        self.states.insert(key.to_string(), LockState::Locked);
        true
    }

    /// Lock `key` whatever its current state, reporting what it was.
    pub fn force_lock(&mut self, key: &str) -> LockGrant {
        match self.states.insert(key.to_string(), LockState::Locked) {
            Some(LockState::Locked) => LockGrant::AlreadyLocked,
            _ => LockGrant::Granted,
        }
    }

    pub fn unlock(&mut self, key: &str) {
        self.states.insert(key.to_string(), LockState::Unlocked);
    }

    /// Keys currently in the locked state.
    pub fn locked_keys(&self) -> impl Iterator<Item = &String> {
        self.states
            .iter()
            .filter(|(_, state)| **state == LockState::Locked)
            .map(|(key, _)| key)
    }
}
