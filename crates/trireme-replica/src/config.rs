//! Replica configuration.

use crate::error::{ReplicaError, Result};
use serde::{Deserialize, Serialize};

/// Which coordination algorithm a replica runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Write locally, push to peers, no coordination.
    #[default]
    Unsynchronized,
    /// Lock the key locally and at every peer before writing.
    Locking,
    /// Write locally, propagate separately, detect concurrent writes with vector clocks.
    Causal,
}

/// Which clock components a received event is merged into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeScope {
    /// Only components of the receiver's peers.
    #[default]
    PeersOnly,
    /// Every component known to either clock, including the receiver's own.
    AllKnown,
}

/// Vector clock policy for the causal strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CausalConfig {
    /// Increment the receiver's own component when it applies a remote event.
    pub bump_on_remote_apply: bool,
    pub merge_scope: MergeScope,
}

impl Default for CausalConfig {
    fn default() -> Self {
        Self {
            bump_on_remote_apply: true,
            merge_scope: MergeScope::PeersOnly,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicaConfig {
    pub strategy: Strategy,
    /// Only read by the causal strategy.
    pub causal: CausalConfig,
    /// Buffered events per subscriber before the slowest one starts lagging.
    pub event_capacity: usize,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            causal: CausalConfig::default(),
            event_capacity: 64,
        }
    }
}

impl ReplicaConfig {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(ReplicaError::InvalidConfig(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for replica configuration.
pub struct ReplicaConfigBuilder {
    config: ReplicaConfig,
}

impl ReplicaConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ReplicaConfig::default(),
        }
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn bump_on_remote_apply(mut self, enabled: bool) -> Self {
        self.config.causal.bump_on_remote_apply = enabled;
        self
    }

    pub fn merge_scope(mut self, scope: MergeScope) -> Self {
        self.config.causal.merge_scope = scope;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn build(self) -> ReplicaConfig {
        self.config
    }
}

impl Default for ReplicaConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
