//! Topology setup and cluster-level helpers.

use crate::config::ReplicaConfig;
use crate::error::{ReplicaError, Result};
use crate::event::EventOutcome;
use crate::id::ReplicaId;
use crate::replica::Replica;
use crate::transport::{ImmediateTransport, Transport};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use trireme_core::{KeyValueMap, Number};

/// Attach every replica to every other one.
pub fn full_mesh(replicas: &[Arc<Replica>]) -> Result<()> {
    for (i, replica) in replicas.iter().enumerate() {
        let others: Vec<_> = replicas
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, r)| r.clone())
            .collect();
        replica.attach_peers(&others)?;
    }
    Ok(())
}

/// Send `from`'s current value of `key` straight to `to`, bypassing any transport.
///
/// Carries `from`'s clock when it has one. Returns `None` when `from` has
/// never written the key.
pub fn replicate_key(from: &Replica, to: &Replica, key: &str) -> Result<Option<EventOutcome>> {
    let Some(value) = from.get_local(key) else {
        return Ok(None);
    };
    let clock = from.clock_snapshot();
    to.receive_event(key, value, clock.as_ref()).map(Some)
}

/// One replica in a `ClusterSpec`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplicaSpec {
    pub id: String,
    /// Initial key-value map as a JSON object of numbers.
    #[serde(default = "empty_object")]
    pub initial: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Declarative description of a set of replicas sharing one configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSpec {
    #[serde(default)]
    pub config: ReplicaConfig,
    pub replicas: Vec<ReplicaSpec>,
}

impl ClusterSpec {
    pub fn new(config: ReplicaConfig) -> Self {
        Self {
            config,
            replicas: Vec::new(),
        }
    }

    /// Add a replica whose initial map is given as `(key, value)` pairs.
    pub fn replica<K, V>(mut self, id: impl Into<String>, initial: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Number>,
    {
        let initial = initial
            .into_iter()
            .map(|(k, v)| {
                let value = match v.into() {
                    Number::Int(i) => serde_json::Value::from(i),
                    Number::Float(f) => serde_json::Value::from(f),
                };
                (k.into(), value)
            })
            .collect::<serde_json::Map<_, _>>();
        self.replicas.push(ReplicaSpec {
            id: id.into(),
            initial: serde_json::Value::Object(initial),
        });
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let spec: ClusterSpec = serde_json::from_str(json)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Check identities and initial values without building anything.
    pub fn validate(&self) -> Result<()> {
        self.config.validate()?;
        if self.replicas.is_empty() {
            return Err(ReplicaError::InvalidConfig(
                "a cluster needs at least one replica".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for replica in &self.replicas {
            if replica.id.is_empty() {
                return Err(ReplicaError::InvalidConfig(
                    "replica id must not be empty".to_string(),
                ));
            }
            if !seen.insert(replica.id.as_str()) {
                return Err(ReplicaError::DuplicateReplica(replica.id.clone()));
            }
            KeyValueMap::from_json(&replica.initial)?;
        }
        Ok(())
    }

    /// Create every replica with immediate delivery and wire a full mesh.
    pub fn build(&self) -> Result<Cluster> {
        self.build_with_transport(Arc::new(ImmediateTransport))
    }

    /// Create every replica on a shared transport and wire a full mesh.
    pub fn build_with_transport(&self, transport: Arc<dyn Transport>) -> Result<Cluster> {
        self.validate()?;
        let replicas = self
            .replicas
            .iter()
            .map(|spec| {
                let initial = KeyValueMap::from_json(&spec.initial)?;
                Replica::with_transport(
                    spec.id.as_str(),
                    initial,
                    self.config.clone(),
                    transport.clone(),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        full_mesh(&replicas)?;
        Ok(Cluster { replicas })
    }
}

/// Owns a set of wired replicas.
///
/// Peers only hold weak references to each other, so the cluster keeps
/// them alive.
#[derive(Debug)]
pub struct Cluster {
    replicas: Vec<Arc<Replica>>,
}

impl Cluster {
    pub fn from_replicas(replicas: Vec<Arc<Replica>>) -> Self {
        Self { replicas }
    }

    pub fn get(&self, id: &str) -> Result<&Arc<Replica>> {
        self.replicas
            .iter()
            .find(|r| r.id().as_str() == id)
            .ok_or_else(|| ReplicaError::UnknownReplica(id.to_string()))
    }

    /// The replica at `idx` in creation order.
    pub fn replica(&self, idx: usize) -> Option<&Arc<Replica>> {
        self.replicas.get(idx)
    }

    pub fn replicas(&self) -> &[Arc<Replica>] {
        &self.replicas
    }

    pub fn ids(&self) -> Vec<ReplicaId> {
        self.replicas.iter().map(|r| r.id().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    /// Each replica's local value for `key`, in replica order.
    pub fn values(&self, key: &str) -> Vec<Option<Number>> {
        self.replicas.iter().map(|r| r.get_local(key)).collect()
    }

    /// True if every replica holds the same value for `key`.
    pub fn is_converged(&self, key: &str) -> bool {
        let values = self.values(key);
        values.windows(2).all(|w| w[0] == w[1])
    }
}
