//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use trireme_replica::{
    full_mesh, Cluster, Replica, ReplicaConfig, Strategy, Transport,
};
use trireme_core::{KeyValueMap, Number};

/// Install a subscriber once so `RUST_LOG=debug` shows protocol traffic.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Full-mesh cluster where every replica starts with `key = value`.
pub fn cluster_with(
    strategy: Strategy,
    ids: &[&str],
    key: &str,
    value: i64,
    transport: Arc<dyn Transport>,
) -> Cluster {
    cluster_with_config(ReplicaConfig::new(strategy), ids, key, value, transport)
}

pub fn cluster_with_config(
    config: ReplicaConfig,
    ids: &[&str],
    key: &str,
    value: i64,
    transport: Arc<dyn Transport>,
) -> Cluster {
    let replicas: Vec<_> = ids
        .iter()
        .map(|id| {
            Replica::with_transport(
                *id,
                KeyValueMap::from_entries([(key, Number::Int(value))]),
                config.clone(),
                transport.clone(),
            )
            .unwrap()
        })
        .collect();
    full_mesh(&replicas).unwrap();
    Cluster::from_replicas(replicas)
}
