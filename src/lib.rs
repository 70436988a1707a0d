//! Trireme - a replicated key-value store under three consistency strategies
//!
//! - [`trireme_core`] - numbers, the key-value map, lock map, vector clock and conflict detector
//! - [`trireme_replica`] - replicas, peer messages, transports and the replication protocols

pub use trireme_core;
pub use trireme_replica;

pub use trireme_core::{CausalOrder, Conflict, ConflictDetector, KeyValueMap, Mutation, Number, VectorClock};
pub use trireme_replica::{
    Cluster, ClusterSpec, EventOutcome, ImmediateTransport, QueuedTransport, Replica, ReplicaConfig,
    ReplicaError, ReplicaEvent, ReplicaId, Strategy, Transport, WriteStatus,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use trireme_core::{CausalOrder, KeyValueMap, Number, VectorClock};
    pub use trireme_replica::{
        full_mesh, replicate_key, ClusterSpec, Replica, ReplicaConfig, ReplicaConfigBuilder,
        Strategy, WriteStatus,
    };
}
