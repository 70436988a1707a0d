//! # trireme-replica
//!
//! Replicas of a small key-value map kept (or not kept) consistent by one of
//! three replication protocols:
//!
//! - [`Strategy::Unsynchronized`]: write locally and push to peers; concurrent
//!   writes are silently lost
//! - [`Strategy::Locking`]: lock the key locally and at every peer first;
//!   exclusion only holds per replica
//! - [`Strategy::Causal`]: write locally, propagate separately, and detect
//!   concurrent writes with vector clocks
//!
//! Every peer interaction is a [`PeerMessage`] handed to a [`Transport`].
//!
//! ## Example
//!
//! ```rust
//! use trireme_replica::{ClusterSpec, ReplicaConfig, Strategy, WriteStatus};
//!
//! let cluster = ClusterSpec::new(ReplicaConfig::new(Strategy::Locking))
//!     .replica("node_a", [("account_balance", 1000)])
//!     .replica("node_b", [("account_balance", 1000)])
//!     .build()
//!     .unwrap();
//!
//! let node_a = cluster.get("node_a").unwrap();
//! assert_eq!(node_a.add("account_balance", 100).unwrap(), WriteStatus::Applied);
//! assert!(cluster.is_converged("account_balance"));
//! ```

pub mod cluster;
pub mod config;
pub mod error;
pub mod event;
pub mod id;
pub mod message;
pub mod protocol;
pub mod replica;
pub mod transport;

pub use cluster::{full_mesh, replicate_key, Cluster, ClusterSpec, ReplicaSpec};
pub use config::{CausalConfig, MergeScope, ReplicaConfig, ReplicaConfigBuilder, Strategy};
pub use error::{ReplicaError, Result};
pub use event::{EventOutcome, ReplicaEvent};
pub use id::ReplicaId;
pub use message::{PeerMessage, PeerReply};
pub use protocol::{ReplicationProtocol, WriteStatus};
pub use replica::{ClockState, Deliveries, Replica};
pub use transport::{ImmediateTransport, InFlight, QueuedTransport, Transport};
