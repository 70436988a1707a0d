//! Causal-conflict detection tests
//!
//! These tests verify that vector clocks classify replication events and
//! flag concurrent writes without preventing or resolving them.

mod common;

use common::{cluster_with, cluster_with_config, init_tracing};
use std::sync::Arc;
use trireme_core::{CausalOrder, ConflictDetector, KeyValueMap, Number, VectorClock};
use trireme_replica::{
    replicate_key, ImmediateTransport, MergeScope, PeerReply, QueuedTransport, Replica,
    ReplicaConfig, ReplicaConfigBuilder, ReplicaEvent, Strategy, WriteStatus,
};

fn clock(a: u64, b: u64) -> VectorClock {
    VectorClock::from_entries([("node_a", a), ("node_b", b)])
}

fn pair(config: ReplicaConfig) -> (Arc<Replica>, Arc<Replica>, trireme_replica::Cluster) {
    let cluster = cluster_with_config(
        config,
        &["node_a", "node_b"],
        "account_balance",
        1000,
        Arc::new(ImmediateTransport),
    );
    (cluster.replica(0).unwrap().clone(), cluster.replica(1).unwrap().clone(), cluster)
}

#[test]
fn test_local_writes_never_contact_peers() {
    let network = Arc::new(QueuedTransport::new());
    let cluster = cluster_with(Strategy::Causal, &["node_a", "node_b"], "x", 1, network.clone());
    let a = cluster.replica(0).unwrap();

    assert_eq!(a.add("x", 1).unwrap(), WriteStatus::Applied);
    assert_eq!(a.multiply("x", 4).unwrap(), WriteStatus::Applied);
    assert!(network.is_empty());
    assert_eq!(a.clock_snapshot().unwrap(), clock(2, 0));
    assert_eq!(cluster.replica(1).unwrap().get_local("x"), Some(Number::Int(1)));
}

#[test]
fn test_independent_writes_are_concurrent_both_ways() {
    init_tracing();
    let (a, b, _cluster) = pair(ReplicaConfig::new(Strategy::Causal));
    a.set("account_balance", 1).unwrap();
    b.set("account_balance", 2).unwrap();

    let ca = a.clock_snapshot().unwrap();
    let cb = b.clock_snapshot().unwrap();
    assert_eq!(ca, clock(1, 0));
    assert_eq!(cb, clock(0, 1));
    assert_eq!(ConflictDetector::classify(&ca, &cb), CausalOrder::Concurrent);
    assert_eq!(ConflictDetector::classify(&cb, &ca), CausalOrder::Concurrent);

    let outcome = b.receive_event("account_balance", Number::Int(1), Some(&ca)).unwrap();
    assert_eq!(outcome.order, Some(CausalOrder::Concurrent));

    let (a2, b2, _cluster2) = pair(ReplicaConfig::new(Strategy::Causal));
    a2.set("account_balance", 1).unwrap();
    b2.set("account_balance", 2).unwrap();
    let outcome = replicate_key(&b2, &a2, "account_balance").unwrap().unwrap();
    assert_eq!(outcome.order, Some(CausalOrder::Concurrent));
}

#[test]
fn test_stale_receiver_adopts_and_merges() {
    let config = ReplicaConfigBuilder::new()
        .strategy(Strategy::Causal)
        .bump_on_remote_apply(false)
        .build();
    let (a, b, _cluster) = pair(config);

    a.set("account_balance", 1).unwrap();
    replicate_key(&a, &b, "account_balance").unwrap();
    b.set("account_balance", 2).unwrap();
    replicate_key(&b, &a, "account_balance").unwrap();
    a.set("account_balance", 3).unwrap();

    assert_eq!(a.clock_snapshot().unwrap(), clock(2, 1));
    assert_eq!(b.clock_snapshot().unwrap(), clock(1, 1));

    let outcome = replicate_key(&a, &b, "account_balance").unwrap().unwrap();
    assert_eq!(outcome.order, Some(CausalOrder::SenderAfterReceiver));
    assert!(!outcome.is_conflict());
    assert_eq!(b.clock_snapshot().unwrap(), clock(2, 1));
    assert_eq!(b.get_local("account_balance"), Some(Number::Int(3)));
}

#[test]
fn test_remote_apply_bumps_own_component_by_default() {
    let (a, b, _cluster) = pair(ReplicaConfig::new(Strategy::Causal));

    a.set("account_balance", 1).unwrap();
    a.set("account_balance", 2).unwrap();
    let outcome = replicate_key(&a, &b, "account_balance").unwrap().unwrap();

    assert_eq!(outcome.order, Some(CausalOrder::SenderAfterReceiver));
    assert_eq!(b.clock_snapshot().unwrap(), clock(2, 1));
}

#[test]
fn test_stale_event_is_still_applied() {
    let (a, b, _cluster) = pair(ReplicaConfig::new(Strategy::Causal));

    let old = a.clock_snapshot().unwrap();
    a.set("account_balance", 7).unwrap();
    let outcome = a
        .receive_event("account_balance", Number::Int(1), Some(&old))
        .unwrap();

    assert_eq!(outcome.order, Some(CausalOrder::ReceiverAfterSender));
    assert_eq!(a.get_local("account_balance"), Some(Number::Int(1)));
    assert_eq!(b.get_local("account_balance"), Some(Number::Int(1000)));
}

#[test]
fn test_sequential_run_has_no_conflicts() {
    let (a, b, _cluster) = pair(ReplicaConfig::new(Strategy::Causal));

    a.add("account_balance", 100).unwrap();
    let first = replicate_key(&a, &b, "account_balance").unwrap().unwrap();
    assert_eq!(b.clock_snapshot().unwrap(), clock(1, 1));

    b.multiply("account_balance", 50).unwrap();
    assert_eq!(b.clock_snapshot().unwrap(), clock(1, 2));
    let second = replicate_key(&b, &a, "account_balance").unwrap().unwrap();

    assert_eq!(first.order, Some(CausalOrder::SenderAfterReceiver));
    assert_eq!(second.order, Some(CausalOrder::SenderAfterReceiver));
    assert_eq!(a.clock_snapshot().unwrap(), clock(2, 2));
    assert_eq!(a.get_local("account_balance"), Some(Number::Int(55000)));
    assert_eq!(b.get_local("account_balance"), Some(Number::Int(55000)));
}

#[test]
fn test_overlapping_run_flags_conflict_and_loses_write() {
    init_tracing();
    let (a, b, _cluster) = pair(ReplicaConfig::new(Strategy::Causal));
    let mut b_events = b.subscribe();

    a.add("account_balance", 100).unwrap();
    b.multiply("account_balance", 50).unwrap();

    let at_b = replicate_key(&a, &b, "account_balance").unwrap().unwrap();
    assert_eq!(at_b.order, Some(CausalOrder::Concurrent));
    let conflict = at_b.conflict.unwrap();
    assert_eq!(conflict.key, "account_balance");
    assert_eq!(conflict.incoming, Number::Int(1100));
    assert_eq!(conflict.current, Some(Number::Int(50000)));
    assert_eq!(b.clock_snapshot().unwrap(), clock(1, 2));

    // `b` now carries a's value and a clock ahead of a's, so a sees no conflict.
    let at_a = replicate_key(&b, &a, "account_balance").unwrap().unwrap();
    assert_eq!(at_a.order, Some(CausalOrder::SenderAfterReceiver));
    assert!(at_a.conflict.is_none());

    // The multiply is gone everywhere.
    assert_eq!(a.get_local("account_balance"), Some(Number::Int(1100)));
    assert_eq!(b.get_local("account_balance"), Some(Number::Int(1100)));

    let events: Vec<_> = std::iter::from_fn(|| b_events.try_recv().ok()).collect();
    assert!(events
        .iter()
        .any(|e| matches!(e, ReplicaEvent::ConflictDetected(c) if c.incoming == Number::Int(1100))));
}

#[test]
fn test_propagate_carries_clock_snapshot() {
    let (a, b, _cluster) = pair(ReplicaConfig::new(Strategy::Causal));

    a.set("account_balance", 5).unwrap();
    b.set("account_balance", 6).unwrap();
    let deliveries = a.propagate("account_balance");

    assert_eq!(deliveries.len(), 1);
    let (peer, reply) = &deliveries[0];
    assert_eq!(peer.as_str(), "node_b");
    match reply {
        Some(PeerReply::Event(outcome)) => {
            assert_eq!(outcome.order, Some(CausalOrder::Concurrent));
        }
        other => panic!("unexpected reply {:?}", other),
    }
}

#[test]
fn test_event_without_clock_is_treated_as_empty() {
    let (a, _b, _cluster) = pair(ReplicaConfig::new(Strategy::Causal));

    let outcome = a.receive_event("account_balance", Number::Int(3), None).unwrap();
    assert_eq!(outcome.order, Some(CausalOrder::ReceiverAfterSender));
    assert_eq!(a.get_local("account_balance"), Some(Number::Int(3)));
}

fn partial_topology(scope: MergeScope) -> (Arc<Replica>, Arc<Replica>, Arc<Replica>) {
    let config = ReplicaConfigBuilder::new()
        .strategy(Strategy::Causal)
        .merge_scope(scope)
        .build();
    let a = Replica::new("a", KeyValueMap::new(), config.clone()).unwrap();
    let b = Replica::new("b", KeyValueMap::new(), config.clone()).unwrap();
    let c = Replica::new("c", KeyValueMap::new(), config).unwrap();

    a.attach_peers(&[b.clone(), c.clone()]).unwrap();
    b.attach_peers(&[a.clone()]).unwrap();
    c.attach_peers(&[a.clone()]).unwrap();
    (a, b, c)
}

#[test]
fn test_peers_only_merge_ignores_identities_receiver_does_not_peer_with() {
    let (a, b, c) = partial_topology(MergeScope::PeersOnly);

    c.set("k", 1).unwrap();
    replicate_key(&c, &a, "k").unwrap();
    assert_eq!(a.clock_snapshot().unwrap().get("c"), 1);

    replicate_key(&a, &b, "k").unwrap();
    let at_b = b.clock_snapshot().unwrap();
    assert_eq!(at_b.get("a"), 1);
    assert!(!at_b.knows("c"));
}

#[test]
fn test_all_known_merge_adopts_every_identity() {
    let (a, b, c) = partial_topology(MergeScope::AllKnown);

    c.set("k", 1).unwrap();
    replicate_key(&c, &a, "k").unwrap();
    replicate_key(&a, &b, "k").unwrap();

    let at_b = b.clock_snapshot().unwrap();
    assert_eq!(at_b.get("a"), 1);
    assert_eq!(at_b.get("c"), 1);
}

#[test]
fn test_reset_clock_between_runs() {
    let (a, b, _cluster) = pair(ReplicaConfig::new(Strategy::Causal));
    a.set("account_balance", 1).unwrap();
    replicate_key(&a, &b, "account_balance").unwrap();

    a.reset_clock();
    b.reset_clock();
    assert_eq!(a.clock_snapshot().unwrap(), clock(0, 0));
    assert_eq!(b.clock_snapshot().unwrap(), clock(0, 0));
}
