//! Race detection and self-eviction scenarios.

mod common;

use common::fixtures::{HostBuilder, RecordingObserver};
use common::{fast_config, TestCluster, LABEL};

use berth_placer::{PlaceOptions, PlacerError, RetryReason};
use berth_pool::PoolFilter;
use berth_runtime::WorkloadSpec;
use std::sync::Arc;

fn spec() -> WorkloadSpec {
    WorkloadSpec::new("busybox")
}

#[tokio::test]
async fn concurrent_placements_race_and_loser_relocates() {
    let cluster = TestCluster::new();
    cluster.install(HostBuilder::new("h-1").build());
    cluster.install(HostBuilder::new("h-2").stopped().build());

    // Hold both launches until both engines have passed their capacity
    // checks against h-1: the canonical two-writers-one-slot race.
    cluster.runtime.set_launch_gate(2);

    let first_observer = Arc::new(RecordingObserver::new());
    let second_observer = Arc::new(RecordingObserver::new());
    let first = cluster
        .engine(fast_config())
        .with_seed(1)
        .with_observer(first_observer.clone());
    let second = cluster
        .engine(fast_config())
        .with_seed(2)
        .with_observer(second_observer.clone());

    let spec = spec();
    let options = PlaceOptions::default();
    let (a, b) = tokio::join!(
        first.place(&spec, &PoolFilter::All, &options),
        second.place(&spec, &PoolFilter::All, &options),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    // Exactly one workload on each host: one engine won the original
    // slot, the other evicted itself and relocated to the woken host.
    assert_ne!(a.host.id, b.host.id);
    let h1 = cluster.runtime.daemon("h-1.pool.test").unwrap();
    let h2 = cluster.runtime.daemon("h-2.pool.test").unwrap();
    assert_eq!(h1.workload_count(LABEL), 1);
    assert_eq!(h2.workload_count(LABEL), 1);
    assert_eq!(cluster.pool.start_count("h-2"), 1);

    let races = first_observer.race_count() + second_observer.race_count();
    assert_eq!(races, 1, "exactly one engine must self-evict");

    // The loser's first retry says why.
    let loser_reasons: Vec<RetryReason> = first_observer
        .retry_reasons()
        .into_iter()
        .chain(second_observer.retry_reasons())
        .collect();
    assert_eq!(
        loser_reasons,
        vec![RetryReason::Evicted {
            host: "h-1".to_string()
        }]
    );
}

#[tokio::test]
async fn surplus_is_sized_by_effective_capacity_not_default() {
    let cluster = TestCluster::new();
    cluster.install(
        HostBuilder::new("h-1")
            .with_tag("ci-capacity", "2")
            .build(),
    );

    // Three engines race for two overridden slots while the default
    // capacity is 1. Sizing the surplus with the override must leave
    // two survivors; sizing it with the default would evict two.
    cluster.runtime.set_launch_gate(3);

    let mut config = fast_config();
    config.max_attempts = 2;
    let options = PlaceOptions {
        capacity_tag: Some("ci-capacity".to_string()),
        ..Default::default()
    };

    let engines: Vec<_> = (0..3)
        .map(|seed| cluster.engine(config.clone()).with_seed(seed))
        .collect();
    let spec = spec();
    let (a, b, c) = tokio::join!(
        engines[0].place(&spec, &PoolFilter::All, &options),
        engines[1].place(&spec, &PoolFilter::All, &options),
        engines[2].place(&spec, &PoolFilter::All, &options),
    );

    let results = [a, b, c];
    let placed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(placed, 2, "two slots, two winners");

    let daemon = cluster.runtime.daemon("h-1.pool.test").unwrap();
    assert_eq!(daemon.workload_count(LABEL), 2);

    // The loser exhausted after evicting itself into a full pool.
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    match loser {
        PlacerError::Exhausted { attempts, .. } => assert_eq!(*attempts, 2),
    }
}

#[tokio::test]
async fn eviction_spares_older_work() {
    let cluster = TestCluster::new();
    cluster.install(HostBuilder::new("h-1").build());
    cluster.runtime.set_launch_gate(2);

    let mut config = fast_config();
    config.max_attempts = 1;
    let first = cluster.engine(config.clone()).with_seed(1);
    let second = cluster.engine(config).with_seed(2);

    let spec = spec();
    let options = PlaceOptions::default();
    let (a, b) = tokio::join!(
        first.place(&spec, &PoolFilter::All, &options),
        second.place(&spec, &PoolFilter::All, &options),
    );

    // One slot, one survivor; with a single attempt the loser's
    // eviction is terminal.
    let daemon = cluster.runtime.daemon("h-1.pool.test").unwrap();
    assert_eq!(daemon.workload_count(LABEL), 1);

    let survivor = daemon.workload_ids(LABEL)[0].clone();
    let winner = [&a, &b].into_iter().find_map(|r| r.as_ref().ok()).unwrap();
    let loser = [&a, &b].into_iter().find_map(|r| r.as_ref().err()).unwrap();

    // The surviving workload is the winner's, and it is the older of
    // the two; fairness is timestamp-based, not engine-based.
    assert_eq!(winner.workload.id, survivor);
    assert!(matches!(
        loser,
        PlacerError::Exhausted {
            attempts: 1,
            last: RetryReason::Evicted { .. }
        }
    ));
}
