//! Tests for pool/multiplex.rs
//!
//! Acquisition, provisioning, release and removal against mock connections.

use muxpool::config::DestinationConfig;
use muxpool::error::{InvariantViolation, PoolError};
use muxpool::pool::{Acquire, EntryState, MultiplexConnectionPool, Strategy};
use muxpool::testing::{MockConnection, MockFactory};
use muxpool::types::{Destination, MaxConnections, MaxMultiplex};

fn destination() -> Destination {
    DestinationConfig::default().destination()
}

fn max(n: usize) -> MaxConnections {
    MaxConnections::new(n).unwrap()
}

fn multiplex(n: usize) -> MaxMultiplex {
    MaxMultiplex::new(n).unwrap()
}

fn pool(
    factory: &MockFactory,
    max_connections: usize,
    capacity: usize,
) -> MultiplexConnectionPool<MockConnection> {
    MultiplexConnectionPool::new(
        destination(),
        factory.clone(),
        max(max_connections),
        multiplex(capacity),
    )
}

/// One connection, two units of capacity: a third caller is turned away
#[tokio::test]
async fn test_single_connection_capacity_two() {
    let factory = MockFactory::new();
    let pool = pool(&factory, 1, 2);

    let first = pool.lease().await.unwrap();
    let second = pool.acquire().ready().expect("spare capacity on same entry");
    assert_eq!(first.entry_id(), second.entry_id());
    assert!(pool.acquire().is_exhausted());

    pool.release(first).unwrap();
    let third = pool.acquire().ready().expect("released capacity");
    assert_eq!(third.entry_id(), second.entry_id());
    assert_eq!(factory.connects(), 1);
}

/// Two callers arriving while the only connection is still being
/// established both end up on it
#[tokio::test]
async fn test_concurrent_acquires_share_pending_connection() {
    let factory = MockFactory::new().gated();
    let pool = pool(&factory, 1, 2);

    let Acquire::Provisioning(first) = pool.acquire() else {
        panic!("expected provisioning");
    };
    let Acquire::Provisioning(second) = pool.acquire() else {
        panic!("expected to wait on the pending entry");
    };
    assert_eq!(first.entry_id(), second.entry_id());
    assert!(pool.acquire().is_exhausted());

    factory.open_gate(1);
    let a = first.wait().await.unwrap();
    let b = second.wait().await.unwrap();
    assert_eq!(a.entry_id(), b.entry_id());
    assert!(pool.acquire().is_exhausted());
    assert_eq!(factory.connects(), 1);

    drop(a);
    assert!(pool.acquire().is_ready());
}

async fn until_active(pool: &MultiplexConnectionPool<MockConnection>) {
    while pool.slots().first().copied().flatten().map(|s| s.state) != Some(EntryState::Active) {
        tokio::task::yield_now().await;
    }
}

/// Capacity promised to waiters is held for them once the connection is up,
/// even if other callers arrive before the waiters are polled
#[tokio::test]
async fn test_promised_capacity_survives_late_callers() {
    let factory = MockFactory::new().gated();
    let pool = pool(&factory, 1, 2);

    let Acquire::Provisioning(first) = pool.acquire() else {
        panic!("expected provisioning");
    };
    let Acquire::Provisioning(second) = pool.acquire() else {
        panic!("expected to wait on the pending entry");
    };

    factory.open_gate(1);
    until_active(&pool).await;

    assert!(pool.acquire().is_exhausted());
    assert!(pool.acquire().is_exhausted());

    let a = first.wait().await.unwrap();
    let b = second.wait().await.unwrap();
    assert_eq!(a.entry_id(), b.entry_id());
    assert_eq!(pool.lease_counter().current(), 2);
    assert_eq!(pool.status().in_use.get(), 2);
}

/// A waiter that gives up before establishment frees its promise
#[tokio::test]
async fn test_abandoned_waiter_before_activation() {
    let factory = MockFactory::new().gated();
    let pool = pool(&factory, 1, 2);

    let Acquire::Provisioning(first) = pool.acquire() else {
        panic!("expected provisioning");
    };
    let Acquire::Provisioning(second) = pool.acquire() else {
        panic!("expected provisioning");
    };
    drop(second);

    factory.open_gate(1);
    until_active(&pool).await;
    assert_eq!(pool.status().in_use.get(), 1);

    let late = pool.acquire().ready().expect("forfeited unit is spare");
    let lease = first.wait().await.unwrap();
    assert_eq!(late.entry_id(), lease.entry_id());
}

/// A waiter that gives up after establishment returns its held unit
#[tokio::test]
async fn test_abandoned_waiter_after_activation() {
    let factory = MockFactory::new().gated();
    let pool = MultiplexConnectionPool::<MockConnection>::builder(destination(), factory.clone())
        .max_connections(max(1))
        .initial_max_multiplex(multiplex(2))
        .retain_idle(false)
        .build();

    let Acquire::Provisioning(first) = pool.acquire() else {
        panic!("expected provisioning");
    };
    let Acquire::Provisioning(second) = pool.acquire() else {
        panic!("expected provisioning");
    };

    factory.open_gate(1);
    until_active(&pool).await;
    drop(first);
    drop(second);

    // Nothing was ever leased, so the idle entry is discarded
    let status = pool.status();
    assert_eq!(status.in_use.get(), 0);
    assert_eq!(status.live, 0);
    assert_eq!(pool.lease_counter().total(), 0);
}

#[tokio::test]
async fn test_exhausted_lease_is_recoverable_error() {
    let factory = MockFactory::new();
    let pool = pool(&factory, 1, 1);

    let _held = pool.lease().await.unwrap();
    let err = pool.lease().await.unwrap_err();

    assert!(matches!(err, PoolError::Exhausted { max_connections: 1, .. }));
    assert!(err.is_recoverable());
    assert_eq!(pool.status().exhausted, 1);
}

#[tokio::test]
async fn test_reported_capacity_wins_over_default() {
    let factory = MockFactory::new().with_max_multiplex(5);
    let pool = pool(&factory, 1, 2);

    let lease = pool.lease().await.unwrap();
    let slots = pool.slots();

    assert_eq!(slots.len(), 1);
    let entry = slots[0].expect("occupied slot");
    assert_eq!(entry.capacity, Some(5));
    assert_eq!(entry.state, EntryState::Active);

    let extra: Vec<_> = (0..4).map(|_| pool.acquire().ready().unwrap()).collect();
    assert!(extra.iter().all(|l| l.entry_id() == lease.entry_id()));
    assert_eq!(pool.status().in_use.get(), 5);
}

#[tokio::test]
async fn test_reported_zero_capacity_uses_default() {
    let factory = MockFactory::new().with_max_multiplex(0);
    let pool = pool(&factory, 1, 3);

    let _lease = pool.lease().await.unwrap();

    assert_eq!(pool.slots()[0].unwrap().capacity, Some(3));
}

#[tokio::test]
async fn test_provisioning_failure_frees_slot() {
    let factory = MockFactory::new().failing_first(1);
    let pool = pool(&factory, 1, 1);

    let err = pool.lease().await.unwrap_err();
    assert!(matches!(err, PoolError::ProvisioningFailed { ref reason, .. } if reason.contains("refused")));

    let status = pool.status();
    assert_eq!(status.live, 0);
    assert_eq!(status.provision_failures, 1);
    assert!(pool.slots().is_empty());

    let lease = pool.lease().await.unwrap();
    assert_eq!(factory.connects(), 2);
    pool.release(lease).unwrap();
}

#[tokio::test]
async fn test_waiters_see_provisioning_failure() {
    let factory = MockFactory::new().gated().failing_first(1);
    let pool = pool(&factory, 1, 2);

    let Acquire::Provisioning(first) = pool.acquire() else {
        panic!("expected provisioning");
    };
    let Acquire::Provisioning(second) = pool.acquire() else {
        panic!("expected provisioning");
    };

    factory.open_gate(1);
    assert!(matches!(first.wait().await, Err(PoolError::ProvisioningFailed { .. })));
    assert!(matches!(second.wait().await, Err(PoolError::ProvisioningFailed { .. })));
}

#[tokio::test]
async fn test_live_entries_never_exceed_max() {
    let factory = MockFactory::new();
    let pool = pool(&factory, 3, 1);

    let mut leases = Vec::new();
    loop {
        match pool.acquire() {
            Acquire::Ready(lease) => leases.push(lease),
            Acquire::Provisioning(p) => leases.push(p.wait().await.unwrap()),
            Acquire::Exhausted => break,
            Acquire::Closed => unreachable!(),
        }
    }

    assert_eq!(leases.len(), 3);
    let status = pool.status();
    assert_eq!(status.live, 3);
    assert_eq!(status.peak_live, 3);
    assert!(!status.can_grow());
    assert!(status.utilization().is_full());
}

#[tokio::test]
async fn test_first_strategy_prefers_lowest_slot() {
    let factory = MockFactory::new();
    let pool = pool(&factory, 2, 1);

    let a = pool.lease().await.unwrap();
    let b = pool.lease().await.unwrap();
    let low = a.entry_id();
    pool.release(a).unwrap();
    pool.release(b).unwrap();

    for _ in 0..4 {
        let lease = pool.acquire().ready().unwrap();
        assert_eq!(lease.entry_id(), low);
        pool.release(lease).unwrap();
    }
}

#[tokio::test]
async fn test_round_robin_distributes() {
    let factory = MockFactory::new();
    let pool = MultiplexConnectionPool::<MockConnection>::builder(destination(), factory.clone())
        .max_connections(max(2))
        .initial_max_multiplex(multiplex(1))
        .strategy(Strategy::RoundRobin)
        .build();

    let a = pool.lease().await.unwrap();
    let b = pool.lease().await.unwrap();
    pool.release(a).unwrap();
    pool.release(b).unwrap();

    let first = pool.acquire().ready().unwrap();
    let first_id = first.entry_id();
    pool.release(first).unwrap();
    let second = pool.acquire().ready().unwrap();

    assert_ne!(first_id, second.entry_id());
}

#[tokio::test]
async fn test_cache_keeps_slot_positions() {
    let factory = MockFactory::new();
    let pool = MultiplexConnectionPool::<MockConnection>::builder(destination(), factory.clone())
        .max_connections(max(3))
        .initial_max_multiplex(multiplex(1))
        .cache(true)
        .build();

    let _a = pool.lease().await.unwrap();
    let b = pool.lease().await.unwrap();
    let _c = pool.lease().await.unwrap();

    assert!(pool.remove(b).unwrap());
    let slots = pool.slots();
    assert_eq!(slots.len(), 3);
    assert!(slots[1].is_none());

    let d = pool.lease().await.unwrap();
    assert_eq!(pool.slots()[1].map(|s| s.id), Some(d.entry_id()));
}

#[tokio::test]
async fn test_without_cache_slots_compact() {
    let factory = MockFactory::new();
    let pool = pool(&factory, 3, 1);

    let _a = pool.lease().await.unwrap();
    let b = pool.lease().await.unwrap();
    let _c = pool.lease().await.unwrap();

    assert!(pool.remove(b).unwrap());
    let slots = pool.slots();
    assert_eq!(slots.len(), 2);
    assert!(slots.iter().all(Option::is_some));
}

#[tokio::test]
async fn test_idle_entry_removed_without_retain() {
    let factory = MockFactory::new();
    let pool = MultiplexConnectionPool::<MockConnection>::builder(destination(), factory.clone())
        .max_connections(max(1))
        .initial_max_multiplex(multiplex(2))
        .retain_idle(false)
        .build();

    let a = pool.lease().await.unwrap();
    let b = pool.acquire().ready().unwrap();
    pool.release(a).unwrap();
    assert_eq!(pool.status().live, 1);

    pool.release(b).unwrap();
    let status = pool.status();
    assert_eq!(status.live, 0);
    assert_eq!(status.removed, 1);
    assert_eq!(pool.entry_counter().current(), 0);
}

#[tokio::test]
async fn test_idle_entry_retained_by_default() {
    let factory = MockFactory::new();
    let pool = pool(&factory, 1, 2);

    let lease = pool.lease().await.unwrap();
    pool.release(lease).unwrap();

    let status = pool.status();
    assert_eq!(status.live, 1);
    assert_eq!(status.idle, 1);
}

#[tokio::test]
async fn test_connection_close_removes_entry() {
    let factory = MockFactory::new();
    let pool = pool(&factory, 1, 2);

    let lease = pool.lease().await.unwrap();
    assert_eq!(factory.close_all(), 1);
    assert_eq!(pool.status().live, 0);
    assert!(lease.is_closed());

    // Outstanding leases on a removed entry still release cleanly
    pool.release(lease).unwrap();
    assert_eq!(pool.lease_counter().current(), 0);

    let replacement = pool.lease().await.unwrap();
    assert_eq!(factory.connects(), 2);
    assert!(!replacement.is_closed());
}

#[tokio::test]
async fn test_dropped_lease_returns_capacity() {
    let factory = MockFactory::new();
    let pool = pool(&factory, 1, 1);

    {
        let _lease = pool.lease().await.unwrap();
        assert!(pool.acquire().is_exhausted());
    }

    assert!(pool.acquire().is_ready());
}

#[tokio::test]
async fn test_release_to_wrong_pool_is_invariant_violation() {
    let factory = MockFactory::new();
    let pool_a = pool(&factory, 1, 1);
    let pool_b = pool(&factory, 1, 1);

    let lease = pool_a.lease().await.unwrap();
    let err = pool_b.release(lease).unwrap_err();

    assert!(err.is_invariant_violation());
    assert!(matches!(
        err,
        PoolError::Invariant(InvariantViolation::WrongPool { pool, lease_pool })
            if pool == pool_b.id() && lease_pool == pool_a.id()
    ));
    // The rejected lease went back to the pool that issued it
    assert_eq!(pool_a.lease_counter().current(), 0);
    assert!(pool_a.acquire().is_ready());
}

#[tokio::test]
async fn test_set_initial_max_multiplex_applies_to_new_entries() {
    let factory = MockFactory::new();
    let pool = pool(&factory, 2, 1);

    let first = pool.lease().await.unwrap();
    pool.set_initial_max_multiplex(multiplex(4));
    let second = pool.lease().await.unwrap();

    let capacities: Vec<_> = pool
        .slots()
        .into_iter()
        .flatten()
        .map(|s| (s.id, s.capacity))
        .collect();
    assert!(capacities.contains(&(first.entry_id(), Some(1))));
    assert!(capacities.contains(&(second.entry_id(), Some(4))));
    assert_eq!(pool.initial_max_multiplex().get(), 4);
}

#[tokio::test]
async fn test_close_rejects_new_acquires() {
    let factory = MockFactory::new();
    let pool = pool(&factory, 2, 2);

    let lease = pool.lease().await.unwrap();
    pool.close();

    assert!(pool.is_closed());
    assert!(matches!(pool.acquire(), Acquire::Closed));
    assert!(matches!(pool.lease().await, Err(PoolError::Closed { .. })));
    assert_eq!(pool.status().live, 0);
    pool.release(lease).unwrap();
}

#[tokio::test]
async fn test_close_fails_pending_waiters() {
    let factory = MockFactory::new().gated();
    let pool = pool(&factory, 1, 1);

    let Acquire::Provisioning(waiting) = pool.acquire() else {
        panic!("expected provisioning");
    };
    pool.close();
    factory.open_gate(1);

    assert!(matches!(waiting.wait().await, Err(PoolError::Closed { .. })));
}

#[tokio::test]
async fn test_lease_counters_track_peak() {
    let factory = MockFactory::new();
    let pool = pool(&factory, 1, 3);

    let a = pool.lease().await.unwrap();
    let b = pool.acquire().ready().unwrap();
    let c = pool.acquire().ready().unwrap();
    drop((a, b));

    let status = pool.status();
    assert_eq!(status.in_use.get(), 1);
    assert_eq!(status.peak_in_use, 3);
    assert_eq!(status.leases_total, 3);
    drop(c);
}

#[tokio::test]
async fn test_from_config() {
    let config = muxpool::config::parse_config(
        r#"
[pool]
max_connections = 2
max_multiplex = 8
strategy = "round_robin"
cache = true
"#,
    )
    .unwrap();
    let factory = MockFactory::new();
    let pool = MultiplexConnectionPool::<MockConnection>::from_config(
        config.destination.destination(),
        factory,
        &config.pool,
    );

    assert_eq!(pool.max_connections().get(), 2);
    assert_eq!(pool.initial_max_multiplex().get(), 8);
    assert_eq!(pool.strategy(), Strategy::RoundRobin);
}
