//! Integration tests for staggered cycles
//!
//! These tests verify that:
//! - Hosts start `spread` apart and run concurrently
//! - A cycle takes about `(n - 1) * spread + slowest host`, not the sum
//! - A slow host is cut off by the per-host timeout without delaying others

use std::sync::Arc;
use std::time::Duration;

use fleetwatch::monitors::HostMonitor;
use fleetwatch::scheduler::run_staggered;
use tokio::time::Instant;

use crate::helpers::{FakeMonitor, as_monitors};

fn staggered_fleet(latencies: &[u64]) -> Vec<Arc<FakeMonitor>> {
    latencies
        .iter()
        .enumerate()
        .map(|(index, latency)| {
            Arc::new(
                FakeMonitor::new(&format!("host-{index}"), &format!("10.0.1.{index}"))
                    .with_latency(Duration::from_secs(*latency)),
            )
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_cycle_time_is_spread_plus_slowest_host() {
    let fakes = staggered_fleet(&[4, 1, 7, 2, 3]);
    let monitors = as_monitors(&fakes);

    let report = run_staggered(
        &monitors,
        Duration::from_millis(500),
        Duration::from_secs(60),
        |monitor| async move {
            monitor.fetch().await;
            Ok(())
        },
    )
    .await;

    assert_eq!(report.succeeded, 5);
    assert_eq!(report.failed, 0);
    // host-2 starts at 1.0s and takes 7s
    assert!(report.elapsed >= Duration::from_secs(8));
    assert!(report.elapsed < Duration::from_secs(9));
}

#[tokio::test(start_paused = true)]
async fn test_hosts_start_in_order() {
    let fakes = staggered_fleet(&[1, 1, 1, 1]);
    let monitors = as_monitors(&fakes);
    let start = Instant::now();

    run_staggered(
        &monitors,
        Duration::from_secs(2),
        Duration::from_secs(60),
        |monitor| async move {
            monitor.is_reachable().await;
            Ok(())
        },
    )
    .await;

    for (index, fake) in fakes.iter().enumerate() {
        let started = fake.started();
        assert_eq!(started.len(), 1);
        let offset = started[0] - start;
        let expected = Duration::from_secs(2 * index as u64);
        assert!(offset >= expected, "host-{index} started at {offset:?}");
        assert!(offset < expected + Duration::from_millis(100));
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_host_times_out_alone() {
    let fakes = staggered_fleet(&[1, 600, 1]);
    let monitors = as_monitors(&fakes);

    let report = run_staggered(
        &monitors,
        Duration::ZERO,
        Duration::from_secs(30),
        |monitor| async move {
            monitor.fetch().await;
            Ok(())
        },
    )
    .await;

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failed_hosts, vec!["host-1".to_string()]);
    assert!(report.elapsed < Duration::from_secs(31));
}

#[tokio::test(start_paused = true)]
async fn test_empty_fleet_is_a_no_op() {
    let report = run_staggered(
        &[],
        Duration::from_secs(1),
        Duration::from_secs(30),
        |_| async { Ok(()) },
    )
    .await;

    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failed, 0);
}
