//! Heartbeat liveness while a guard is held.

use crate::prelude::*;
use std::time::Duration;
use tempfile::tempdir;

#[tokio::test]
async fn held_lock_is_refreshed_within_two_intervals() {
    let dir = tempdir().unwrap();
    let coordinator = scenario_coordinator(dir.path());
    let lock_path = coordinator.config().lock_path(HOOK);

    let guard = coordinator.acquire(HOOK).await.unwrap();
    let initial = spruce_core::coordination::lockfile::read(&lock_path)
        .unwrap()
        .freshness();

    // Heartbeat interval is 1s; two intervals must include a rewrite
    tokio::time::sleep(Duration::from_millis(2200)).await;

    let refreshed = spruce_core::coordination::lockfile::read(&lock_path)
        .unwrap()
        .freshness();
    assert!(
        refreshed > initial,
        "heartbeat did not refresh the record ({initial} -> {refreshed})"
    );

    drop(guard);
    assert!(!lock_path.exists());
}

#[tokio::test]
async fn heartbeat_stops_after_release() {
    let dir = tempdir().unwrap();
    let coordinator = scenario_coordinator(dir.path());
    let lock_path = coordinator.config().lock_path(HOOK);

    let guard = coordinator.acquire(HOOK).await.unwrap();
    drop(guard);
    assert_eq!(coordinator.status().heartbeat_tasks, 0);

    // No late heartbeat resurrects the file
    tokio::time::sleep(Duration::from_millis(1300)).await;
    assert!(!lock_path.exists());
}
