//! Single-session acquisition and in-process waiters.

use crate::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;

#[tokio::test]
async fn single_acquire_and_release_leave_nothing_behind() {
    let dir = tempdir().unwrap();
    let coordinator = scenario_coordinator(dir.path());
    let lock_path = coordinator.config().lock_path(HOOK);

    let started = Instant::now();
    let guard = coordinator.acquire(HOOK).await.unwrap();
    assert!(
        started.elapsed() < Duration::from_millis(250),
        "uncontended acquire must not back off"
    );

    let record = spruce_core::coordination::lockfile::read(&lock_path).unwrap();
    assert_eq!(record.session_id, coordinator.config().session_id());
    assert_eq!(record.hook_name, HOOK);

    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(guard);

    assert!(!lock_path.exists());
    let stats = coordinator.stats(HOOK);
    assert_eq!(stats.successes, 1);
    assert!(!stats.in_active_global);
    assert!(!stats.currently_held_in_process);
    assert!(lock_dir_entries(dir.path()).is_empty());
}

#[tokio::test]
async fn second_waiter_returns_when_first_releases() {
    let dir = tempdir().unwrap();
    let coordinator = scenario_coordinator(dir.path());

    // Task A holds the lock for ~300ms
    let first = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            let guard = coordinator.acquire(HOOK).await.unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
            drop(guard);
        })
    };

    // Task B arrives ~100ms later and must wait for A's release
    tokio::time::sleep(Duration::from_millis(100)).await;
    let called = Instant::now();
    let guard = coordinator.acquire(HOOK).await.unwrap();
    let waited = called.elapsed();
    drop(guard);
    first.await.unwrap();

    assert!(
        waited >= Duration::from_millis(150),
        "waiter returned before the holder released ({waited:?})"
    );
    assert!(waited < Duration::from_secs(2), "waiter overshot ({waited:?})");

    let stats = coordinator.stats(HOOK);
    assert_eq!(stats.attempts, 2);
    assert_eq!(stats.successes, 2);
    assert_eq!(stats.wait.count, 2);
    assert!(stats.wait.max_ms >= 150.0);
}
