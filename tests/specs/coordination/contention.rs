//! Contention against foreign sessions and sustained local holds.

use crate::prelude::*;
use spruce_core::LockError;
use std::time::{Duration, Instant};
use tempfile::tempdir;

#[tokio::test]
async fn foreign_lock_released_during_backoff_is_acquired() {
    let dir = tempdir().unwrap();
    let coordinator = scenario_coordinator(dir.path());
    plant_foreign_lock(&coordinator, "other-host_4711", unix_now());

    // The "other process" releases its lock 250ms in, between our
    // backoff attempts (100ms, then 200ms)
    let lock_path = coordinator.config().lock_path(HOOK);
    let releaser = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        std::fs::remove_file(&lock_path).unwrap();
    });

    let called = Instant::now();
    let guard = coordinator.acquire(HOOK).await.unwrap();
    let waited = called.elapsed();
    releaser.await.unwrap();

    assert!(
        waited >= Duration::from_millis(250),
        "acquire must have waited through the backoff ({waited:?})"
    );
    let record =
        spruce_core::coordination::lockfile::read(&coordinator.config().lock_path(HOOK)).unwrap();
    assert_eq!(record.session_id, coordinator.config().session_id());

    let stats = coordinator.stats(HOOK);
    assert_eq!(stats.successes, 1);
    assert!(stats.wait.max_ms >= 250.0);

    drop(guard);
}

#[tokio::test]
async fn foreign_lock_held_throughout_exhausts_retries() {
    let dir = tempdir().unwrap();
    let coordinator = scenario_coordinator(dir.path());
    plant_foreign_lock(&coordinator, "other-host_4711", unix_now());

    let err = coordinator.acquire(HOOK).await.unwrap_err();
    assert!(matches!(err, LockError::Timeout { .. }));

    let stats = coordinator.stats(HOOK);
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.successes, 0);
    // Only the foreign lock file remains; no temp siblings, no state of ours
    assert_eq!(lock_dir_entries(dir.path()), vec![format!("{HOOK}.lock")]);
    assert!(!stats.in_active_global);
    assert!(!coordinator.is_held_in_process(HOOK));
}

#[tokio::test]
async fn sustained_local_hold_times_out_the_waiter() {
    let dir = tempdir().unwrap();
    let coordinator = scenario_coordinator(dir.path());

    let holder = coordinator.acquire(HOOK).await.unwrap();
    coordinator.set_timeout(HOOK, Duration::from_millis(300));

    let called = Instant::now();
    let err = coordinator.acquire(HOOK).await.unwrap_err();
    let waited = called.elapsed();

    assert!(matches!(err, LockError::Timeout { .. }));
    assert!(
        waited >= Duration::from_millis(300) && waited < Duration::from_millis(900),
        "timeout fired outside its window ({waited:?})"
    );

    let stats = coordinator.stats(HOOK);
    assert_eq!(stats.timeouts, 1);

    // The holder's lock file is intact; the waiter left no trace
    assert_eq!(lock_dir_entries(dir.path()), vec![format!("{HOOK}.lock")]);
    drop(holder);
    assert!(lock_dir_entries(dir.path()).is_empty());
}
