//! Stale and corrupt lock reclamation.

use crate::prelude::*;
use tempfile::tempdir;

#[tokio::test]
async fn stale_ghost_lock_is_reclaimed_by_acquire() {
    let dir = tempdir().unwrap();
    let coordinator = scenario_coordinator(dir.path());

    // A crashed session left a lock whose heartbeat is 10s old,
    // well past the 3s staleness threshold
    plant_foreign_lock(&coordinator, "ghost_999", unix_now() - 10.0);

    let guard = coordinator.acquire(HOOK).await.unwrap();

    let record =
        spruce_core::coordination::lockfile::read(&coordinator.config().lock_path(HOOK)).unwrap();
    assert_eq!(record.session_id, coordinator.config().session_id());
    assert_eq!(coordinator.stats(HOOK).stale_reclaimed, 1);
    assert_eq!(coordinator.stats(HOOK).successes, 1);

    drop(guard);
}

#[tokio::test]
async fn corrupt_lock_is_replaced_by_a_valid_record() {
    let dir = tempdir().unwrap();
    let coordinator = scenario_coordinator(dir.path());
    std::fs::write(coordinator.config().lock_path(HOOK), "not a record").unwrap();

    let guard = coordinator.acquire(HOOK).await.unwrap();

    let record =
        spruce_core::coordination::lockfile::read(&coordinator.config().lock_path(HOOK)).unwrap();
    assert_eq!(record.session_id, coordinator.config().session_id());
    assert_eq!(coordinator.stats(HOOK).stale_reclaimed, 1);

    drop(guard);
}

#[tokio::test]
async fn cleanup_is_idempotent() {
    let dir = tempdir().unwrap();
    let coordinator = scenario_coordinator(dir.path());

    plant_foreign_lock(&coordinator, "ghost_999", unix_now() - 10.0);
    std::fs::write(dir.path().join("broken.lock"), "garbage").unwrap();

    assert_eq!(coordinator.cleanup_stale(None).unwrap(), 2);
    assert!(lock_dir_entries(dir.path()).is_empty());

    // A second sweep with no intervening activity removes nothing
    assert_eq!(coordinator.cleanup_stale(None).unwrap(), 0);
}

#[tokio::test]
async fn fresh_locks_survive_cleanup() {
    let dir = tempdir().unwrap();
    let coordinator = scenario_coordinator(dir.path());
    plant_foreign_lock(&coordinator, "other-host_4711", unix_now());

    assert_eq!(coordinator.cleanup_stale(None).unwrap(), 0);
    assert_eq!(lock_dir_entries(dir.path()), vec![format!("{HOOK}.lock")]);
}
