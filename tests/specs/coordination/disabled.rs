//! Bypass of the file-lock tier when globally disabled.

use crate::prelude::*;
use spruce_core::{GlobalLockConfig, LockCoordinator};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn disabled_coordinator(lock_dir: &std::path::Path) -> Arc<LockCoordinator> {
    let options = scenario_options(lock_dir).with_enabled(false);
    let coordinator = LockCoordinator::new(GlobalLockConfig::from_options(&options).unwrap());
    coordinator.register(HOOK);
    Arc::new(coordinator)
}

#[tokio::test]
async fn disabled_tier_performs_no_lock_dir_io() {
    let dir = tempdir().unwrap();
    let coordinator = disabled_coordinator(dir.path());

    let guard = coordinator.acquire(HOOK).await.unwrap();
    assert!(guard.is_locked());
    assert!(lock_dir_entries(dir.path()).is_empty());

    drop(guard);
    assert!(lock_dir_entries(dir.path()).is_empty());
    assert_eq!(coordinator.stats(HOOK).successes, 1);
}

#[tokio::test]
async fn per_process_exclusion_still_holds_when_disabled() {
    let dir = tempdir().unwrap();
    let coordinator = disabled_coordinator(dir.path());

    let first = coordinator.acquire(HOOK).await.unwrap();
    assert!(coordinator.is_held_in_process(HOOK));

    let waiter = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            let called = Instant::now();
            let guard = coordinator.acquire(HOOK).await.unwrap();
            let waited = called.elapsed();
            drop(guard);
            waited
        })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    drop(first);

    let waited = waiter.await.unwrap();
    assert!(
        waited >= Duration::from_millis(150),
        "second caller must wait on the hook mutex ({waited:?})"
    );
}
