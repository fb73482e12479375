//! Shared configuration for the behavioral specs.
//!
//! Every scenario uses the same literal cadences: heartbeat 1s, stale
//! threshold 3s, mutex timeout 5s, three creation attempts starting at a
//! 100ms backoff. Lock directories are per-test temp dirs.

use spruce_core::{
    Clock, GlobalLockConfig, LockCoordinator, LockOptions, LockRecord, SessionIdentity,
    SystemClock,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const HOOK: &str = "complexipy";

pub fn scenario_options(lock_dir: &Path) -> LockOptions {
    LockOptions::new()
        .with_lock_dir(lock_dir)
        .with_timeout(Duration::from_secs(5))
        .with_stale_threshold(Duration::from_secs(3))
        .with_heartbeat_interval(Duration::from_secs(1))
        .with_max_retries(3)
        .with_retry_delay(Duration::from_millis(100))
        .with_cleanup_on_start(false)
}

pub fn scenario_coordinator(lock_dir: &Path) -> Arc<LockCoordinator> {
    let config = GlobalLockConfig::from_options(&scenario_options(lock_dir)).unwrap();
    let coordinator = LockCoordinator::new(config);
    coordinator.register(HOOK);
    Arc::new(coordinator)
}

pub fn unix_now() -> f64 {
    SystemClock.unix_now()
}

/// Plant a lock file owned by a session that is not ours
pub fn plant_foreign_lock(coordinator: &LockCoordinator, session_id: &str, heartbeat: f64) {
    let identity = SessionIdentity {
        hostname: "ghost".to_string(),
        pid: 999,
        session_id: session_id.to_string(),
    };
    let record = LockRecord::new(&identity, HOOK, heartbeat);
    let json = serde_json::to_string_pretty(&record).unwrap();
    std::fs::write(coordinator.config().lock_path(HOOK), json).unwrap();
}

/// Names of all entries in the lock directory, sorted
pub fn lock_dir_entries(lock_dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(lock_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
