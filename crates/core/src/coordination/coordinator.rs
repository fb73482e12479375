// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock coordinator for resource-contending hooks
//!
//! Presents one scoped-acquisition primitive, `acquire(hook) -> HookGuard`,
//! backed by two tiers:
//! - a per-process async mutex per registered hook, and
//! - a per-host file lock with heartbeat liveness and stale reclamation.
//!
//! The file tier is entered first (reclaiming stale or corrupt locks,
//! retrying exclusive creation with jittered exponential backoff, then
//! starting a heartbeat); the hook mutex is awaited second under a
//! per-hook deadline. When this process already holds the file lock for a
//! hook, additional local callers join it as co-holders and serialize on
//! the mutex alone.
//!
//! Internal maps are guarded by short `std::sync` mutexes and never held
//! across an await.

use crate::clock::{Clock, SystemClock};
use crate::coordination::active::ActiveLocks;
use crate::coordination::config::GlobalLockConfig;
use crate::coordination::guard::{release_global, HookGuard, SharedState};
use crate::coordination::heartbeat::{self, HeartbeatTask};
use crate::coordination::lockfile::{self, LockRecord};
use crate::coordination::maintenance;
use crate::coordination::stats::{CoordinatorStatus, StatsRegistry, StatsSnapshot};
use crate::error::{LockError, RecordError};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Registered hooks: one async mutex each, plus timeout overrides
#[derive(Default)]
struct HookTable {
    required: HashMap<String, Arc<tokio::sync::Mutex<()>>>,
    timeouts: HashMap<String, Duration>,
}

/// Coordinates hook serialization within this process and across the host
///
/// Constructed once at startup and passed to the executors; there are no
/// hidden globals.
pub struct LockCoordinator<C: Clock = SystemClock> {
    config: GlobalLockConfig,
    clock: C,
    global_enabled: AtomicBool,
    hooks: Mutex<HookTable>,
    shared: Arc<SharedState>,
}

impl LockCoordinator<SystemClock> {
    pub fn new(config: GlobalLockConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> LockCoordinator<C> {
    pub fn with_clock(config: GlobalLockConfig, clock: C) -> Self {
        let coordinator = Self {
            global_enabled: AtomicBool::new(config.enabled),
            shared: Arc::new(SharedState {
                stats: Arc::new(StatsRegistry::new()),
                active: Arc::new(ActiveLocks::new()),
                heartbeats: Mutex::new(HashMap::new()),
                session_id: config.session_id().to_string(),
            }),
            hooks: Mutex::new(HookTable::default()),
            clock,
            config,
        };

        if coordinator.config.cleanup_on_start {
            if let Err(e) = coordinator.cleanup_stale(None) {
                warn!(error = %e, "startup lock sweep failed");
            }
        }

        coordinator
    }

    pub fn config(&self) -> &GlobalLockConfig {
        &self.config
    }

    // === Registration ===

    /// Whether `hook` is subject to lock coordination
    pub fn requires_lock(&self, hook: &str) -> bool {
        let table = self.hooks.lock().unwrap_or_else(|e| e.into_inner());
        table.required.contains_key(hook)
    }

    /// Add `hook` to the required-lock set, creating its mutex
    pub fn register(&self, hook: &str) {
        let mut table = self.hooks.lock().unwrap_or_else(|e| e.into_inner());
        table
            .required
            .entry(hook.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())));
        info!(hook, "hook registered for lock coordination");
    }

    /// Remove `hook` from the required-lock set
    ///
    /// Fails if the hook is currently held in this process or holds an
    /// active global lock. Unregistering an unknown hook is a no-op.
    pub fn unregister(&self, hook: &str) -> Result<(), LockError> {
        let mut table = self.hooks.lock().unwrap_or_else(|e| e.into_inner());
        let Some(mutex) = table.required.get(hook) else {
            return Ok(());
        };
        if mutex.try_lock().is_err() || self.shared.active.contains(hook) {
            return Err(LockError::HookBusy(hook.to_string()));
        }
        table.required.remove(hook);
        table.timeouts.remove(hook);
        drop(table);

        self.shared.stats.remove(hook);
        info!(hook, "hook unregistered from lock coordination");
        Ok(())
    }

    // === Timeouts and the global gate ===

    /// Override the mutex-wait deadline for one hook
    pub fn set_timeout(&self, hook: &str, timeout: Duration) {
        let mut table = self.hooks.lock().unwrap_or_else(|e| e.into_inner());
        table.timeouts.insert(hook.to_string(), timeout);
        info!(hook, timeout_secs = timeout.as_secs_f64(), "custom lock timeout set");
    }

    pub fn get_timeout(&self, hook: &str) -> Duration {
        let table = self.hooks.lock().unwrap_or_else(|e| e.into_inner());
        table
            .timeouts
            .get(hook)
            .copied()
            .unwrap_or(self.config.timeout)
    }

    /// Gate the file-lock tier at runtime
    ///
    /// Does not affect guards that are already held.
    pub fn set_global_enabled(&self, enabled: bool) {
        self.global_enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "global lock tier toggled");
    }

    pub fn global_enabled(&self) -> bool {
        self.global_enabled.load(Ordering::SeqCst)
    }

    // === Introspection ===

    /// Whether the per-process mutex for `hook` is currently held
    pub fn is_held_in_process(&self, hook: &str) -> bool {
        let table = self.hooks.lock().unwrap_or_else(|e| e.into_inner());
        match table.required.get(hook) {
            Some(mutex) => mutex.try_lock().is_err(),
            None => false,
        }
    }

    /// Statistics snapshot for one hook
    pub fn stats(&self, hook: &str) -> StatsSnapshot {
        let stats = self.shared.stats.collect(hook);
        StatsSnapshot::from_stats(
            hook,
            &stats,
            self.get_timeout(hook),
            self.is_held_in_process(hook),
            self.shared.active.contains(hook),
        )
    }

    /// Clear statistics for one hook, or for all hooks
    pub fn reset_stats(&self, hook: Option<&str>) {
        self.shared.stats.reset(hook);
        info!(hook = hook.unwrap_or("*"), "lock statistics reset");
    }

    /// Comprehensive snapshot for debug tooling
    pub fn status(&self) -> CoordinatorStatus {
        let (registered_hooks, custom_timeouts, currently_held) = {
            let table = self.hooks.lock().unwrap_or_else(|e| e.into_inner());
            let mut names: Vec<String> = table.required.keys().cloned().collect();
            names.sort();
            let timeouts: BTreeMap<String, Duration> = table
                .timeouts
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect();
            let held: Vec<String> = names
                .iter()
                .filter(|name| {
                    table
                        .required
                        .get(name.as_str())
                        .is_some_and(|m| m.try_lock().is_err())
                })
                .cloned()
                .collect();
            (names, timeouts, held)
        };

        let heartbeat_tasks = {
            let heartbeats = self
                .shared
                .heartbeats
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            heartbeats.len()
        };

        let hooks = registered_hooks
            .iter()
            .map(|name| self.stats(name))
            .collect();

        CoordinatorStatus {
            global_enabled: self.global_enabled(),
            lock_dir: self.config.lock_dir.clone(),
            session_id: self.config.session_id().to_string(),
            hostname: self.config.identity.hostname.clone(),
            registered_hooks,
            custom_timeouts,
            currently_held,
            active_global: self.shared.active.names(),
            heartbeat_tasks,
            hooks,
            totals: self.shared.stats.totals(),
        }
    }

    // === Acquisition ===

    /// Acquire both lock tiers for `hook` and return a scoped guard
    ///
    /// Hooks outside the required set get a no-op guard immediately. With
    /// the global tier disabled, only the per-process mutex is taken.
    /// Partial acquisition never escapes: if the mutex deadline expires
    /// (or the caller is cancelled) after the file tier was entered, the
    /// file tier is unwound before control returns.
    ///
    /// Callers must not acquire one hook while holding another's guard;
    /// hooks do not compose locks.
    pub async fn acquire(&self, hook: &str) -> Result<HookGuard, LockError> {
        let Some((mutex, timeout)) = self.hook_entry(hook) else {
            return Ok(HookGuard::noop(hook));
        };

        let started = self.clock.now();
        self.shared.stats.record_attempt(hook);
        debug!(hook, "acquiring hook lock");

        let global_tier = if self.global_enabled() {
            let path = self.config.lock_path(hook);
            Some(self.acquire_global(hook, path).await?)
        } else {
            None
        };

        let permit = match tokio::time::timeout(timeout, mutex.lock_owned()).await {
            Ok(permit) => permit,
            Err(_) => {
                // Unwinds the file tier (if this call entered it)
                drop(global_tier);
                self.shared.stats.record_timeout(hook);
                let waited = self.clock.now().duration_since(started);
                warn!(
                    hook,
                    timeout_secs = timeout.as_secs_f64(),
                    "hook mutex acquisition timed out"
                );
                return Err(LockError::Timeout {
                    hook: hook.to_string(),
                    waited,
                });
            }
        };

        let waited = self.clock.now().duration_since(started);
        self.shared.stats.record_wait(hook, waited);
        info!(
            hook,
            waited_ms = waited.as_millis() as u64,
            "hook lock acquired"
        );

        let guard = match global_tier {
            Some(tier) => {
                let lock_path = tier.defuse();
                HookGuard::global(hook, Arc::clone(&self.shared), lock_path, permit)
            }
            None => HookGuard::local(hook, Arc::clone(&self.shared), permit),
        };
        self.shared.stats.record_success(hook);
        Ok(guard)
    }

    /// Sweep the lock directory, removing stale and corrupt lock files
    ///
    /// Returns the number removed. Per-file failures are logged and
    /// skipped; only directory-level errors propagate.
    pub fn cleanup_stale(&self, max_age: Option<Duration>) -> Result<usize, LockError> {
        let max_age = max_age.unwrap_or(self.config.stale_threshold);
        let removed =
            maintenance::sweep_stale_locks(&self.config.lock_dir, max_age, self.clock.unix_now())?;
        for entry in &removed {
            self.shared.stats.record_stale_reclaimed(&entry.hook);
        }
        if !removed.is_empty() {
            info!(removed = removed.len(), "cleaned up stale lock files");
        }
        Ok(removed.len())
    }

    // === Internals ===

    fn hook_entry(&self, hook: &str) -> Option<(Arc<tokio::sync::Mutex<()>>, Duration)> {
        let table = self.hooks.lock().unwrap_or_else(|e| e.into_inner());
        let mutex = Arc::clone(table.required.get(hook)?);
        let timeout = table
            .timeouts
            .get(hook)
            .copied()
            .unwrap_or(self.config.timeout);
        Some((mutex, timeout))
    }

    /// Enter the file-lock tier for `hook`
    ///
    /// Joins an existing holder in this process when possible; otherwise
    /// reclaims a stale lock, then retries exclusive creation with
    /// jittered exponential backoff. On success a heartbeat task is
    /// running and the returned cleanup value is armed: dropping it
    /// before `defuse` unwinds the tier.
    async fn acquire_global(
        &self,
        hook: &str,
        path: PathBuf,
    ) -> Result<GlobalTierCleanup, LockError> {
        if self.shared.active.join_if_held(hook) {
            debug!(hook, "joining global lock held by this process");
            return Ok(self.armed_cleanup(hook, path));
        }

        self.reclaim_if_stale(hook, &path);

        let started = self.clock.now();
        let max_retries = self.config.max_retries.max(1);
        for attempt in 0..max_retries {
            // Another local task may have won the file since our last try
            if self.shared.active.join_if_held(hook) {
                debug!(hook, "joining global lock held by this process");
                return Ok(self.armed_cleanup(hook, path));
            }

            let record = LockRecord::new(&self.config.identity, hook, self.clock.unix_now());
            match lockfile::write_exclusive(&path, &record) {
                Ok(()) => {
                    self.shared.active.insert_holder(hook);
                    self.start_heartbeat(hook, path.clone());
                    debug!(hook, path = %path.display(), "global lock file created");
                    return Ok(self.armed_cleanup(hook, path));
                }
                Err(LockError::AlreadyHeld { .. }) if attempt + 1 < max_retries => {
                    let delay = backoff_delay(self.config.retry_delay, attempt);
                    // Soft overall cap on the file-tier loop
                    if self.clock.now().duration_since(started) + delay > self.config.timeout {
                        break;
                    }
                    debug!(
                        hook,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "global lock exists, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(LockError::AlreadyHeld { .. }) => break,
                Err(e) => {
                    self.shared.stats.record_failure(hook);
                    warn!(hook, error = %e, "global lock acquisition failed");
                    return Err(e);
                }
            }
        }

        self.shared.stats.record_failure(hook);
        let waited = self.clock.now().duration_since(started);
        warn!(
            hook,
            attempts = max_retries,
            "failed to acquire global lock after retries"
        );
        Err(LockError::Timeout {
            hook: hook.to_string(),
            waited,
        })
    }

    fn start_heartbeat(&self, hook: &str, path: PathBuf) {
        let handle = heartbeat::spawn(HeartbeatTask {
            hook: hook.to_string(),
            path,
            interval: self.config.heartbeat_interval,
            session_id: self.config.session_id().to_string(),
            clock: self.clock.clone(),
            stats: Arc::clone(&self.shared.stats),
            active: Arc::clone(&self.shared.active),
        });
        let mut heartbeats = self
            .shared
            .heartbeats
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = heartbeats.insert(hook.to_string(), handle) {
            previous.cancel();
        }
    }

    /// Remove the lock file for `hook` if it is stale or unparseable
    fn reclaim_if_stale(&self, hook: &str, path: &Path) {
        match lockfile::read(path) {
            Err(RecordError::NotFound(_)) => {}
            Err(RecordError::Corrupt { .. }) => {
                warn!(hook, path = %path.display(), "removing corrupt lock file");
                if std::fs::remove_file(path).is_ok() {
                    self.shared.stats.record_stale_reclaimed(hook);
                }
            }
            Err(RecordError::Io(e)) => {
                warn!(hook, error = %e, "could not check lock staleness");
            }
            Ok(record) => {
                let age = self.clock.unix_now() - record.freshness();
                if age > self.config.stale_threshold.as_secs_f64() {
                    warn!(
                        hook,
                        age_secs = age as u64,
                        owner = %record.session_id,
                        "removing stale lock"
                    );
                    if std::fs::remove_file(path).is_ok() {
                        self.shared.stats.record_stale_reclaimed(hook);
                    }
                } else {
                    debug!(hook, owner = %record.session_id, "active lock exists");
                }
            }
        }
    }

    fn armed_cleanup(&self, hook: &str, lock_path: PathBuf) -> GlobalTierCleanup {
        GlobalTierCleanup {
            shared: Arc::clone(&self.shared),
            hook: hook.to_string(),
            lock_path,
            armed: true,
        }
    }
}

/// Unwinds the file tier unless defused
///
/// Covers both the mutex-deadline failure and caller cancellation between
/// the two tiers: dropping this while armed releases this call's share of
/// the global lock.
struct GlobalTierCleanup {
    shared: Arc<SharedState>,
    hook: String,
    lock_path: PathBuf,
    armed: bool,
}

impl GlobalTierCleanup {
    fn defuse(mut self) -> PathBuf {
        self.armed = false;
        self.lock_path.clone()
    }
}

impl Drop for GlobalTierCleanup {
    fn drop(&mut self) {
        if self.armed {
            release_global(&self.shared, &self.hook, &self.lock_path);
        }
    }
}

/// Exponential backoff with bounded jitter (within ±5% of the delay)
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let delay = base.as_secs_f64() * 2f64.powi(attempt as i32);
    let jitter = delay * 0.1 * (fastrand::f64() - 0.5);
    Duration::from_secs_f64((delay + jitter).max(0.0))
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
