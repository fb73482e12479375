// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scoped guard returned by `acquire`
//!
//! Dropping the guard is the sole release point: execution time is
//! recorded, then (when this was the last local holder) the heartbeat is
//! cancelled and the lock file removed if still owned, and finally the
//! hook mutex permit is released. Release never fails; errors are logged.

use crate::coordination::active::{ActiveLocks, LeaveOutcome};
use crate::coordination::heartbeat::HeartbeatHandle;
use crate::coordination::lockfile;
use crate::coordination::stats::StatsRegistry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

/// Coordinator state shared with guards and heartbeat bookkeeping
pub(crate) struct SharedState {
    pub(crate) stats: Arc<StatsRegistry>,
    pub(crate) active: Arc<ActiveLocks>,
    pub(crate) heartbeats: Mutex<HashMap<String, HeartbeatHandle>>,
    pub(crate) session_id: String,
}

/// Release one holder's share of the global tier for `hook`
///
/// Used both by guard drop and by the unwind path when the mutex wait
/// fails after the file tier was entered. Best-effort throughout.
pub(crate) fn release_global(shared: &SharedState, hook: &str, lock_path: &Path) {
    match shared.active.leave(hook) {
        LeaveOutcome::OthersRemain => {
            debug!(hook, "global lock left to remaining local holders");
        }
        LeaveOutcome::LastHolder => {
            cancel_heartbeat(shared, hook);
            match lockfile::remove_if_owned(lock_path, &shared.session_id) {
                Ok(true) => debug!(hook, "removed global lock file"),
                Ok(false) => debug!(hook, "lock file absent or owned elsewhere, leaving it"),
                Err(e) => {
                    warn!(hook, error = %e, "could not verify lock ownership for cleanup");
                }
            }
        }
        LeaveOutcome::NotHeld => {
            // Ownership was lost while we ran; the file is not ours to
            // remove, but a finished heartbeat handle may linger.
            cancel_heartbeat(shared, hook);
        }
    }
}

fn cancel_heartbeat(shared: &SharedState, hook: &str) {
    let handle = {
        let mut heartbeats = shared
            .heartbeats
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        heartbeats.remove(hook)
    };
    if let Some(handle) = handle {
        handle.cancel();
    }
}

/// Which tiers this guard actually holds
enum Tier {
    /// Hook does not require locking; nothing held
    Noop,
    /// Per-process mutex only (global tier disabled at acquisition)
    Local,
    /// Per-process mutex plus a share of the global file lock
    Global { lock_path: PathBuf },
}

/// Scoped two-tier lock for one hook
///
/// Returned by [`LockCoordinator::acquire`](crate::LockCoordinator::acquire);
/// everything it holds is released on drop.
pub struct HookGuard {
    hook: String,
    tier: Tier,
    shared: Option<Arc<SharedState>>,
    execution_start: Instant,
    _permit: Option<OwnedMutexGuard<()>>,
}

impl std::fmt::Debug for HookGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookGuard").field("hook", &self.hook).finish()
    }
}

impl HookGuard {
    pub(crate) fn noop(hook: &str) -> Self {
        Self {
            hook: hook.to_string(),
            tier: Tier::Noop,
            shared: None,
            execution_start: Instant::now(),
            _permit: None,
        }
    }

    pub(crate) fn local(hook: &str, shared: Arc<SharedState>, permit: OwnedMutexGuard<()>) -> Self {
        Self {
            hook: hook.to_string(),
            tier: Tier::Local,
            shared: Some(shared),
            execution_start: Instant::now(),
            _permit: Some(permit),
        }
    }

    pub(crate) fn global(
        hook: &str,
        shared: Arc<SharedState>,
        lock_path: PathBuf,
        permit: OwnedMutexGuard<()>,
    ) -> Self {
        Self {
            hook: hook.to_string(),
            tier: Tier::Global { lock_path },
            shared: Some(shared),
            execution_start: Instant::now(),
            _permit: Some(permit),
        }
    }

    pub fn hook_name(&self) -> &str {
        &self.hook
    }

    /// Whether this guard actually holds any lock
    pub fn is_locked(&self) -> bool {
        !matches!(self.tier, Tier::Noop)
    }
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        let Some(shared) = self.shared.take() else {
            return;
        };

        shared
            .stats
            .record_execution(&self.hook, self.execution_start.elapsed());

        if let Tier::Global { lock_path } = &self.tier {
            release_global(&shared, &self.hook, lock_path);
        }

        // The mutex permit is released when _permit drops, after the
        // global tier is fully unwound.
        debug!(hook = %self.hook, "hook lock released");
    }
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
