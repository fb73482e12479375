// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat task for held global locks
//!
//! One cooperative background task per held lock file. It wakes every
//! `interval`, re-reads the record, and rewrites `last_heartbeat` while
//! this session still owns it. The task self-terminates on cancellation,
//! on a missing file, on an ownership change, or after three consecutive
//! rewrite errors. No file handle is held across sleeps.

use crate::clock::Clock;
use crate::coordination::active::ActiveLocks;
use crate::coordination::lockfile::{self, RefreshOutcome};
use crate::coordination::stats::StatsRegistry;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Consecutive rewrite errors before the task gives up
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Everything one heartbeat task needs
pub(crate) struct HeartbeatTask<C: Clock> {
    pub(crate) hook: String,
    pub(crate) path: PathBuf,
    pub(crate) interval: Duration,
    pub(crate) session_id: String,
    pub(crate) clock: C,
    pub(crate) stats: Arc<StatsRegistry>,
    pub(crate) active: Arc<ActiveLocks>,
}

/// Handle to a running heartbeat task
#[derive(Debug)]
pub(crate) struct HeartbeatHandle {
    cancelled: Arc<AtomicBool>,
    wake: Arc<Notify>,
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    /// Cooperatively stop the task, waking its sleep promptly
    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.wake.notify_one();
        self.task.abort();
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn the heartbeat loop for a lock file this session just created
pub(crate) fn spawn<C: Clock>(task: HeartbeatTask<C>) -> HeartbeatHandle {
    let cancelled = Arc::new(AtomicBool::new(false));
    let wake = Arc::new(Notify::new());
    let handle = tokio::spawn(run(task, Arc::clone(&cancelled), Arc::clone(&wake)));
    HeartbeatHandle {
        cancelled,
        wake,
        task: handle,
    }
}

async fn run<C: Clock>(task: HeartbeatTask<C>, cancelled: Arc<AtomicBool>, wake: Arc<Notify>) {
    debug!(
        hook = %task.hook,
        interval_ms = task.interval.as_millis() as u64,
        "starting heartbeat"
    );

    let mut consecutive_failures = 0u32;
    loop {
        tokio::select! {
            _ = wake.notified() => {}
            _ = tokio::time::sleep(task.interval) => {}
        }

        if cancelled.load(Ordering::SeqCst) {
            debug!(hook = %task.hook, "heartbeat cancelled");
            break;
        }
        if !task.active.contains(&task.hook) {
            break;
        }

        match lockfile::refresh_heartbeat(&task.path, &task.session_id, task.clock.unix_now()) {
            Ok(RefreshOutcome::Refreshed) => {
                consecutive_failures = 0;
            }
            Ok(RefreshOutcome::Missing) => {
                warn!(hook = %task.hook, "lock file disappeared, stopping heartbeat");
                task.stats.record_heartbeat_failure(&task.hook);
                task.active.discard(&task.hook);
                break;
            }
            Ok(RefreshOutcome::OwnershipChanged) => {
                warn!(hook = %task.hook, "lock ownership changed, stopping heartbeat");
                task.stats.record_heartbeat_failure(&task.hook);
                task.active.discard(&task.hook);
                break;
            }
            Err(e) => {
                task.stats.record_heartbeat_failure(&task.hook);
                consecutive_failures += 1;
                warn!(hook = %task.hook, error = %e, "heartbeat update failed");
                if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    error!(hook = %task.hook, "too many heartbeat failures, stopping heartbeat");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
