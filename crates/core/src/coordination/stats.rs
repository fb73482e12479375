// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-hook lock statistics
//!
//! Counters plus two bounded sample rings (wait and execution times,
//! milliseconds, capacity 50, oldest-evicted). Snapshots are serializable
//! so debug tooling can render them alongside the on-disk lock records.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// Ring capacity for wait/execution samples
const SAMPLE_CAP: usize = 50;

/// Raw per-hook counters and sample rings
#[derive(Clone, Debug, Default)]
pub(crate) struct HookStats {
    pub(crate) attempts: u64,
    pub(crate) successes: u64,
    pub(crate) failures: u64,
    pub(crate) timeouts: u64,
    pub(crate) stale_reclaimed: u64,
    pub(crate) heartbeat_failures: u64,
    pub(crate) wait_ms: VecDeque<f64>,
    pub(crate) execution_ms: VecDeque<f64>,
}

fn push_sample(ring: &mut VecDeque<f64>, value: f64) {
    if ring.len() == SAMPLE_CAP {
        ring.pop_front();
    }
    ring.push_back(value);
}

/// Registry of [`HookStats`], keyed by hook name
///
/// Guarded by a short internal mutex; never held across an await.
#[derive(Debug, Default)]
pub(crate) struct StatsRegistry {
    inner: Mutex<HashMap<String, HookStats>>,
}

impl StatsRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn with_entry(&self, hook: &str, update: impl FnOnce(&mut HookStats)) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        update(inner.entry(hook.to_string()).or_default());
    }

    pub(crate) fn record_attempt(&self, hook: &str) {
        self.with_entry(hook, |s| s.attempts += 1);
    }

    pub(crate) fn record_success(&self, hook: &str) {
        self.with_entry(hook, |s| s.successes += 1);
    }

    pub(crate) fn record_failure(&self, hook: &str) {
        self.with_entry(hook, |s| s.failures += 1);
    }

    pub(crate) fn record_timeout(&self, hook: &str) {
        self.with_entry(hook, |s| s.timeouts += 1);
    }

    pub(crate) fn record_stale_reclaimed(&self, hook: &str) {
        self.with_entry(hook, |s| s.stale_reclaimed += 1);
    }

    pub(crate) fn record_heartbeat_failure(&self, hook: &str) {
        self.with_entry(hook, |s| s.heartbeat_failures += 1);
    }

    pub(crate) fn record_wait(&self, hook: &str, waited: Duration) {
        self.with_entry(hook, |s| {
            push_sample(&mut s.wait_ms, waited.as_secs_f64() * 1000.0);
        });
    }

    pub(crate) fn record_execution(&self, hook: &str, ran: Duration) {
        self.with_entry(hook, |s| {
            push_sample(&mut s.execution_ms, ran.as_secs_f64() * 1000.0);
        });
    }

    /// Clone the stats for one hook (zeroed when nothing was recorded)
    pub(crate) fn collect(&self, hook: &str) -> HookStats {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.get(hook).cloned().unwrap_or_default()
    }

    /// Clear counters and samples for one hook, or for all hooks
    pub(crate) fn reset(&self, hook: Option<&str>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match hook {
            Some(hook) => {
                inner.remove(hook);
            }
            None => inner.clear(),
        }
    }

    pub(crate) fn remove(&self, hook: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.remove(hook);
    }

    /// Aggregate counters across every hook
    pub(crate) fn totals(&self) -> StatsTotals {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut totals = StatsTotals::default();
        for stats in inner.values() {
            totals.attempts += stats.attempts;
            totals.successes += stats.successes;
            totals.failures += stats.failures;
            totals.timeouts += stats.timeouts;
            totals.stale_reclaimed += stats.stale_reclaimed;
            totals.heartbeat_failures += stats.heartbeat_failures;
        }
        totals.overall_success_rate = rate(totals.successes, totals.attempts);
        totals
    }
}

fn rate(successes: u64, attempts: u64) -> f64 {
    if attempts == 0 {
        0.0
    } else {
        successes as f64 / attempts as f64
    }
}

/// Min/avg/max over one sample ring
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SampleSummary {
    pub count: usize,
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
}

impl SampleSummary {
    fn from_samples(samples: &VecDeque<f64>) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &value in samples {
            min = min.min(value);
            max = max.max(value);
            sum += value;
        }
        Self {
            count: samples.len(),
            min_ms: min,
            avg_ms: sum / samples.len() as f64,
            max_ms: max,
        }
    }
}

/// Point-in-time view of one hook's lock statistics
#[derive(Clone, Debug, Serialize)]
pub struct StatsSnapshot {
    pub hook: String,
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub stale_reclaimed: u64,
    pub heartbeat_failures: u64,
    pub success_rate: f64,
    pub wait: SampleSummary,
    pub execution: SampleSummary,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub currently_held_in_process: bool,
    pub in_active_global: bool,
}

impl StatsSnapshot {
    pub(crate) fn from_stats(
        hook: &str,
        stats: &HookStats,
        timeout: Duration,
        currently_held_in_process: bool,
        in_active_global: bool,
    ) -> Self {
        Self {
            hook: hook.to_string(),
            attempts: stats.attempts,
            successes: stats.successes,
            failures: stats.failures,
            timeouts: stats.timeouts,
            stale_reclaimed: stats.stale_reclaimed,
            heartbeat_failures: stats.heartbeat_failures,
            success_rate: rate(stats.successes, stats.attempts),
            wait: SampleSummary::from_samples(&stats.wait_ms),
            execution: SampleSummary::from_samples(&stats.execution_ms),
            timeout,
            currently_held_in_process,
            in_active_global,
        }
    }
}

/// Aggregate counters across all hooks
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct StatsTotals {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub stale_reclaimed: u64,
    pub heartbeat_failures: u64,
    pub overall_success_rate: f64,
}

/// Comprehensive coordinator snapshot for debug tooling
#[derive(Clone, Debug, Serialize)]
pub struct CoordinatorStatus {
    pub global_enabled: bool,
    pub lock_dir: PathBuf,
    pub session_id: String,
    pub hostname: String,
    pub registered_hooks: Vec<String>,
    pub custom_timeouts: BTreeMap<String, Duration>,
    pub currently_held: Vec<String>,
    pub active_global: Vec<String>,
    pub heartbeat_tasks: usize,
    pub hooks: Vec<StatsSnapshot>,
    pub totals: StatsTotals,
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
