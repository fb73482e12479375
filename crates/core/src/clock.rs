// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling
//!
//! Lock records carry wall-clock timestamps (seconds since the Unix epoch)
//! so that other sessions can judge their freshness; wait and execution
//! measurements use monotonic instants. The trait exposes both views so
//! tests can advance them in step.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A clock that provides the current time
pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic instant for measuring elapsed time
    fn now(&self) -> Instant;

    /// Wall-clock seconds since the Unix epoch
    fn unix_now(&self) -> f64;
}

/// Real system clock
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Fake clock for testing with controllable time
#[derive(Clone)]
pub struct FakeClock {
    base_instant: Instant,
    base_unix: f64,
    offset: Arc<Mutex<Duration>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            base_instant: Instant::now(),
            base_unix: SystemClock.unix_now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Advance both views of the clock by the given duration
    pub fn advance(&self, duration: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += duration;
    }

    fn offset(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.base_instant + self.offset()
    }

    fn unix_now(&self) -> f64 {
        self.base_unix + self.offset().as_secs_f64()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
