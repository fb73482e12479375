// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide table of held global locks
//!
//! One entry per hook whose lock file this process created, refcounted so
//! concurrent local callers share the file and its heartbeat. The file and
//! heartbeat are torn down only when the last holder leaves. The heartbeat
//! task discards an entry wholesale when it observes ownership loss.

use std::collections::HashMap;
use std::sync::Mutex;

/// What `leave` found when a holder released its share
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LeaveOutcome {
    /// This was the last holder; the file and heartbeat must go
    LastHolder,
    /// Other local holders still rely on the file lock
    OthersRemain,
    /// The entry was already gone (ownership lost or never held)
    NotHeld,
}

#[derive(Debug, Default)]
pub(crate) struct ActiveLocks {
    held: Mutex<HashMap<String, usize>>,
}

impl ActiveLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Join an existing entry as a co-holder; false if none exists
    pub(crate) fn join_if_held(&self, hook: &str) -> bool {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        match held.get_mut(hook) {
            Some(count) => {
                *count += 1;
                true
            }
            None => false,
        }
    }

    /// Record that this process just created the lock file for `hook`
    pub(crate) fn insert_holder(&self, hook: &str) {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        held.insert(hook.to_string(), 1);
    }

    /// Release one holder's share of `hook`
    pub(crate) fn leave(&self, hook: &str) -> LeaveOutcome {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        match held.get_mut(hook) {
            Some(count) if *count <= 1 => {
                held.remove(hook);
                LeaveOutcome::LastHolder
            }
            Some(count) => {
                *count -= 1;
                LeaveOutcome::OthersRemain
            }
            None => LeaveOutcome::NotHeld,
        }
    }

    /// Drop an entry regardless of holder count
    pub(crate) fn discard(&self, hook: &str) {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        held.remove(hook);
    }

    pub(crate) fn contains(&self, hook: &str) -> bool {
        let held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        held.contains_key(hook)
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = held.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
#[path = "active_tests.rs"]
mod tests;
