// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook model: what to run and what came of it

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A named external quality check
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Hook {
    /// Name used for reporting and lock coordination
    pub name: String,
    /// Command as argv; the first element is the program
    pub command: Vec<String>,
    /// Ceiling on one execution
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
    /// Whether concurrent runs of this hook contend on shared resources
    /// and must be registered with the lock coordinator
    #[serde(default)]
    pub exclusive: bool,
}

fn default_timeout() -> Duration {
    Duration::from_secs(300)
}

impl Hook {
    pub fn new(name: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command,
            timeout: default_timeout(),
            exclusive: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }
}

/// Terminal state of one hook execution
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum HookStatus {
    Passed,
    Failed { exit_code: i32 },
    TimedOut,
    /// The hook could not run: spawn failure, lock timeout, or panic
    Error { message: String },
}

/// Result of running one hook
#[derive(Clone, Debug, Serialize)]
pub struct HookOutcome {
    pub hook: String,
    pub status: HookStatus,
    /// Combined stdout and stderr
    pub output: String,
    pub duration: Duration,
}

impl HookOutcome {
    pub fn is_success(&self) -> bool {
        self.status == HookStatus::Passed
    }

    pub(crate) fn error(hook: &str, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            hook: hook.to_string(),
            status: HookStatus::Error {
                message: message.into(),
            },
            output: String::new(),
            duration,
        }
    }
}

#[cfg(test)]
#[path = "hook_tests.rs"]
mod tests;
