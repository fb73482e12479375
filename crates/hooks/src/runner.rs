// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution seam for hooks
//!
//! Executors treat `execute(hook)` as opaque; the shipped implementation
//! spawns the hook's argv as a subprocess with a deadline.

use crate::hook::{Hook, HookOutcome, HookStatus};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, warn};

/// Runs one hook to completion
#[async_trait]
pub trait HookRunner: Send + Sync {
    async fn execute(&self, hook: &Hook) -> HookOutcome;
}

/// Subprocess-backed runner
#[derive(Clone, Copy, Debug, Default)]
pub struct CommandRunner;

impl CommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HookRunner for CommandRunner {
    async fn execute(&self, hook: &Hook) -> HookOutcome {
        let started = Instant::now();

        let Some((program, args)) = hook.command.split_first() else {
            return HookOutcome::error(&hook.name, "hook has an empty command", started.elapsed());
        };

        debug!(hook = %hook.name, program, "running hook");

        let output = tokio::time::timeout(
            hook.timeout,
            tokio::process::Command::new(program).args(args).output(),
        )
        .await;

        let duration = started.elapsed();
        match output {
            Err(_) => {
                warn!(hook = %hook.name, timeout_secs = hook.timeout.as_secs_f64(), "hook timed out");
                HookOutcome {
                    hook: hook.name.clone(),
                    status: HookStatus::TimedOut,
                    output: String::new(),
                    duration,
                }
            }
            Ok(Err(e)) => {
                warn!(hook = %hook.name, error = %e, "hook failed to spawn");
                HookOutcome::error(&hook.name, e.to_string(), duration)
            }
            Ok(Ok(output)) => {
                let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
                combined.push_str(&String::from_utf8_lossy(&output.stderr));

                let status = if output.status.success() {
                    HookStatus::Passed
                } else {
                    HookStatus::Failed {
                        exit_code: output.status.code().unwrap_or(-1),
                    }
                };

                HookOutcome {
                    hook: hook.name.clone(),
                    status,
                    output: combined,
                    duration,
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
