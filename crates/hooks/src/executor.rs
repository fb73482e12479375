// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook executors
//!
//! Two strategies over the same per-hook contract: consult
//! `requires_lock`, wrap `execute` in `acquire` when it holds, and let
//! guard drop release everything. The executors perform no lock logic of
//! their own.

use crate::hook::{Hook, HookOutcome};
use crate::runner::HookRunner;
use spruce_core::{Clock, LockCoordinator, SystemClock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Run one hook, serialized when the coordinator requires it
async fn run_coordinated<R, C>(
    coordinator: &LockCoordinator<C>,
    runner: &R,
    hook: &Hook,
) -> HookOutcome
where
    R: HookRunner,
    C: Clock,
{
    if !coordinator.requires_lock(&hook.name) {
        return runner.execute(hook).await;
    }

    let started = Instant::now();
    match coordinator.acquire(&hook.name).await {
        Ok(_guard) => runner.execute(hook).await,
        Err(e) => {
            warn!(hook = %hook.name, error = %e, "skipping hook, lock not acquired");
            HookOutcome::error(
                &hook.name,
                format!("lock acquisition failed: {e}"),
                started.elapsed(),
            )
        }
    }
}

/// Runs hooks one at a time, in input order
pub struct SequentialExecutor<R, C: Clock = SystemClock> {
    coordinator: Arc<LockCoordinator<C>>,
    runner: Arc<R>,
}

impl<R, C> SequentialExecutor<R, C>
where
    R: HookRunner,
    C: Clock,
{
    pub fn new(coordinator: Arc<LockCoordinator<C>>, runner: Arc<R>) -> Self {
        Self {
            coordinator,
            runner,
        }
    }

    pub async fn run(&self, hooks: &[Hook]) -> Vec<HookOutcome> {
        let mut outcomes = Vec::with_capacity(hooks.len());
        for hook in hooks {
            outcomes.push(run_coordinated(&self.coordinator, self.runner.as_ref(), hook).await);
        }
        outcomes
    }
}

/// Runs every hook concurrently; locking hooks serialize on their guards
///
/// Outcomes are returned in input order regardless of completion order.
pub struct ParallelExecutor<R, C: Clock = SystemClock> {
    coordinator: Arc<LockCoordinator<C>>,
    runner: Arc<R>,
}

impl<R, C> ParallelExecutor<R, C>
where
    R: HookRunner + 'static,
    C: Clock,
{
    pub fn new(coordinator: Arc<LockCoordinator<C>>, runner: Arc<R>) -> Self {
        Self {
            coordinator,
            runner,
        }
    }

    pub async fn run(&self, hooks: &[Hook]) -> Vec<HookOutcome> {
        let mut handles = Vec::with_capacity(hooks.len());
        for hook in hooks.iter().cloned() {
            let coordinator = Arc::clone(&self.coordinator);
            let runner = Arc::clone(&self.runner);
            handles.push(tokio::spawn(async move {
                run_coordinated(&coordinator, runner.as_ref(), &hook).await
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (handle, hook) in handles.into_iter().zip(hooks) {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(hook = %hook.name, error = %e, "hook task aborted");
                    outcomes.push(HookOutcome::error(
                        &hook.name,
                        format!("hook task failed: {e}"),
                        Duration::ZERO,
                    ));
                }
            }
        }
        outcomes
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
