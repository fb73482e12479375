//! End-to-end executor runs over the coordinator with real subprocesses.

use crate::prelude::*;
use spruce_hooks::{CommandRunner, Hook, ParallelExecutor, SequentialExecutor};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn echo_hook(name: &str) -> Hook {
    Hook::new(name, vec!["echo".to_string(), name.to_string()])
        .with_timeout(Duration::from_secs(10))
}

#[tokio::test]
async fn sequential_run_serializes_and_cleans_up() {
    let dir = tempdir().unwrap();
    let coordinator = scenario_coordinator(dir.path());
    let executor = SequentialExecutor::new(Arc::clone(&coordinator), Arc::new(CommandRunner::new()));

    let hooks = vec![echo_hook("ruff"), echo_hook(HOOK), echo_hook("zizmor")];
    let outcomes = executor.run(&hooks).await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| o.is_success()));
    assert_eq!(coordinator.stats(HOOK).successes, 1);
    // Only the registered hook took the lock path
    assert_eq!(coordinator.stats("ruff").attempts, 0);
    assert!(lock_dir_entries(dir.path()).is_empty());
}

#[tokio::test]
async fn parallel_run_keeps_locking_hook_exclusive() {
    let dir = tempdir().unwrap();
    let coordinator = scenario_coordinator(dir.path());
    let executor = ParallelExecutor::new(Arc::clone(&coordinator), Arc::new(CommandRunner::new()));

    let hooks = vec![
        echo_hook(HOOK),
        echo_hook(HOOK),
        echo_hook("ruff"),
        echo_hook("pyright"),
    ];
    let outcomes = executor.run(&hooks).await;

    assert!(outcomes.iter().all(|o| o.is_success()));
    let names: Vec<&str> = outcomes.iter().map(|o| o.hook.as_str()).collect();
    assert_eq!(names, vec![HOOK, HOOK, "ruff", "pyright"]);

    let stats = coordinator.stats(HOOK);
    assert_eq!(stats.attempts, 2);
    assert_eq!(stats.successes, 2);
    assert!(lock_dir_entries(dir.path()).is_empty());
}
