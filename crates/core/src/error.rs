// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the coordination core

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by [`LockCoordinator`](crate::LockCoordinator)
///
/// `AlreadyHeld` is absorbed by the acquisition retry loop and only
/// escapes as `Timeout` once the retry budget is spent.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("global lock for {hook} is held by another session")]
    AlreadyHeld { hook: String },

    #[error("timed out acquiring lock for {hook} after {waited:?}")]
    Timeout { hook: String, waited: Duration },

    #[error("hook {0} is currently locked; cannot unregister")]
    HookBusy(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the on-disk lock record codec
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("lock record not found at {0}")]
    NotFound(PathBuf),

    #[error("corrupt lock record at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
