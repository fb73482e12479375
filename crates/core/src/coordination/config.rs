// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration for the global lock tier
//!
//! [`LockOptions`] is the external configuration snapshot (deserializable,
//! every key optional with documented defaults). [`GlobalLockConfig`] is
//! the validated runtime form: it owns the lock directory, the session
//! identity, and the path derivation for per-hook lock files.

use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Recognized configuration keys for the lock coordinator
///
/// Missing keys take the documented defaults. Durations accept humantime
/// strings (`"600s"`, `"2h"`) when deserialized.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LockOptions {
    /// Gate on the file-lock tier
    pub enabled: bool,
    /// Default per-acquire ceiling for the hook mutex wait
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Lock file location; per-user default when absent
    pub lock_dir: Option<PathBuf>,
    /// Heartbeat age beyond which a lock is reclaimable
    #[serde(with = "humantime_serde")]
    pub stale_threshold: Duration,
    /// Cadence of heartbeat rewrites for held locks
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,
    /// Exclusive-create attempts before giving up
    pub max_retries: u32,
    /// Initial retry backoff (exponential with jitter)
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
    /// Sweep stale locks during coordinator construction
    pub cleanup_on_start: bool,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: Duration::from_secs(600),
            lock_dir: None,
            stale_threshold: Duration::from_secs(2 * 60 * 60),
            heartbeat_interval: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            cleanup_on_start: true,
        }
    }
}

impl LockOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = Some(dir.into());
        self
    }

    pub fn with_stale_threshold(mut self, threshold: Duration) -> Self {
        self.stale_threshold = threshold;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_cleanup_on_start(mut self, cleanup: bool) -> Self {
        self.cleanup_on_start = cleanup;
        self
    }
}

/// Identity of this session, stamped into every lock record it creates
///
/// Derived once at startup and constant for the process lifetime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionIdentity {
    pub hostname: String,
    pub pid: u32,
    pub session_id: String,
}

impl SessionIdentity {
    /// Derive the identity of the current process
    pub fn current() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown-host".to_string());
        let pid = std::process::id();
        let session_id = format!("{hostname}_{pid}");
        Self {
            hostname,
            pid,
            session_id,
        }
    }
}

/// Validated lock configuration, immutable after construction
#[derive(Clone, Debug)]
pub struct GlobalLockConfig {
    pub enabled: bool,
    pub timeout: Duration,
    pub stale_threshold: Duration,
    pub heartbeat_interval: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub cleanup_on_start: bool,
    pub lock_dir: PathBuf,
    pub identity: SessionIdentity,
}

impl GlobalLockConfig {
    /// Build from an options snapshot
    ///
    /// Creates the lock directory recursively and restricts it to the
    /// owner (0o700). Directory creation failures propagate.
    pub fn from_options(options: &LockOptions) -> io::Result<Self> {
        let lock_dir = options
            .lock_dir
            .clone()
            .unwrap_or_else(default_lock_dir);

        std::fs::create_dir_all(&lock_dir)?;
        restrict_to_owner(&lock_dir)?;

        Ok(Self {
            enabled: options.enabled,
            timeout: options.timeout,
            stale_threshold: options.stale_threshold,
            heartbeat_interval: options.heartbeat_interval,
            max_retries: options.max_retries,
            retry_delay: options.retry_delay,
            cleanup_on_start: options.cleanup_on_start,
            lock_dir,
            identity: SessionIdentity::current(),
        })
    }

    /// Path of the lock file for a hook
    pub fn lock_path(&self, hook_name: &str) -> PathBuf {
        self.lock_dir
            .join(format!("{}.lock", sanitize_hook_name(hook_name)))
    }

    pub fn session_id(&self) -> &str {
        &self.identity.session_id
    }
}

/// Per-user default lock directory
fn default_lock_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(".spruce").join("locks"),
        None => std::env::temp_dir().join("spruce").join("locks"),
    }
}

/// Replace path separators so hook names cannot escape the lock dir
fn sanitize_hook_name(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

#[cfg(unix)]
fn restrict_to_owner(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn restrict_to_owner(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
