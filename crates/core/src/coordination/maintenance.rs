// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stale-lock sweep over the lock directory
//!
//! Standalone routine used at coordinator startup and on demand. A lock
//! file is removed when its record is unparseable, or when its heartbeat
//! (falling back to acquisition time) is older than `max_age`.

use crate::coordination::lockfile;
use crate::error::RecordError;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Why a lock file was removed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SweepReason {
    /// Heartbeat older than the threshold
    Stale { age: Duration },
    /// Record could not be parsed
    Corrupt,
}

/// One lock file removed by a sweep
#[derive(Clone, Debug)]
pub struct SweepEntry {
    /// Hook name, taken from the file stem
    pub hook: String,
    pub path: PathBuf,
    pub reason: SweepReason,
}

/// Remove stale and corrupt `*.lock` files under `lock_dir`
///
/// `now` is wall-clock seconds since the Unix epoch. A missing directory
/// is an empty sweep. Errors on individual files are logged and skipped;
/// only directory-level errors propagate.
pub fn sweep_stale_locks(
    lock_dir: &Path,
    max_age: Duration,
    now: f64,
) -> io::Result<Vec<SweepEntry>> {
    if !lock_dir.exists() {
        return Ok(Vec::new());
    }

    let mut removed = Vec::new();
    for entry in std::fs::read_dir(lock_dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("lock") {
            continue;
        }

        let hook = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let reason = match lockfile::read(&path) {
            Ok(record) => {
                let age = now - record.freshness();
                if age > max_age.as_secs_f64() {
                    SweepReason::Stale {
                        age: Duration::from_secs_f64(age.max(0.0)),
                    }
                } else {
                    continue;
                }
            }
            Err(RecordError::Corrupt { .. }) => SweepReason::Corrupt,
            // Deleted between listing and read
            Err(RecordError::NotFound(_)) => continue,
            Err(RecordError::Io(e)) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable lock file");
                continue;
            }
        };

        match std::fs::remove_file(&path) {
            Ok(()) => {
                match &reason {
                    SweepReason::Stale { age } => info!(
                        hook = %hook,
                        age_secs = age.as_secs(),
                        "cleaned stale lock file"
                    ),
                    SweepReason::Corrupt => {
                        warn!(hook = %hook, path = %path.display(), "cleaned corrupt lock file");
                    }
                }
                removed.push(SweepEntry { hook, path, reason });
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not remove lock file");
            }
        }
    }

    Ok(removed)
}

#[cfg(test)]
#[path = "maintenance_tests.rs"]
mod tests;
