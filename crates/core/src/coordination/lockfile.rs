// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk lock record codec
//!
//! A lock is a small JSON record at `{lock_dir}/{hook}.lock`. Creation must
//! be exclusive: the record is written to a uniquely-suffixed temp sibling
//! and hard-linked onto the target, which fails if the target already
//! exists. A plain rename would silently replace a live lock. Heartbeat
//! rewrites go through a temp sibling plus atomic rename, and only after
//! re-reading the target to confirm this session still owns it.

use crate::coordination::config::SessionIdentity;
use crate::error::{LockError, RecordError};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// Bumped on incompatible record changes
pub const SCHEMA_VERSION: &str = "1";

/// Contents of a lock file
///
/// Field names are part of the on-disk contract so other sessions and
/// debug tooling can inspect locks. Timestamps are seconds since the
/// Unix epoch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LockRecord {
    pub session_id: String,
    pub hostname: String,
    pub pid: u32,
    pub hook_name: String,
    pub acquired_at: f64,
    /// Absent in records written by old or foreign tooling
    #[serde(default)]
    pub last_heartbeat: Option<f64>,
    pub schema_version: String,
}

impl LockRecord {
    /// Fresh record stamped with this session's identity
    pub fn new(identity: &SessionIdentity, hook_name: &str, now: f64) -> Self {
        Self {
            session_id: identity.session_id.clone(),
            hostname: identity.hostname.clone(),
            pid: identity.pid,
            hook_name: hook_name.to_string(),
            acquired_at: now,
            last_heartbeat: Some(now),
            schema_version: SCHEMA_VERSION.to_string(),
        }
    }

    /// Timestamp to judge staleness by, falling back to `acquired_at`
    pub fn freshness(&self) -> f64 {
        self.last_heartbeat.unwrap_or(self.acquired_at)
    }

    pub fn is_owned_by(&self, session_id: &str) -> bool {
        self.session_id == session_id
    }
}

/// Result of a heartbeat rewrite attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// `last_heartbeat` was rewritten in place
    Refreshed,
    /// The lock file no longer exists
    Missing,
    /// Another session's record is at the path; nothing was written
    OwnershipChanged,
}

/// Create the lock file, failing if it already exists
///
/// Two-step: write the record to a temp sibling (owner-only permissions),
/// then link it onto the target. The temp file is unlinked on every
/// outcome; the hard link keeps the target alive on success.
pub fn write_exclusive(path: &Path, record: &LockRecord) -> Result<(), LockError> {
    let temp = temp_sibling(path);
    write_record(&temp, record)?;

    match std::fs::hard_link(&temp, path) {
        Ok(()) => {
            let _ = std::fs::remove_file(&temp);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            let _ = std::fs::remove_file(&temp);
            Err(LockError::AlreadyHeld {
                hook: record.hook_name.clone(),
            })
        }
        Err(e) => {
            let _ = std::fs::remove_file(&temp);
            Err(LockError::Io(e))
        }
    }
}

/// Read and parse the record at `path`
pub fn read(path: &Path) -> Result<LockRecord, RecordError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(RecordError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(RecordError::Io(e)),
    };

    serde_json::from_str(&contents).map_err(|source| RecordError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Rewrite `last_heartbeat` if this session still owns the lock
///
/// The target is re-read first; a foreign `session_id` aborts without
/// writing. The rewrite itself is temp-then-rename.
pub fn refresh_heartbeat(
    path: &Path,
    session_id: &str,
    now: f64,
) -> Result<RefreshOutcome, RecordError> {
    let mut record = match read(path) {
        Ok(record) => record,
        Err(RecordError::NotFound(_)) => return Ok(RefreshOutcome::Missing),
        Err(e) => return Err(e),
    };

    if !record.is_owned_by(session_id) {
        return Ok(RefreshOutcome::OwnershipChanged);
    }

    record.last_heartbeat = Some(now);
    rewrite_atomic(path, &record)?;
    Ok(RefreshOutcome::Refreshed)
}

/// Remove the lock file if this session owns it
///
/// Returns whether a file was removed. A foreign record is left alone.
pub fn remove_if_owned(path: &Path, session_id: &str) -> Result<bool, RecordError> {
    let record = match read(path) {
        Ok(record) => record,
        Err(RecordError::NotFound(_)) => return Ok(false),
        Err(e) => return Err(e),
    };

    if !record.is_owned_by(session_id) {
        return Ok(false);
    }

    std::fs::remove_file(path).map_err(RecordError::Io)?;
    Ok(true)
}

/// Atomically replace the record at `path`
fn rewrite_atomic(path: &Path, record: &LockRecord) -> Result<(), RecordError> {
    let temp = temp_sibling(path);
    write_record(&temp, record).map_err(|e| {
        let _ = std::fs::remove_file(&temp);
        RecordError::Io(e)
    })?;

    std::fs::rename(&temp, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp);
        RecordError::Io(e)
    })
}

/// Serialize to `path` with owner-only permissions
fn write_record(path: &Path, record: &LockRecord) -> io::Result<()> {
    let json = serde_json::to_string_pretty(record)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, json)?;
    restrict_to_owner(path)
}

/// Unique sibling that never matches the `*.lock` glob
fn temp_sibling(path: &Path) -> PathBuf {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    path.with_extension(format!("tmp.{suffix}"))
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[path = "lockfile_tests.rs"]
mod tests;
