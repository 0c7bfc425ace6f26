//! On-disk representation and crash-safe write protocol.
//!
//! The whole store serializes into one JSON document. A flush goes through
//! `<db>.tmp` and `<db>.bak` so that an interruption at any step leaves
//! either the previous or the new file intact on disk, never a torn one:
//!
//! 1. write the snapshot to `<db>.tmp`
//! 2. rename the live file to `<db>.bak` (when one exists)
//! 3. rename `<db>.tmp` into place
//! 4. delete `<db>.bak`
//!
//! If step 3 fails the backup is restored so the live path is never left
//! empty. Startup recovery promotes `<db>.bak` when the live file is
//! missing and discards any stale `<db>.tmp`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{StoreError, Tables};
use crate::models::{
    Case, CaseUpdate, LoginAudit, RefreshSession, RetentionPolicy, SecurityEvent, User,
};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    users: Vec<User>,
    refresh_sessions: Vec<RefreshSession>,
    login_audit: Vec<LoginAudit>,
    security_events: Vec<SecurityEvent>,
    retention_policies: Vec<RetentionPolicy>,
    cases: Vec<Case>,
    case_updates: Vec<CaseUpdate>,
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut p = path.as_os_str().to_owned();
    p.push(".tmp");
    PathBuf::from(p)
}

fn bak_path(path: &Path) -> PathBuf {
    let mut p = path.as_os_str().to_owned();
    p.push(".bak");
    PathBuf::from(p)
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Serialize the tables into the snapshot document.
pub(super) fn serialize(tables: &Tables) -> Result<Vec<u8>, StoreError> {
    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        users: tables.users.values().cloned().collect(),
        refresh_sessions: tables.refresh_sessions.values().cloned().collect(),
        login_audit: tables.login_audit.clone(),
        security_events: tables.security_events.clone(),
        retention_policies: tables.retention_policies.values().cloned().collect(),
        cases: tables.cases.values().cloned().collect(),
        case_updates: tables.case_updates.clone(),
    };
    Ok(serde_json::to_vec(&snapshot)?)
}

/// Crash recovery, run once before the first load.
pub(super) fn recover(path: &Path) -> Result<(), StoreError> {
    let tmp = tmp_path(path);
    let bak = bak_path(path);

    if tmp.exists() {
        // A flush died before its snapshot became live; the data in it was
        // never promoted and is not trustworthy.
        tracing::warn!(path = %tmp.display(), "discarding stale temporary store file");
        fs::remove_file(&tmp).map_err(|e| io_err(&tmp, e))?;
    }

    if !path.exists() && bak.exists() {
        tracing::warn!(
            path = %path.display(),
            "live store file missing; promoting backup"
        );
        fs::rename(&bak, path).map_err(|e| io_err(&bak, e))?;
    }

    Ok(())
}

/// Load the tables from the live file, or start empty when none exists.
pub(super) fn load(path: &Path) -> Result<Tables, StoreError> {
    if !path.exists() {
        return Ok(Tables::default());
    }

    let bytes = fs::read(path).map_err(|e| io_err(path, e))?;
    let snapshot: Snapshot = serde_json::from_slice(&bytes)
        .map_err(|e| StoreError::Corrupt(format!("{}: {}", path.display(), e)))?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(StoreError::Corrupt(format!(
            "unsupported snapshot version {} in {}",
            snapshot.version,
            path.display()
        )));
    }

    Ok(Tables {
        users: snapshot.users.into_iter().map(|u| (u.id, u)).collect(),
        refresh_sessions: snapshot
            .refresh_sessions
            .into_iter()
            .map(|s| (s.id, s))
            .collect(),
        login_audit: snapshot.login_audit,
        security_events: snapshot.security_events,
        retention_policies: snapshot
            .retention_policies
            .into_iter()
            .map(|p| (p.owner_id, p))
            .collect(),
        cases: snapshot.cases.into_iter().map(|c| (c.id, c)).collect(),
        case_updates: snapshot.case_updates,
    })
}

/// Write `bytes` to `path` through the tmp/bak protocol.
pub(super) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = tmp_path(path);
    let bak = bak_path(path);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
    }

    let mut file = fs::File::create(&tmp).map_err(|e| io_err(&tmp, e))?;
    file.write_all(bytes).map_err(|e| io_err(&tmp, e))?;
    file.sync_all().map_err(|e| io_err(&tmp, e))?;
    drop(file);

    let had_live = path.exists();
    if had_live {
        fs::rename(path, &bak).map_err(|e| io_err(path, e))?;
    }

    if let Err(e) = fs::rename(&tmp, path) {
        // The live name must never be left dangling; put the old file back.
        if had_live {
            if let Err(restore_err) = fs::rename(&bak, path) {
                tracing::error!(
                    path = %path.display(),
                    error = %restore_err,
                    "failed to restore backup after flush failure"
                );
            }
        }
        return Err(io_err(&tmp, e));
    }

    if had_live {
        fs::remove_file(&bak).map_err(|e| io_err(&bak, e))?;
    }

    Ok(())
}
