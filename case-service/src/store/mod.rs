//! Embedded relational store.
//!
//! All tables live in memory behind one lock; durability comes from
//! serializing the whole store to a single on-disk file (see [`persist`])
//! on a debounced schedule (see [`flush`]). This trades a durability
//! window no longer than the debounce interval for write throughput; the
//! store is not a durability-critical ledger. A deployment needing
//! per-mutation durability would replace the debounce with a synchronous
//! write-ahead log replayed at startup.
//!
//! The handle is an owned resource injected into components by
//! constructor, never ambient global state, so every test can run against
//! its own isolated file.

mod flush;
mod persist;

pub use flush::spawn_flush_worker;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::models::{
    Case, CaseUpdate, LoginAudit, RefreshSession, RetentionPolicy, SecurityEvent, User,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Store file is corrupt: {0}")]
    Corrupt(String),

    #[error("Email already registered")]
    DuplicateEmail,
}

/// All relational tables. Mutated only through [`Store`] methods.
#[derive(Debug, Default)]
pub struct Tables {
    pub users: HashMap<Uuid, User>,
    pub refresh_sessions: HashMap<Uuid, RefreshSession>,
    pub login_audit: Vec<LoginAudit>,
    pub security_events: Vec<SecurityEvent>,
    pub retention_policies: HashMap<Uuid, RetentionPolicy>,
    pub cases: HashMap<Uuid, Case>,
    pub case_updates: Vec<CaseUpdate>,
}

struct StoreInner {
    path: PathBuf,
    tables: RwLock<Tables>,
    dirty: AtomicBool,
    flush_signal: Notify,
}

/// Handle to the embedded store; cheap to clone, single shared state.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

/// Why a rotation attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateRefusal {
    NotFound,
    Revoked,
    Expired,
}

impl Store {
    /// Open the store file at `path`, running crash recovery first
    /// (promote a backup when the live file is missing, discard any stale
    /// temporary file).
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        persist::recover(&path)?;
        let tables = persist::load(&path)?;
        Ok(Self {
            inner: Arc::new(StoreInner {
                path,
                tables: RwLock::new(tables),
                dirty: AtomicBool::new(false),
                flush_signal: Notify::new(),
            }),
        })
    }

    /// In-memory store with no backing file; unit tests only need this
    /// when persistence itself is not under test.
    #[cfg(test)]
    pub fn ephemeral() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                path: PathBuf::from("/nonexistent/ephemeral.json"),
                tables: RwLock::new(Tables::default()),
                dirty: AtomicBool::new(false),
                flush_signal: Notify::new(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Run a read-only query against the tables.
    pub fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        let guard = self
            .inner
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        let result = {
            let mut guard = self
                .inner
                .tables
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        };
        self.inner.dirty.store(true, Ordering::SeqCst);
        self.inner.flush_signal.notify_one();
        result
    }

    /// Whether unflushed mutations are pending.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    pub(crate) async fn flush_requested(&self) {
        self.inner.flush_signal.notified().await;
    }

    /// Serialize and write the store if any mutation happened since the
    /// last flush. On failure the dirty flag is restored so the next
    /// debounce cycle retries. Returns whether a write happened.
    pub fn flush_if_dirty(&self) -> Result<bool, StoreError> {
        if !self.inner.dirty.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        let bytes = self.read(persist::serialize)?;
        if let Err(e) = persist::write_atomic(&self.inner.path, &bytes) {
            self.inner.dirty.store(true, Ordering::SeqCst);
            return Err(e);
        }
        Ok(true)
    }

    // ---- users ----

    /// Insert a user; fails when the normalized email is already taken.
    pub fn insert_user(&self, user: User) -> Result<(), StoreError> {
        self.mutate(|t| {
            if t.users.values().any(|u| u.email == user.email) {
                return Err(StoreError::DuplicateEmail);
            }
            t.users.insert(user.id, user);
            Ok(())
        })
    }

    pub fn user_by_id(&self, id: Uuid) -> Option<User> {
        self.read(|t| t.users.get(&id).cloned())
    }

    pub fn user_by_email(&self, normalized_email: &str) -> Option<User> {
        self.read(|t| {
            t.users
                .values()
                .find(|u| u.email == normalized_email)
                .cloned()
        })
    }

    pub fn user_by_verification_token(&self, token: &str) -> Option<User> {
        self.read(|t| {
            t.users
                .values()
                .find(|u| u.verification_token.as_deref() == Some(token))
                .cloned()
        })
    }

    /// Apply an in-place edit to a user; returns the updated row.
    pub fn update_user(&self, id: Uuid, f: impl FnOnce(&mut User)) -> Option<User> {
        self.mutate(|t| {
            let user = t.users.get_mut(&id)?;
            f(user);
            Some(user.clone())
        })
    }

    // ---- refresh sessions ----

    pub fn insert_refresh_session(&self, session: RefreshSession) {
        self.mutate(|t| {
            t.refresh_sessions.insert(session.id, session);
        });
    }

    pub fn session_by_secret_hash(&self, hash: &str) -> Option<RefreshSession> {
        self.read(|t| {
            t.refresh_sessions
                .values()
                .find(|s| s.secret_hash == hash)
                .cloned()
        })
    }

    pub fn session_by_id(&self, id: Uuid) -> Option<RefreshSession> {
        self.read(|t| t.refresh_sessions.get(&id).cloned())
    }

    /// Mark a session revoked. Idempotent; the first revocation wins.
    pub fn revoke_session(&self, id: Uuid, now: DateTime<Utc>) -> bool {
        self.mutate(|t| match t.refresh_sessions.get_mut(&id) {
            Some(s) => {
                if s.revoked_at.is_none() {
                    s.revoked_at = Some(now);
                }
                true
            }
            None => false,
        })
    }

    /// Atomically rotate `old_id` into `new_session`: the old session is
    /// re-validated, revoked and pointed at its replacement, and the new
    /// session inserted, all under one write lock. A concurrent replay of
    /// the old secret observes either an active session (before) or a
    /// revoked one (after) - never an intermediate state.
    pub fn rotate_session(
        &self,
        old_id: Uuid,
        new_session: RefreshSession,
        now: DateTime<Utc>,
    ) -> Result<(), RotateRefusal> {
        self.mutate(|t| {
            let old = t
                .refresh_sessions
                .get_mut(&old_id)
                .ok_or(RotateRefusal::NotFound)?;
            if old.is_revoked() {
                return Err(RotateRefusal::Revoked);
            }
            if old.is_expired(now) {
                // Expiry detection is a revocation trigger in its own right.
                old.revoked_at = Some(now);
                return Err(RotateRefusal::Expired);
            }
            old.revoked_at = Some(now);
            old.replaced_by = Some(new_session.id);
            t.refresh_sessions.insert(new_session.id, new_session);
            Ok(())
        })
    }

    /// Physically delete sessions past their expiry, revoked or not. Also
    /// walks rotation chains; a cycle would mean a corrupted chain and is
    /// reported as a bug signal.
    pub fn prune_refresh_sessions(&self, now: DateTime<Utc>) -> usize {
        self.mutate(|t| {
            let before = t.refresh_sessions.len();
            // Revoked-but-unexpired rows are kept: they are the rotation
            // chain's record until natural expiry.
            t.refresh_sessions.retain(|_, s| !s.is_expired(now));

            // Chain sanity: replaced_by pointers must form an acyclic chain.
            for start in t.refresh_sessions.values() {
                let mut seen = std::collections::HashSet::new();
                let mut cursor = Some(start.id);
                while let Some(id) = cursor {
                    if !seen.insert(id) {
                        tracing::error!(
                            session_id = %start.id,
                            "rotation chain cycle detected; store is inconsistent"
                        );
                        break;
                    }
                    cursor = t
                        .refresh_sessions
                        .get(&id)
                        .and_then(|s| s.replaced_by);
                }
            }
            before - t.refresh_sessions.len()
        })
    }

    // ---- audit ----

    pub fn append_login_audit(&self, row: LoginAudit) {
        self.mutate(|t| t.login_audit.push(row));
    }

    pub fn append_security_event(&self, event: SecurityEvent) {
        self.mutate(|t| t.security_events.push(event));
    }

    // ---- retention policies ----

    /// Insert or replace the single policy row for an owner.
    pub fn upsert_retention_policy(&self, policy: RetentionPolicy) {
        self.mutate(|t| {
            t.retention_policies.insert(policy.owner_id, policy);
        });
    }

    pub fn retention_policy_for(&self, owner_id: Uuid) -> Option<RetentionPolicy> {
        self.read(|t| t.retention_policies.get(&owner_id).cloned())
    }

    // ---- cases ----

    pub fn insert_case(&self, case: Case) {
        self.mutate(|t| {
            t.cases.insert(case.id, case);
        });
    }

    pub fn case_by_id(&self, id: Uuid) -> Option<Case> {
        self.read(|t| t.cases.get(&id).cloned())
    }

    pub fn cases_for_owner(&self, owner_id: Uuid) -> Vec<Case> {
        self.read(|t| {
            let mut cases: Vec<Case> = t
                .cases
                .values()
                .filter(|c| c.owner_id == owner_id)
                .cloned()
                .collect();
            cases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            cases
        })
    }

    pub fn all_cases(&self) -> Vec<Case> {
        self.read(|t| {
            let mut cases: Vec<Case> = t.cases.values().cloned().collect();
            cases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            cases
        })
    }

    pub fn update_case(&self, id: Uuid, f: impl FnOnce(&mut Case)) -> Option<Case> {
        self.mutate(|t| {
            let case = t.cases.get_mut(&id)?;
            f(case);
            case.updated_at = Utc::now();
            Some(case.clone())
        })
    }

    /// Remove a case row and its history. Returns the removed row so the
    /// caller can act on its file references.
    pub fn delete_case(&self, id: Uuid) -> Option<Case> {
        self.mutate(|t| {
            let case = t.cases.remove(&id)?;
            t.case_updates.retain(|u| u.case_id != id);
            Some(case)
        })
    }

    pub fn append_case_update(&self, update: CaseUpdate) {
        self.mutate(|t| t.case_updates.push(update));
    }

    pub fn updates_for_case(&self, case_id: Uuid) -> Vec<CaseUpdate> {
        self.read(|t| {
            let mut updates: Vec<CaseUpdate> = t
                .case_updates
                .iter()
                .filter(|u| u.case_id == case_id)
                .cloned()
                .collect();
            updates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            updates
        })
    }
}
