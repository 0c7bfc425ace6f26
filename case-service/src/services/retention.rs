//! Scheduled data-retention purge.
//!
//! The sweep permanently deletes closed cases once they outlive their
//! retention window: a global window for ordinary cases, and the owner's
//! per-tenant policy for enterprise-owned cases (only in `auto` mode).
//! Stored files go first, the database row second - a crash between the
//! two leaves at worst an orphaned file, which a later sweep of the
//! uploads directory can collect, never a row pointing at deleted data
//! that looks alive. The sweep re-selects by age on every run, so a
//! partially completed pass simply finishes on the next interval.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::{
    Case, RetentionMode, RetentionPolicy, Role, SecurityEvent, SecurityEventType,
};
use crate::store::Store;

use super::{AuditService, FileStore, ServiceError};

/// Outcome of one sweep, for operator logs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub candidates: usize,
    pub purged: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct RetentionService {
    store: Store,
    files: FileStore,
    audit: AuditService,
    global_retention_days: u32,
}

impl RetentionService {
    pub fn new(
        store: Store,
        files: FileStore,
        audit: AuditService,
        global_retention_days: u32,
    ) -> Self {
        Self {
            store,
            files,
            audit,
            global_retention_days,
        }
    }

    /// Upsert the retention policy for an enterprise owner. Day counts
    /// outside the whitelist never reach the store.
    pub fn set_policy(
        &self,
        owner_id: Uuid,
        mode: RetentionMode,
        days: Option<u32>,
        actor_id: Uuid,
    ) -> Result<RetentionPolicy, ServiceError> {
        let policy = RetentionPolicy::new(owner_id, mode, days, actor_id)?;
        self.store.upsert_retention_policy(policy.clone());

        self.audit.record_event(SecurityEvent::new(
            SecurityEventType::RetentionPolicyChanged,
            Some(actor_id),
            Some("retention_policy"),
            Some(owner_id.to_string()),
            true,
            format!("mode={:?} days={:?}", policy.mode, policy.days),
            "-".to_string(),
            None,
            None,
        ));

        Ok(policy)
    }

    pub fn policy_for(&self, owner_id: Uuid) -> Option<RetentionPolicy> {
        self.store.retention_policy_for(owner_id)
    }

    /// One purge pass. Deletion failures are logged per case and never
    /// stop the sweep or the scheduler.
    pub fn sweep(&self) -> SweepStats {
        let now = Utc::now();
        let candidates = self.select_purgeable(now);

        let mut stats = SweepStats {
            candidates: candidates.len(),
            ..SweepStats::default()
        };

        for case in candidates {
            match self.purge_case(&case) {
                Ok(()) => stats.purged += 1,
                Err(e) => {
                    stats.failed += 1;
                    tracing::error!(case_id = %case.id, error = %e, "failed to purge case");
                }
            }
        }

        if stats.candidates > 0 {
            tracing::info!(
                candidates = stats.candidates,
                purged = stats.purged,
                failed = stats.failed,
                "retention sweep finished"
            );
        }
        stats
    }

    /// Closed cases whose age exceeds the retention window that applies
    /// to their owner.
    fn select_purgeable(&self, now: DateTime<Utc>) -> Vec<Case> {
        let global_days = i64::from(self.global_retention_days);

        self.store.read(|t| {
            t.cases
                .values()
                .filter(|case| case.status.is_terminal())
                .filter(|case| {
                    let owner_role = t.users.get(&case.owner_id).map(|u| u.role);
                    let window_days = match owner_role {
                        Some(Role::Enterprise) => {
                            match t.retention_policies.get(&case.owner_id) {
                                Some(p) if p.mode == RetentionMode::Auto => {
                                    match p.days {
                                        Some(d) => i64::from(d),
                                        // Auto without days cannot be
                                        // constructed; skip defensively.
                                        None => return false,
                                    }
                                }
                                // Manual or absent policy: tenant data is
                                // never auto-purged.
                                _ => return false,
                            }
                        }
                        _ => global_days,
                    };
                    case.updated_at + Duration::days(window_days) <= now
                })
                .cloned()
                .collect()
        })
    }

    /// Files first, row second.
    fn purge_case(&self, case: &Case) -> Result<(), ServiceError> {
        for stored_name in case.stored_files() {
            self.files.remove(stored_name).map_err(|e| {
                ServiceError::Internal(anyhow::anyhow!(
                    "removing stored file {stored_name}: {e}"
                ))
            })?;
        }

        self.store.delete_case(case.id);

        self.audit.record_event(SecurityEvent::new(
            SecurityEventType::CasePurged,
            None,
            Some("case"),
            Some(case.id.to_string()),
            true,
            format!(
                "purged closed case last updated {} with {} stored file(s)",
                case.updated_at,
                case.stored_files().len()
            ),
            "-".to_string(),
            None,
            None,
        ));

        Ok(())
    }
}

/// Run the sweep on a fixed interval until the process exits. A failing
/// pass is logged by `sweep` itself; the scheduler never dies.
pub fn spawn_purge_scheduler(
    retention: RetentionService,
    interval_hours: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let period = StdDuration::from_secs(interval_hours.max(1) * 3600);
        let mut interval = tokio::time::interval(period);
        // The immediate first tick would race startup recovery; skip it.
        interval.tick().await;

        loop {
            interval.tick().await;
            let sweeper = retention.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || sweeper.sweep()).await {
                tracing::error!(error = %e, "purge sweep task panicked");
            }
        }
    })
}
