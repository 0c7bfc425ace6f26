//! Security audit writer.
//!
//! Best-effort by contract: a failed append is logged through tracing and
//! swallowed, so audit logging can never become an outage vector for the
//! operation it observes. Appends into the embedded store are infallible
//! in-memory; durability rides on the store's own flush cycle.

use crate::models::{LoginAudit, SecurityEvent};
use crate::store::Store;

#[derive(Clone)]
pub struct AuditService {
    store: Store,
}

impl AuditService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Record one login attempt, success or failure.
    pub fn record_login_attempt(&self, row: LoginAudit) {
        tracing::debug!(
            identity = %row.identity,
            ip = %row.ip,
            success = row.success,
            reason = row.failure_reason.as_deref().unwrap_or("-"),
            attempts = row.attempt_count,
            "login attempt"
        );
        self.store.append_login_audit(row);
    }

    /// Record a security-relevant event.
    pub fn record_event(&self, event: SecurityEvent) {
        tracing::info!(
            event_type = ?event.event_type,
            actor = ?event.actor_user_id,
            success = event.success,
            detail = %event.detail,
            "security event"
        );
        self.store.append_security_event(event);
    }
}
