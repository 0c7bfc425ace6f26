//! Append-only audit rows: one per login attempt, plus a generalized
//! security event trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound on free-form event detail; anything longer is truncated at
/// construction so a single noisy caller cannot bloat the store.
pub const EVENT_DETAIL_MAX: usize = 1024;

/// One row per login attempt, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAudit {
    pub id: Uuid,
    pub identity: String,
    pub ip: String,
    pub user_agent: Option<String>,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub attempt_count: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub request_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Security event types recorded alongside login audits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    Registration,
    Login,
    Logout,
    SessionRotated,
    SessionRevoked,
    EmailVerified,
    VerificationResent,
    RetentionPolicyChanged,
    CasePurged,
}

/// Generalized append-only security trail entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: Uuid,
    pub actor_user_id: Option<Uuid>,
    pub event_type: SecurityEventType,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub success: bool,
    pub detail: String,
    pub ip: String,
    pub user_agent: Option<String>,
    pub request_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SecurityEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_type: SecurityEventType,
        actor_user_id: Option<Uuid>,
        resource_type: Option<&str>,
        resource_id: Option<String>,
        success: bool,
        detail: impl Into<String>,
        ip: impl Into<String>,
        user_agent: Option<String>,
        request_id: Option<String>,
    ) -> Self {
        let mut detail: String = detail.into();
        if detail.len() > EVENT_DETAIL_MAX {
            detail.truncate(
                (0..=EVENT_DETAIL_MAX)
                    .rev()
                    .find(|i| detail.is_char_boundary(*i))
                    .unwrap_or(0),
            );
        }
        Self {
            id: Uuid::new_v4(),
            actor_user_id,
            event_type,
            resource_type: resource_type.map(|s| s.to_string()),
            resource_id,
            success,
            detail,
            ip: ip.into(),
            user_agent,
            request_id,
            created_at: Utc::now(),
        }
    }
}
