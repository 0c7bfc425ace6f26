//! Refresh session model - long-lived rotating login sessions.
//!
//! Only a one-way hash of the refresh secret is ever persisted; the raw
//! secret lives exclusively in the client's HTTP-only cookie. Rotation
//! links the revoked session to its successor through `replaced_by`,
//! forming an append-only chain.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub secret_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    /// Session that superseded this one after a rotation.
    pub replaced_by: Option<Uuid>,
    pub created_ip: String,
    pub user_agent: Option<String>,
}

impl RefreshSession {
    pub fn new(
        user_id: Uuid,
        secret: &str,
        expiry_days: i64,
        created_ip: String,
        user_agent: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            secret_hash: Self::hash_secret(secret),
            expires_at: now + Duration::days(expiry_days),
            created_at: now,
            revoked_at: None,
            replaced_by: None,
            created_ip,
            user_agent,
        }
    }

    /// SHA-256 hash of the raw secret, hex-encoded.
    pub fn hash_secret(secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Usable for a refresh: neither revoked nor expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired(now)
    }
}
