//! Per-tenant data-retention policy for enterprise owners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Day counts an `auto` policy may choose from. Arbitrary values are
/// rejected at the API boundary and again at construction.
pub const RETENTION_DAY_CHOICES: [u32; 3] = [30, 60, 90];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionMode {
    /// Records are only deleted by explicit operator action.
    Manual,
    /// The purge sweep deletes closed cases older than `days`.
    Auto,
}

/// One row per enterprise owner; upserted, never multiplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub owner_id: Uuid,
    pub mode: RetentionMode,
    pub days: Option<u32>,
    pub updated_by: Uuid,
    pub updated_at: DateTime<Utc>,
}

impl RetentionPolicy {
    /// Build a policy, enforcing the day-count whitelist for `auto` mode.
    pub fn new(
        owner_id: Uuid,
        mode: RetentionMode,
        days: Option<u32>,
        updated_by: Uuid,
    ) -> Result<Self, InvalidRetentionDays> {
        let days = match mode {
            RetentionMode::Auto => match days {
                Some(d) if RETENTION_DAY_CHOICES.contains(&d) => Some(d),
                _ => return Err(InvalidRetentionDays(days)),
            },
            RetentionMode::Manual => None,
        };
        Ok(Self {
            owner_id,
            mode,
            days,
            updated_by,
            updated_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRetentionDays(pub Option<u32>);

impl std::fmt::Display for InvalidRetentionDays {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(d) => write!(f, "retention days must be one of 30/60/90, got {}", d),
            None => write!(f, "retention days are required for auto mode"),
        }
    }
}

impl std::error::Error for InvalidRetentionDays {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_mode_requires_whitelisted_days() {
        let owner = Uuid::new_v4();
        for d in RETENTION_DAY_CHOICES {
            assert!(RetentionPolicy::new(owner, RetentionMode::Auto, Some(d), owner).is_ok());
        }
        assert!(RetentionPolicy::new(owner, RetentionMode::Auto, Some(45), owner).is_err());
        assert!(RetentionPolicy::new(owner, RetentionMode::Auto, None, owner).is_err());
    }

    #[test]
    fn manual_mode_discards_days() {
        let owner = Uuid::new_v4();
        let policy =
            RetentionPolicy::new(owner, RetentionMode::Manual, Some(30), owner).unwrap();
        assert_eq!(policy.days, None);
    }
}
