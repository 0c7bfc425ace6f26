//! User model - identity records for the intake service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account roles. Plain `user` accounts authenticate through the separate
/// case-lookup flow, not the password login endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Enterprise,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Enterprise => "enterprise",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "enterprise" => Ok(Role::Enterprise),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// User entity. Emails are stored normalized (trimmed, lowercased); the
/// store enforces uniqueness on the normalized form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub email_verified: bool,
    pub verification_token: Option<String>,
    pub verification_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, password_hash: String, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            role,
            email_verified: false,
            verification_token: None,
            verification_sent_at: None,
            created_at: Utc::now(),
        }
    }

    /// Convert to a response shape without sensitive fields.
    pub fn sanitized(&self) -> SanitizedUser {
        SanitizedUser {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            email_verified: self.email_verified,
            created_at: self.created_at,
        }
    }
}

/// User shape for API responses (no hash, no verification token).
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Normalize an email for lookup and storage.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_email("  User@Example.COM "), "user@example.com");
    }

    #[test]
    fn sanitized_drops_password_hash() {
        let user = User::new(
            "a@b.com".to_string(),
            "$argon2id$fake".to_string(),
            Role::Enterprise,
        );
        let sanitized = user.sanitized();
        assert_eq!(sanitized.email, "a@b.com");
        assert_eq!(sanitized.role, Role::Enterprise);
        // Compile-time guarantee: SanitizedUser has no hash field.
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::User, Role::Enterprise, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }
}
