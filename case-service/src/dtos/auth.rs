use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Role, SanitizedUser};
use crate::services::AuthenticatedSession;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    /// Optional account type; only `enterprise` is honored, the admin
    /// role comes exclusively from the allow-list.
    #[serde(default)]
    pub account_type: Option<Role>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResendVerificationRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Body of every successful authentication response. The refresh secret
/// and CSRF token ride in cookies, never in the body.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: SanitizedUser,
}

impl From<&AuthenticatedSession> for AuthResponse {
    fn from(session: &AuthenticatedSession) -> Self {
        Self {
            access_token: session.access_token.clone(),
            token_type: "Bearer".to_string(),
            expires_in: session.expires_in,
            user: session.user.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthConfigResponse {
    pub email_verification_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
