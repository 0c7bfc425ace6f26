use service_core::error::AppError;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account temporarily locked")]
    AccountLocked { retry_after_seconds: u64 },

    #[error("Email not verified")]
    EmailNotVerified,

    /// Plain `user` accounts authenticate through the case-lookup flow;
    /// password login is reserved for enterprise and admin accounts.
    #[error("Password login is not available for this account")]
    PasswordLoginDisabled,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("Email delivery is not configured")]
    EmailNotConfigured,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Session invalid")]
    SessionInvalid,

    #[error("Invalid CSRF token")]
    CsrfMismatch,

    #[error("{0}")]
    InvalidRetentionDays(#[from] crate::models::retention_policy::InvalidRetentionDays),

    #[error("User not found")]
    UserNotFound,

    #[error("Case not found")]
    CaseNotFound,

    #[error("Access restricted")]
    AccessDenied,

    #[error("Email error: {0}")]
    EmailError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Store(e) => AppError::StorageError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::InvalidCredentials => AppError::AuthError,
            ServiceError::AccountLocked {
                retry_after_seconds,
            } => AppError::TooManyRequests(
                format!(
                    "Too many failed attempts. Try again in {} seconds.",
                    retry_after_seconds
                ),
                Some(retry_after_seconds),
            ),
            ServiceError::EmailNotVerified => AppError::PolicyDenied(
                "Email not verified".to_string(),
                "EMAIL_NOT_VERIFIED",
            ),
            ServiceError::PasswordLoginDisabled => AppError::PolicyDenied(
                "Password login is not available for this account".to_string(),
                "PASSWORD_LOGIN_DISABLED",
            ),
            ServiceError::EmailAlreadyRegistered => {
                AppError::Conflict(anyhow::anyhow!("Email already registered"))
            }
            ServiceError::EmailNotConfigured => AppError::ServiceUnavailable(
                "Email verification is not configured on this server".to_string(),
                "EMAIL_SERVICE_NOT_CONFIGURED",
            ),
            ServiceError::InvalidToken => {
                AppError::BadRequest(anyhow::anyhow!("Invalid or expired token"))
            }
            ServiceError::SessionInvalid => AppError::SessionInvalid,
            ServiceError::CsrfMismatch => AppError::CsrfMismatch,
            ServiceError::InvalidRetentionDays(e) => {
                AppError::BadRequest(anyhow::Error::new(e))
            }
            ServiceError::UserNotFound => {
                AppError::NotFound(anyhow::anyhow!("User not found"))
            }
            ServiceError::CaseNotFound => {
                AppError::NotFound(anyhow::anyhow!("Case not found"))
            }
            ServiceError::AccessDenied => {
                AppError::Forbidden(anyhow::anyhow!("Access restricted"))
            }
            ServiceError::EmailError(e) => AppError::InternalError(anyhow::anyhow!(e)),
            ServiceError::ValidationError(e) => AppError::BadRequest(anyhow::anyhow!(e)),
        }
    }
}
