use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Error taxonomy shared by every service in the workspace.
///
/// Client-facing variants deliberately carry generic messages; which
/// internal check failed is never leaked through the response body.
/// Operator-only variants (`StorageError`, `InternalError`, `ConfigError`)
/// log their cause and surface a bland envelope.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("Forbidden: {0}")]
    Forbidden(anyhow::Error),

    /// Credential failure. Always rendered as "invalid credentials",
    /// regardless of whether the user exists or the password was wrong.
    #[error("Authentication failed")]
    AuthError,

    /// Refresh cookie missing, unknown, revoked or expired. The handler
    /// that maps this into a response also clears the auth cookies.
    #[error("Session invalid")]
    SessionInvalid,

    /// Double-submit token pair absent or mismatched.
    #[error("Invalid CSRF token")]
    CsrfMismatch,

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    /// Lockout or rate limit hit; carries the message and retry-after
    /// seconds for the `Retry-After` header.
    #[error("Too many requests: {0}")]
    TooManyRequests(String, Option<u64>),

    /// Business-policy refusal with a machine-readable code, e.g.
    /// an unverified email or a role barred from password login.
    #[error("{0}")]
    PolicyDenied(String, &'static str),

    /// A required collaborator is not configured; carries a code so the
    /// client can distinguish "down" from "never set up".
    #[error("{0}")]
    ServiceUnavailable(String, &'static str),

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Storage error: {0}")]
    StorageError(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

/// Uniform JSON error envelope: `{ "error": string, "code"?: string }`.
#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
        }
    }

    pub fn with_code(error: impl Into<String>, code: &str) -> Self {
        Self {
            error: error.into(),
            code: Some(code.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body, retry_after) = match self {
            AppError::ValidationError(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody::new(format!("Validation error: {err}")),
                None,
            ),
            AppError::BadRequest(err) => {
                (StatusCode::BAD_REQUEST, ErrorBody::new(err.to_string()), None)
            }
            AppError::NotFound(err) => {
                (StatusCode::NOT_FOUND, ErrorBody::new(err.to_string()), None)
            }
            AppError::Unauthorized(err) => {
                (StatusCode::UNAUTHORIZED, ErrorBody::new(err.to_string()), None)
            }
            AppError::Forbidden(err) => {
                (StatusCode::FORBIDDEN, ErrorBody::new(err.to_string()), None)
            }
            AppError::AuthError => (
                StatusCode::UNAUTHORIZED,
                ErrorBody::new("Invalid credentials"),
                None,
            ),
            AppError::SessionInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorBody::with_code("Session invalid", "SESSION_INVALID"),
                None,
            ),
            AppError::CsrfMismatch => (
                StatusCode::FORBIDDEN,
                ErrorBody::with_code("Invalid CSRF token", "CSRF_MISMATCH"),
                None,
            ),
            AppError::Conflict(err) => {
                (StatusCode::CONFLICT, ErrorBody::new(err.to_string()), None)
            }
            AppError::TooManyRequests(msg, retry) => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorBody::with_code(msg, "RATE_LIMITED"),
                retry,
            ),
            AppError::PolicyDenied(msg, code) => {
                (StatusCode::FORBIDDEN, ErrorBody::with_code(msg, code), None)
            }
            AppError::ServiceUnavailable(msg, code) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody::with_code(msg, code),
                None,
            ),
            AppError::InvalidToken(_) => (
                StatusCode::UNAUTHORIZED,
                ErrorBody::new("Invalid token"),
                None,
            ),
            AppError::StorageError(err) => {
                tracing::error!(error = %err, "storage error surfaced to request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new("Internal server error"),
                    None,
                )
            }
            AppError::InternalError(err) => {
                tracing::error!(error = %err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new("Internal server error"),
                    None,
                )
            }
            AppError::ConfigError(err) => {
                tracing::error!(error = %err, "configuration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new("Internal server error"),
                    None,
                )
            }
        };

        let mut res = (status, Json(body)).into_response();

        if let Some(retry) = retry_after {
            res.headers_mut()
                .insert(axum::http::header::RETRY_AFTER, retry.into());
        }

        res
    }
}
