use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{middleware::AuthUser, models::SanitizedUser, AppState};

/// Authenticated "who am I" probe.
pub async fn me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<SanitizedUser>, AppError> {
    let user_id = claims.user_id().map_err(AppError::InternalError)?;

    let user = state
        .store
        .user_by_id(user_id)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    Ok(Json(user.sanitized()))
}
