//! Retention-policy endpoints for enterprise tenants.

use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{
    dtos::cases::RetentionPolicyRequest,
    middleware::AuthUser,
    models::{RetentionPolicy, Role},
    services::ServiceError,
    utils::ValidatedJson,
    AppState,
};

/// Current policy for the calling tenant; `null` until one is set
/// (which reads as manual mode).
pub async fn get_policy(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<Option<RetentionPolicy>>, AppError> {
    if claims.role != Role::Enterprise {
        return Err(ServiceError::AccessDenied.into());
    }
    let owner_id = claims.user_id().map_err(AppError::InternalError)?;
    Ok(Json(state.retention.policy_for(owner_id)))
}

/// Upsert the calling tenant's policy. Day counts outside the 30/60/90
/// whitelist are rejected before anything is stored.
pub async fn put_policy(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ValidatedJson(req): ValidatedJson<RetentionPolicyRequest>,
) -> Result<Json<RetentionPolicy>, AppError> {
    if claims.role != Role::Enterprise {
        return Err(ServiceError::AccessDenied.into());
    }
    let owner_id = claims.user_id().map_err(AppError::InternalError)?;

    let policy = state
        .retention
        .set_policy(owner_id, req.mode, req.days, owner_id)?;

    Ok(Json(policy))
}
