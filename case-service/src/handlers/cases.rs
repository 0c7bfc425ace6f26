//! Case intake and tracking endpoints.
//!
//! Only the slice the security/persistence core needs is here: intake,
//! listing, admin status updates and attachment storage. Owners see their
//! own cases, admins see everything.

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::cases::{CaseUpdateRequest, CreateCaseRequest},
    middleware::AuthUser,
    models::{Case, CaseStatus, CaseUpdate, Role},
    services::{AccessTokenClaims, ServiceError},
    utils::ValidatedJson,
    AppState,
};

/// Per-case attachment cap.
const MAX_ATTACHMENTS: usize = 5;

fn authorize_case_access(claims: &AccessTokenClaims, case: &Case) -> Result<(), ServiceError> {
    let user_id = claims
        .user_id()
        .map_err(|_| ServiceError::AccessDenied)?;
    if claims.role == Role::Admin || case.owner_id == user_id {
        Ok(())
    } else {
        Err(ServiceError::AccessDenied)
    }
}

pub async fn create_case(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateCaseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = claims.user_id().map_err(AppError::InternalError)?;

    let mut case = Case::new(owner_id, req.detail.trim().to_string());
    case.category = req.category;
    case.full_name = req.full_name;
    case.contact_email = req.contact_email;
    let case_id = case.id;

    state.store.insert_case(case);
    state.store.append_case_update(CaseUpdate::new(
        case_id,
        Some(owner_id),
        "Case submitted by the claimant.".to_string(),
        Some(CaseStatus::Received),
    ));

    let created = state
        .store
        .case_by_id(case_id)
        .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("case vanished after insert")))?;

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_cases(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<Vec<Case>>, AppError> {
    let cases = if claims.role == Role::Admin {
        state.store.all_cases()
    } else {
        let user_id = claims.user_id().map_err(AppError::InternalError)?;
        state.store.cases_for_owner(user_id)
    };
    Ok(Json(cases))
}

pub async fn get_case(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(case_id): Path<Uuid>,
) -> Result<Json<Case>, AppError> {
    let case = state
        .store
        .case_by_id(case_id)
        .ok_or(ServiceError::CaseNotFound)?;
    authorize_case_access(&claims, &case)?;
    Ok(Json(case))
}

pub async fn list_case_updates(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(case_id): Path<Uuid>,
) -> Result<Json<Vec<CaseUpdate>>, AppError> {
    let case = state
        .store
        .case_by_id(case_id)
        .ok_or(ServiceError::CaseNotFound)?;
    authorize_case_access(&claims, &case)?;
    Ok(Json(state.store.updates_for_case(case_id)))
}

/// Admin-only status update; a status change notifies the claimant by
/// email on a best-effort basis.
pub async fn create_case_update(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(case_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CaseUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    if claims.role != Role::Admin {
        return Err(ServiceError::AccessDenied.into());
    }
    let author_id = claims.user_id().map_err(AppError::InternalError)?;

    let case = state
        .store
        .case_by_id(case_id)
        .ok_or(ServiceError::CaseNotFound)?;

    let status_change = req.status.filter(|s| *s != case.status);
    if status_change.is_some() && case.status.is_terminal() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Closed cases cannot change status"
        )));
    }

    let update = CaseUpdate::new(
        case_id,
        Some(author_id),
        req.message.trim().to_string(),
        req.status,
    );
    let created = update.clone();
    state.store.append_case_update(update);

    if let Some(new_status) = status_change {
        state.store.update_case(case_id, |c| c.status = new_status);

        let recipient = case
            .contact_email
            .clone()
            .or_else(|| state.store.user_by_id(case.owner_id).map(|u| u.email));

        if let Some(to) = recipient {
            if let Err(e) = state
                .email
                .send_case_status_email(
                    &to,
                    &case_id.to_string(),
                    new_status.as_str(),
                    Some(&req.message),
                )
                .await
            {
                tracing::warn!(case_id = %case_id, error = %e, "status notification failed");
            }
        }
    }

    Ok((StatusCode::CREATED, Json(created)))
}

/// Store uploaded files and reference them from the case.
pub async fn upload_attachments(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(case_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<Case>, AppError> {
    let case = state
        .store
        .case_by_id(case_id)
        .ok_or(ServiceError::CaseNotFound)?;
    authorize_case_access(&claims, &case)?;

    let mut saved = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Malformed upload: {}", e)))?
    {
        let Some(file_name) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };
        let content_type = field.content_type().map(|s| s.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Upload read failed: {}", e)))?;

        if case.attachments.len() + saved.len() >= MAX_ATTACHMENTS {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "A case can hold at most {} attachments",
                MAX_ATTACHMENTS
            )));
        }

        saved.push(state.files.save(&file_name, content_type, &bytes)?);
    }

    if saved.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "No files in upload"
        )));
    }

    let updated = state
        .store
        .update_case(case_id, |c| c.attachments.extend(saved))
        .ok_or(ServiceError::CaseNotFound)?;

    Ok(Json(updated))
}

/// Stream a stored attachment back, guarded by case ownership and by the
/// case actually referencing the file.
pub async fn download_attachment(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path((case_id, stored_name)): Path<(Uuid, String)>,
) -> Result<Response, AppError> {
    let case = state
        .store
        .case_by_id(case_id)
        .ok_or(ServiceError::CaseNotFound)?;
    authorize_case_access(&claims, &case)?;

    let attachment = case
        .attachments
        .iter()
        .find(|a| a.stored_name == stored_name)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Attachment not found")))?;

    let path = state
        .files
        .path_for(&stored_name)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("File not available")))?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("reading attachment: {}", e)))?;

    let content_type = attachment
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let disposition = format!(
        "attachment; filename=\"{}\"",
        attachment.original_name.replace('"', "")
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(bytes),
    )
        .into_response())
}
