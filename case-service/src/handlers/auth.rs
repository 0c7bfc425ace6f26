//! Authentication endpoints: registration, verification, login, refresh,
//! logout.
//!
//! Cookie rules: the refresh secret lives in an HTTP-only cookie scoped to
//! the auth endpoints; the CSRF token lives in a script-readable cookie on
//! the root path. Refresh and logout failure paths clear both so a client
//! can always restart authentication cleanly.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service_core::error::AppError;
use service_core::middleware::request_meta::RequestMeta;

use crate::{
    config::{CaseConfig, SameSitePolicy},
    dtos::auth::{
        AuthConfigResponse, AuthResponse, LoginRequest, MessageResponse, RegisterRequest,
        RegisterResponse, ResendVerificationRequest, VerifyQuery,
    },
    services::{AuthenticatedSession, ServiceError},
    utils::ValidatedJson,
    AppState,
};

const REFRESH_COOKIE_PATH: &str = "/api/auth";

fn same_site(policy: SameSitePolicy) -> SameSite {
    match policy {
        SameSitePolicy::Strict => SameSite::Strict,
        SameSitePolicy::Lax => SameSite::Lax,
        SameSitePolicy::None => SameSite::None,
    }
}

/// Attach both auth cookies for a fresh session.
fn with_session_cookies(
    jar: CookieJar,
    config: &CaseConfig,
    session: &AuthenticatedSession,
) -> CookieJar {
    let session_cfg = &config.session;
    let max_age = time::Duration::days(session_cfg.refresh_token_expiry_days);

    let refresh = Cookie::build((
        session_cfg.refresh_cookie_name.clone(),
        session.refresh_secret.clone(),
    ))
    .path(REFRESH_COOKIE_PATH)
    .http_only(true)
    .secure(session_cfg.cookie_secure)
    .same_site(same_site(session_cfg.cookie_same_site))
    .max_age(max_age)
    .build();

    // Deliberately NOT HttpOnly: client script must read this one back
    // into the request header for the double-submit check.
    let csrf = Cookie::build((
        session_cfg.csrf_cookie_name.clone(),
        session.csrf_token.clone(),
    ))
    .path("/")
    .http_only(false)
    .secure(session_cfg.cookie_secure)
    .same_site(same_site(session_cfg.cookie_same_site))
    .max_age(max_age)
    .build();

    jar.add(refresh).add(csrf)
}

/// Expire both auth cookies.
fn with_cleared_cookies(jar: CookieJar, config: &CaseConfig) -> CookieJar {
    let session_cfg = &config.session;

    let refresh = Cookie::build((session_cfg.refresh_cookie_name.clone(), ""))
        .path(REFRESH_COOKIE_PATH)
        .build();
    let csrf = Cookie::build((session_cfg.csrf_cookie_name.clone(), ""))
        .path("/")
        .build();

    jar.remove(refresh).remove(csrf)
}

/// Tells the frontend whether registration (which depends on verification
/// email) is available.
pub async fn auth_config(State(state): State<AppState>) -> Json<AuthConfigResponse> {
    Json(AuthConfigResponse {
        email_verification_enabled: state.email.is_enabled(),
    })
}

pub async fn register(
    State(state): State<AppState>,
    meta: RequestMeta,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = state
        .auth
        .register(&req.email, &req.password, req.account_type, &meta)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id,
            message: "Registration created. Verify your email to activate the account."
                .to_string(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    meta: RequestMeta,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.auth.login(&req.email, &req.password, &meta).await?;
    let body = AuthResponse::from(&session);
    let jar = with_session_cookies(jar, &state.config, &session);
    Ok((jar, Json(body)))
}

/// Email verification doubles as an authentication event: on success the
/// account is logged in with a fresh session, like the original flow.
pub async fn verify_email(
    State(state): State<AppState>,
    meta: RequestMeta,
    jar: CookieJar,
    Query(query): Query<VerifyQuery>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.auth.verify_email(&query.token, &meta)?;
    let body = AuthResponse::from(&session);
    let jar = with_session_cookies(jar, &state.config, &session);
    Ok((jar, Json(body)))
}

pub async fn resend_verification(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResendVerificationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let sent = state.auth.resend_verification(&req.email).await?;
    let message = if sent {
        "A new verification email is on its way."
    } else {
        "This email is already verified."
    };
    Ok(Json(MessageResponse::new(message)))
}

/// Rotate the refresh session. Any session failure clears both cookies so
/// the client can restart authentication from scratch; the CSRF check has
/// already run in middleware before this handler.
pub async fn refresh(
    State(state): State<AppState>,
    meta: RequestMeta,
    jar: CookieJar,
) -> Response {
    let secret = jar
        .get(&state.config.session.refresh_cookie_name)
        .map(|cookie| cookie.value().to_string());

    let result = match secret {
        Some(secret) => state.auth.refresh(&secret, &meta),
        None => Err(ServiceError::SessionInvalid),
    };

    match result {
        Ok(session) => {
            let body = AuthResponse::from(&session);
            let jar = with_session_cookies(jar, &state.config, &session);
            (jar, Json(body)).into_response()
        }
        Err(err @ ServiceError::SessionInvalid) => {
            let jar = with_cleared_cookies(jar, &state.config);
            (jar, AppError::from(err)).into_response()
        }
        Err(err) => AppError::from(err).into_response(),
    }
}

/// Revoke the presented session, if any, and clear cookies regardless.
pub async fn logout(
    State(state): State<AppState>,
    meta: RequestMeta,
    jar: CookieJar,
) -> impl IntoResponse {
    let secret = jar
        .get(&state.config.session.refresh_cookie_name)
        .map(|cookie| cookie.value().to_string());

    state.auth.logout(secret.as_deref(), &meta);

    let jar = with_cleared_cookies(jar, &state.config);
    (jar, Json(MessageResponse::new("Logged out")))
}
