use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::{services::CSRF_HEADER, AppState};

/// Double-submit check for state-changing requests. Safe methods pass
/// through; everything else must present a header matching the CSRF
/// cookie byte-for-byte, and fails before any business logic otherwise.
pub async fn csrf_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if req.method().is_safe() {
        return Ok(next.run(req).await);
    }

    let cookie_value = jar
        .get(state.csrf.cookie_name())
        .map(|cookie| cookie.value());
    let header_value = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok());

    state.csrf.validate(cookie_value, header_value)?;

    Ok(next.run(req).await)
}
