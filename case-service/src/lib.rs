pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::{ip_rate_limit_middleware, IpRateLimiter},
    request_meta::request_id_middleware,
    security_headers::security_headers_middleware,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Uploads are capped at the original service's limit.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: config::CaseConfig,
    pub store: store::Store,
    pub jwt: services::JwtService,
    pub email: Arc<dyn services::EmailProvider>,
    pub files: services::FileStore,
    pub auth: services::AuthService,
    pub audit: services::AuditService,
    pub retention: services::RetentionService,
    pub csrf: services::CsrfGuard,
    pub login_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    // Login gets its own, tighter IP limiter on top of the global one.
    let login_limiter = state.login_rate_limiter.clone();
    let login_route = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(login_limiter, ip_rate_limit_middleware));

    // Cookie-authenticated session endpoints: the CSRF double-submit
    // check runs before anything else.
    let session_routes = Router::new()
        .route("/api/auth/refresh", post(handlers::auth::refresh))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::csrf_middleware,
        ));

    // Bearer-authenticated business surface. Layer order is outermost
    // last: CSRF (state-changing methods only), then token validation.
    let protected_routes = Router::new()
        .route("/api/me", get(handlers::user::me))
        .route(
            "/api/cases",
            get(handlers::cases::list_cases).post(handlers::cases::create_case),
        )
        .route("/api/cases/:id", get(handlers::cases::get_case))
        .route(
            "/api/cases/:id/updates",
            get(handlers::cases::list_case_updates).post(handlers::cases::create_case_update),
        )
        .route(
            "/api/cases/:id/attachments",
            post(handlers::cases::upload_attachments),
        )
        .route(
            "/api/cases/:id/files/:stored_name",
            get(handlers::cases::download_attachment),
        )
        .route(
            "/api/retention-policy",
            get(handlers::retention::get_policy).put(handlers::retention::put_policy),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::csrf_middleware,
        ));

    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .security
                .allowed_origins
                .iter()
                .filter_map(|origin| {
                    origin
                        .parse::<axum::http::HeaderValue>()
                        .map_err(|e| {
                            tracing::error!(origin = %origin, error = %e, "invalid CORS origin");
                            e
                        })
                        .ok()
                })
                .collect::<Vec<axum::http::HeaderValue>>(),
        )
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::HeaderName::from_static("x-csrf-token"),
            axum::http::header::HeaderName::from_static("x-request-id"),
        ])
        // Cookies carry the refresh secret and CSRF token.
        .allow_credentials(true);

    let ip_limiter = state.ip_rate_limiter.clone();

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/auth/config", get(handlers::auth::auth_config))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/verify", get(handlers::auth::verify_email))
        .route(
            "/api/auth/resend-verification",
            post(handlers::auth::resend_verification),
        )
        .merge(login_route)
        .merge(session_routes)
        .merge(protected_routes)
        .with_state(state)
        // Global IP rate limiting
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        // Request span for every log line below
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        // Correlation id first so the trace span can pick it up
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors);

    Ok(app)
}

/// Service health probe; reports whether the store has a flush pending.
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "store": {
                "pending_flush": state.store.is_dirty()
            }
        }
    }))
}
