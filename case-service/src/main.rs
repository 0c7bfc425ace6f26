use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use case_service::{
    build_router,
    config::{CaseConfig, Environment},
    services::{
        AuditService, AuthService, CsrfGuard, DisabledEmailService, EmailProvider, FileStore,
        InMemoryThrottle, JwtService, LoginThrottle, RetentionService, SessionPolicy,
        SmtpEmailService,
    },
    store::{spawn_flush_worker, Store},
    AppState,
};
use service_core::error::AppError;
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use service_core::observability::logging::init_tracing;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid or insecure.
    let config = CaseConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.environment == Environment::Prod,
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "starting case service"
    );

    // Open the embedded store (runs crash recovery) and start the
    // debounced flusher.
    let store = Store::open(&config.store.db_path)
        .map_err(|e| AppError::StorageError(anyhow::Error::new(e)))?;
    let flush_worker = spawn_flush_worker(
        store.clone(),
        Duration::from_millis(config.store.flush_debounce_ms),
    );
    tracing::info!(path = %config.store.db_path.display(), "store opened");

    let files = FileStore::new(&config.store.uploads_dir)?;

    let jwt = JwtService::new(&config.jwt);

    let email: Arc<dyn EmailProvider> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpEmailService::new(smtp)?),
        None => {
            tracing::warn!(
                "SMTP not configured; registration and verification emails are disabled"
            );
            Arc::new(DisabledEmailService)
        }
    };

    let audit = AuditService::new(store.clone());
    let throttle: Arc<dyn LoginThrottle> = Arc::new(InMemoryThrottle::new(
        config.security.lockout_threshold,
        config.security.lockout_duration_minutes,
    ));
    let csrf = CsrfGuard::new(config.session.csrf_cookie_name.clone());

    let auth = AuthService::new(
        store.clone(),
        jwt.clone(),
        email.clone(),
        audit.clone(),
        throttle,
        csrf.clone(),
        SessionPolicy {
            admin_emails: config.security.admin_emails.clone(),
            refresh_token_expiry_days: config.session.refresh_token_expiry_days,
            app_base_url: config.app_base_url.clone(),
        },
    );

    // Opportunistic cleanup of sessions that expired while we were down.
    auth.prune_sessions();

    let retention = RetentionService::new(
        store.clone(),
        files.clone(),
        audit.clone(),
        config.retention.global_days,
    );
    let purge_worker = case_service::services::spawn_purge_scheduler(
        retention.clone(),
        config.retention.sweep_interval_hours,
    );

    let login_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.login_attempts,
        config.rate_limit.login_window_seconds,
    );
    let ip_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.global_ip_limit,
        config.rate_limit.global_ip_window_seconds,
    );

    let state = AppState {
        config: config.clone(),
        store: store.clone(),
        jwt,
        email,
        files,
        auth,
        audit,
        retention,
        csrf,
        login_rate_limiter,
        ip_rate_limiter,
    };

    let app = build_router(state).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // The background workers are done; what matters now is that the last
    // mutations hit the disk. Losing them silently is not an option.
    flush_worker.abort();
    purge_worker.abort();
    match store.flush_if_dirty() {
        Ok(_) => {
            tracing::info!("service shutdown complete");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "final flush failed; unflushed data would be lost");
            std::process::exit(1);
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        },
    }
}
