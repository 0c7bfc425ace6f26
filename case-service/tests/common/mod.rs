//! Shared setup for router-level integration tests: an isolated store
//! file per test, a recording mock mailer, and cookie helpers.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use tempfile::TempDir;
use tower::util::ServiceExt;

use case_service::{
    build_router,
    config::{
        CaseConfig, Environment, JwtConfig, RateLimitConfig, RetentionConfig, SameSitePolicy,
        SecurityConfig, SessionConfig, StoreConfig,
    },
    models::{normalize_email, Role, User},
    services::{
        AuditService, AuthService, CsrfGuard, FileStore, InMemoryThrottle, JwtService,
        LoginThrottle, MockEmailService, RetentionService, SessionPolicy,
    },
    store::Store,
    AppState,
};
use service_core::middleware::rate_limit::create_ip_rate_limiter;

pub const TEST_PASSWORD: &str = "correct horse battery staple";
pub const TEST_IP: &str = "203.0.113.50";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub email: Arc<MockEmailService>,
    _tmp: TempDir,
}

pub fn test_config(tmp: &TempDir) -> CaseConfig {
    CaseConfig {
        common: service_core::config::Config { port: 0 },
        environment: Environment::Dev,
        service_name: "case-service".to_string(),
        service_version: "test".to_string(),
        log_level: "warn".to_string(),
        app_base_url: "http://localhost:3000".to_string(),
        store: StoreConfig {
            db_path: tmp.path().join("cases.db"),
            uploads_dir: tmp.path().join("uploads"),
            flush_debounce_ms: 50,
        },
        jwt: JwtConfig {
            secret: "integration-test-signing-secret-0123456789".to_string(),
            access_token_expiry_minutes: 15,
        },
        session: SessionConfig {
            refresh_token_expiry_days: 30,
            refresh_cookie_name: "refresh_session".to_string(),
            csrf_cookie_name: "csrf_token".to_string(),
            cookie_secure: false,
            cookie_same_site: SameSitePolicy::Strict,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            admin_emails: vec![],
            lockout_threshold: 8,
            lockout_duration_minutes: 15,
        },
        retention: RetentionConfig {
            global_days: 90,
            sweep_interval_hours: 6,
        },
        smtp: None,
        rate_limit: RateLimitConfig {
            login_attempts: 1000,
            login_window_seconds: 60,
            global_ip_limit: 10_000,
            global_ip_window_seconds: 60,
        },
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(tweak: impl FnOnce(&mut CaseConfig)) -> Self {
        Self::build(tweak, None).await
    }

    /// App whose mail transport is unconfigured, like a bare deployment.
    pub async fn spawn_email_disabled() -> Self {
        Self::build(
            |_| {},
            Some(Arc::new(case_service::services::DisabledEmailService)),
        )
        .await
    }

    async fn build(
        tweak: impl FnOnce(&mut CaseConfig),
        email_override: Option<Arc<dyn case_service::services::EmailProvider>>,
    ) -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let mut config = test_config(&tmp);
        tweak(&mut config);

        let store = Store::open(&config.store.db_path).expect("open store");
        let files = FileStore::new(&config.store.uploads_dir).expect("create file store");
        let jwt = JwtService::new(&config.jwt);
        let email = Arc::new(MockEmailService::default());
        let provider: Arc<dyn case_service::services::EmailProvider> =
            email_override.unwrap_or_else(|| email.clone());
        let audit = AuditService::new(store.clone());
        let throttle: Arc<dyn LoginThrottle> = Arc::new(InMemoryThrottle::new(
            config.security.lockout_threshold,
            config.security.lockout_duration_minutes,
        ));
        let csrf = CsrfGuard::new(config.session.csrf_cookie_name.clone());

        let auth = AuthService::new(
            store.clone(),
            jwt.clone(),
            provider.clone(),
            audit.clone(),
            throttle,
            csrf.clone(),
            SessionPolicy {
                admin_emails: config.security.admin_emails.clone(),
                refresh_token_expiry_days: config.session.refresh_token_expiry_days,
                app_base_url: config.app_base_url.clone(),
            },
        );

        let retention = RetentionService::new(
            store.clone(),
            files.clone(),
            audit.clone(),
            config.retention.global_days,
        );

        let state = AppState {
            config: config.clone(),
            store,
            jwt,
            email: provider,
            files,
            auth,
            audit,
            retention,
            csrf,
            login_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.login_attempts,
                config.rate_limit.login_window_seconds,
            ),
            ip_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.global_ip_limit,
                config.rate_limit.global_ip_window_seconds,
            ),
        };

        let router = build_router(state.clone()).await.expect("build router");

        Self {
            router,
            state,
            email,
            _tmp: tmp,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.state.config.store.db_path.clone()
    }

    /// Insert a user directly into the store with the standard test
    /// password.
    pub fn seed_user(&self, email: &str, role: Role, verified: bool) -> User {
        let hash = case_service::utils::hash_password(&case_service::utils::Password::new(
            TEST_PASSWORD.to_string(),
        ))
        .expect("hash test password");

        let mut user = User::new(normalize_email(email), hash.into_string(), role);
        user.email_verified = verified;
        let seeded = user.clone();
        self.state.store.insert_user(user).expect("seed user");
        seeded
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.expect("send request")
    }

    pub async fn post_json(
        &self,
        uri: &str,
        body: serde_json::Value,
        headers: &[(&str, &str)],
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", TEST_IP);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn get(&self, uri: &str, headers: &[(&str, &str)]) -> Response<Body> {
        let mut builder = Request::builder()
            .method("GET")
            .uri(uri)
            .header("x-forwarded-for", TEST_IP);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Login attempt from a specific origin address.
    pub async fn login_from(&self, email: &str, password: &str, ip: &str) -> Response<Body> {
        let body = serde_json::json!({ "email": email, "password": password });
        let req = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", ip)
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Response<Body> {
        self.post_json(
            "/api/auth/login",
            serde_json::json!({ "email": email, "password": password }),
            &[],
        )
        .await
    }

    /// Log in and unpack the full credential set.
    pub async fn login_ok(&self, email: &str) -> AuthSession {
        let response = self.login(email, TEST_PASSWORD).await;
        assert_eq!(
            response.status(),
            axum::http::StatusCode::OK,
            "login failed for {email}"
        );

        let refresh = set_cookie_value(&response, "refresh_session").expect("refresh cookie");
        let csrf = set_cookie_value(&response, "csrf_token").expect("csrf cookie");
        let body = body_json(response).await;
        let access_token = body["access_token"].as_str().expect("access token").to_string();

        AuthSession {
            access_token,
            refresh,
            csrf,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh: String,
    pub csrf: String,
}

impl AuthSession {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Cookie header carrying both auth cookies.
    pub fn cookie_header(&self) -> String {
        format!("refresh_session={}; csrf_token={}", self.refresh, self.csrf)
    }
}

/// Value of a `Set-Cookie` for `name`, if the response sets one.
pub fn set_cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&prefix))
        .map(|v| {
            v[prefix.len()..]
                .split(';')
                .next()
                .unwrap_or("")
                .to_string()
        })
}

/// True when the response expires the named cookie (empty value).
pub fn clears_cookie(response: &Response<Body>, name: &str) -> bool {
    set_cookie_value(response, name).is_some_and(|v| v.is_empty())
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse body as JSON")
}
