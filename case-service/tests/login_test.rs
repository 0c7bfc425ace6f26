//! Password login behavior: credentials, role policy, lockout.

mod common;

use axum::http::{header, StatusCode};
use case_service::models::Role;
use common::{body_json, set_cookie_value, TestApp, TEST_IP, TEST_PASSWORD};

#[tokio::test]
async fn login_issues_tokens_and_cookies() {
    let app = TestApp::spawn().await;
    app.seed_user("owner@example.com", Role::Enterprise, true);

    let response = app.login("owner@example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);

    let refresh = set_cookie_value(&response, "refresh_session").expect("refresh cookie set");
    let csrf = set_cookie_value(&response, "csrf_token").expect("csrf cookie set");
    assert!(!refresh.is_empty());
    assert!(!csrf.is_empty());

    // Refresh cookie is HttpOnly; CSRF cookie must NOT be, so client
    // script can echo it into the header.
    let cookies: Vec<String> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    let refresh_cookie = cookies
        .iter()
        .find(|c| c.starts_with("refresh_session="))
        .unwrap();
    let csrf_cookie = cookies.iter().find(|c| c.starts_with("csrf_token=")).unwrap();
    assert!(refresh_cookie.contains("HttpOnly"));
    assert!(!csrf_cookie.contains("HttpOnly"));

    let body = body_json(response).await;
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["email"], "owner@example.com");
    assert!(body["access_token"].as_str().is_some());

    // The raw refresh secret is never persisted.
    let session = app
        .state
        .store
        .session_by_secret_hash(&case_service::models::RefreshSession::hash_secret(&refresh))
        .expect("session stored by hash");
    assert_ne!(session.secret_hash, refresh);
}

#[tokio::test]
async fn unknown_user_and_wrong_password_read_identically() {
    let app = TestApp::spawn().await;
    app.seed_user("known@example.com", Role::Enterprise, true);

    let unknown = app.login("nobody@example.com", TEST_PASSWORD).await;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    let unknown_body = body_json(unknown).await;

    let wrong = app.login("known@example.com", "not-the-password").await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let wrong_body = body_json(wrong).await;

    // No user-existence leakage: the envelopes are identical.
    assert_eq!(unknown_body, wrong_body);
    assert_eq!(wrong_body["error"], "Invalid credentials");
}

#[tokio::test]
async fn plain_user_role_cannot_password_login() {
    let app = TestApp::spawn().await;
    app.seed_user("claimant@example.com", Role::User, true);

    let response = app.login("claimant@example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["code"], "PASSWORD_LOGIN_DISABLED");
}

#[tokio::test]
async fn unverified_email_is_refused() {
    let app = TestApp::spawn().await;
    app.seed_user("pending@example.com", Role::Enterprise, false);

    let response = app.login("pending@example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["code"], "EMAIL_NOT_VERIFIED");
}

#[tokio::test]
async fn allow_listed_email_is_escalated_to_admin() {
    let app = TestApp::spawn_with(|config| {
        config.security.admin_emails = vec!["boss@example.com".to_string()];
    })
    .await;
    app.seed_user("boss@example.com", Role::Enterprise, true);

    let response = app.login("boss@example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["role"], "admin");

    let stored = app.state.store.user_by_email("boss@example.com").unwrap();
    assert_eq!(stored.role, Role::Admin);
}

#[tokio::test]
async fn lockout_kicks_in_at_threshold_and_rejects_correct_password() {
    let app = TestApp::spawn_with(|config| {
        config.security.lockout_threshold = 3;
    })
    .await;
    app.seed_user("victim@example.com", Role::Enterprise, true);

    // Attempts below the threshold keep failing as plain bad credentials.
    for _ in 0..2 {
        let response = app.login("victim@example.com", "wrong").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // The third failure trips the lock.
    let response = app.login("victim@example.com", "wrong").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Even the correct password is refused with a lockout message now,
    // not "invalid credentials".
    let response = app.login("victim@example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().get(header::RETRY_AFTER).is_some());
    let body = body_json(response).await;
    assert_eq!(body["code"], "RATE_LIMITED");

    // The lock is keyed by (identity, origin): another address is free.
    let response = app
        .login_from("victim@example.com", TEST_PASSWORD, "198.51.100.77")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn success_clears_the_failure_count() {
    let app = TestApp::spawn_with(|config| {
        config.security.lockout_threshold = 3;
    })
    .await;
    app.seed_user("slow-typist@example.com", Role::Enterprise, true);

    for _ in 0..2 {
        app.login("slow-typist@example.com", "wrong").await;
    }
    let response = app.login("slow-typist@example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);

    // The counter restarted: two more failures do not lock.
    for _ in 0..2 {
        app.login("slow-typist@example.com", "wrong").await;
    }
    let response = app.login("slow-typist@example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn every_attempt_lands_in_the_login_audit() {
    let app = TestApp::spawn().await;
    app.seed_user("audited@example.com", Role::Enterprise, true);

    app.login("audited@example.com", "wrong").await;
    app.login("audited@example.com", TEST_PASSWORD).await;

    let rows = app.state.store.read(|t| t.login_audit.clone());
    let for_user: Vec<_> = rows
        .iter()
        .filter(|r| r.identity == "audited@example.com")
        .collect();
    assert_eq!(for_user.len(), 2);

    let failure = &for_user[0];
    assert!(!failure.success);
    assert_eq!(failure.failure_reason.as_deref(), Some("bad_password"));
    assert_eq!(failure.attempt_count, 1);
    assert_eq!(failure.ip, TEST_IP);

    let success = &for_user[1];
    assert!(success.success);
    assert!(success.failure_reason.is_none());
}
