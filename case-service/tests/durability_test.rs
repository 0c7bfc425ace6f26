//! End-to-end durability: state created through the API survives a
//! simulated process restart via the flushed store file.

mod common;

use axum::http::StatusCode;
use case_service::models::{RefreshSession, Role};
use case_service::store::Store;
use common::{body_json, TestApp, TEST_PASSWORD};

#[tokio::test]
async fn sessions_and_cases_survive_a_restart() {
    let app = TestApp::spawn().await;
    app.seed_user("owner@example.com", Role::Enterprise, true);
    let session = app.login_ok("owner@example.com").await;

    let response = app
        .post_json(
            "/api/cases",
            serde_json::json!({ "detail": "persisted claim" }),
            &[
                ("authorization", session.bearer().as_str()),
                ("cookie", session.cookie_header().as_str()),
                ("x-csrf-token", session.csrf.as_str()),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let case = body_json(response).await;
    let case_id: uuid::Uuid = case["id"].as_str().unwrap().parse().unwrap();

    // Flush explicitly: the test app has no background flusher running.
    assert!(app.state.store.flush_if_dirty().unwrap());

    // "Restart": a second store handle over the same file.
    let reopened = Store::open(app.db_path()).unwrap();

    let user = reopened.user_by_email("owner@example.com").expect("user survived");
    assert!(user.email_verified);

    let restored = reopened.case_by_id(case_id).expect("case survived");
    assert_eq!(restored.detail, "persisted claim");

    let hash = RefreshSession::hash_secret(&session.refresh);
    let restored_session = reopened
        .session_by_secret_hash(&hash)
        .expect("refresh session survived");
    assert!(restored_session.revoked_at.is_none());
}

#[tokio::test]
async fn login_audit_survives_a_restart() {
    let app = TestApp::spawn().await;
    app.seed_user("owner@example.com", Role::Enterprise, true);

    app.login("owner@example.com", "wrong-password").await;
    app.login("owner@example.com", TEST_PASSWORD).await;

    app.state.store.flush_if_dirty().unwrap();

    let reopened = Store::open(app.db_path()).unwrap();
    let rows = reopened.read(|t| t.login_audit.clone());
    assert_eq!(rows.len(), 2);
    assert!(!rows[0].success);
    assert!(rows[1].success);
}

#[tokio::test]
async fn unflushed_state_is_reported_by_health() {
    let app = TestApp::spawn().await;
    app.seed_user("owner@example.com", Role::Enterprise, true);

    let response = app.get("/health", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["checks"]["store"]["pending_flush"], true);

    app.state.store.flush_if_dirty().unwrap();

    let response = app.get("/health", &[]).await;
    let body = body_json(response).await;
    assert_eq!(body["checks"]["store"]["pending_flush"], false);
}
