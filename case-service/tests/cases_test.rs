//! Case intake surface: ownership, admin updates, attachments.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use case_service::models::Role;
use common::{body_json, AuthSession, TestApp};

async fn create_case(app: &TestApp, session: &AuthSession, detail: &str) -> serde_json::Value {
    let response = app
        .post_json(
            "/api/cases",
            serde_json::json!({ "detail": detail, "contact_email": "reach-me@example.com" }),
            &[
                ("authorization", session.bearer().as_str()),
                ("cookie", session.cookie_header().as_str()),
                ("x-csrf-token", session.csrf.as_str()),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn owner_sees_own_cases_only() {
    let app = TestApp::spawn().await;
    app.seed_user("a@example.com", Role::Enterprise, true);
    app.seed_user("b@example.com", Role::Enterprise, true);
    let a = app.login_ok("a@example.com").await;
    let b = app.login_ok("b@example.com").await;

    create_case(&app, &a, "claim from a").await;
    create_case(&app, &b, "claim from b").await;

    let response = app
        .get("/api/cases", &[("authorization", a.bearer().as_str())])
        .await;
    let cases = body_json(response).await;
    let cases = cases.as_array().unwrap();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0]["detail"], "claim from a");
}

#[tokio::test]
async fn strangers_cannot_read_a_case() {
    let app = TestApp::spawn().await;
    app.seed_user("a@example.com", Role::Enterprise, true);
    app.seed_user("b@example.com", Role::Enterprise, true);
    let a = app.login_ok("a@example.com").await;
    let b = app.login_ok("b@example.com").await;

    let case = create_case(&app, &a, "private claim").await;
    let case_id = case["id"].as_str().unwrap();

    let response = app
        .get(
            &format!("/api/cases/{case_id}"),
            &[("authorization", b.bearer().as_str())],
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_sees_everything_and_updates_status() {
    let app = TestApp::spawn_with(|config| {
        config.security.admin_emails = vec!["staff@example.com".to_string()];
    })
    .await;
    app.seed_user("a@example.com", Role::Enterprise, true);
    app.seed_user("staff@example.com", Role::Enterprise, true);
    let owner = app.login_ok("a@example.com").await;
    let admin = app.login_ok("staff@example.com").await;

    let case = create_case(&app, &owner, "needs review").await;
    let case_id = case["id"].as_str().unwrap();

    let response = app
        .get("/api/cases", &[("authorization", admin.bearer().as_str())])
        .await;
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let response = app
        .post_json(
            &format!("/api/cases/{case_id}/updates"),
            serde_json::json!({ "message": "Reviewed and resolved.", "status": "resolved" }),
            &[
                ("authorization", admin.bearer().as_str()),
                ("cookie", admin.cookie_header().as_str()),
                ("x-csrf-token", admin.csrf.as_str()),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .get(
            &format!("/api/cases/{case_id}"),
            &[("authorization", owner.bearer().as_str())],
        )
        .await;
    assert_eq!(body_json(response).await["status"], "resolved");

    // The claimant was notified at the case's contact address.
    let sent = app.email.sent.lock().unwrap().clone();
    assert!(sent
        .iter()
        .any(|(to, what)| to == "reach-me@example.com" && what == "status:resolved"));
}

#[tokio::test]
async fn non_admin_cannot_post_updates() {
    let app = TestApp::spawn().await;
    app.seed_user("a@example.com", Role::Enterprise, true);
    let owner = app.login_ok("a@example.com").await;

    let case = create_case(&app, &owner, "mine").await;
    let case_id = case["id"].as_str().unwrap();

    let response = app
        .post_json(
            &format!("/api/cases/{case_id}/updates"),
            serde_json::json!({ "message": "bump" }),
            &[
                ("authorization", owner.bearer().as_str()),
                ("cookie", owner.cookie_header().as_str()),
                ("x-csrf-token", owner.csrf.as_str()),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn closed_cases_accept_no_further_status_changes() {
    let app = TestApp::spawn_with(|config| {
        config.security.admin_emails = vec!["staff@example.com".to_string()];
    })
    .await;
    app.seed_user("a@example.com", Role::Enterprise, true);
    app.seed_user("staff@example.com", Role::Enterprise, true);
    let owner = app.login_ok("a@example.com").await;
    let admin = app.login_ok("staff@example.com").await;

    let case = create_case(&app, &owner, "short-lived").await;
    let case_id = case["id"].as_str().unwrap();
    let admin_headers = [
        ("authorization", admin.bearer().to_string()),
        ("cookie", admin.cookie_header()),
        ("x-csrf-token", admin.csrf.clone()),
    ];
    let headers: Vec<(&str, &str)> = admin_headers
        .iter()
        .map(|(k, v)| (*k, v.as_str()))
        .collect();

    let response = app
        .post_json(
            &format!("/api/cases/{case_id}/updates"),
            serde_json::json!({ "message": "Closing.", "status": "closed" }),
            &headers,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .post_json(
            &format!("/api/cases/{case_id}/updates"),
            serde_json::json!({ "message": "Reopening?", "status": "received" }),
            &headers,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn attachments_upload_and_download_round_trip() {
    let app = TestApp::spawn().await;
    app.seed_user("a@example.com", Role::Enterprise, true);
    let owner = app.login_ok("a@example.com").await;

    let case = create_case(&app, &owner, "with evidence").await;
    let case_id = case["id"].as_str().unwrap();

    let boundary = "X-CASE-BOUNDARY";
    let multipart_body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"attachments\"; filename=\"evidence.txt\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         the transfer receipt\r\n\
         --{boundary}--\r\n"
    );

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri(format!("/api/cases/{case_id}/attachments"))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .header(header::AUTHORIZATION, owner.bearer())
                .header(header::COOKIE, owner.cookie_header())
                .header("x-csrf-token", &owner.csrf)
                .body(Body::from(multipart_body))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    let stored_name = updated["attachments"][0]["stored_name"].as_str().unwrap();
    assert_eq!(
        updated["attachments"][0]["original_name"],
        "evidence.txt"
    );

    let response = app
        .get(
            &format!("/api/cases/{case_id}/files/{stored_name}"),
            &[("authorization", owner.bearer().as_str())],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"the transfer receipt");
}
