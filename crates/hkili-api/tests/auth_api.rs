mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{ADMIN_EMAIL, ADMIN_PASSWORD, TEST_SECRET, body_json, build_test_app};
use hkili_api::auth::decode_token;
use hkili_types::models::Role;

#[tokio::test]
async fn seeded_admin_logs_in_with_admin_role() {
    let app = build_test_app();
    app.seed_admin();

    let res = app
        .json(
            Method::POST,
            "/api/auth/login",
            None,
            json!({ "email": "  Admin@HKILI.com ", "password": ADMIN_PASSWORD }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    assert_eq!(body["user"]["email"], ADMIN_EMAIL);
    assert_eq!(body["user"]["role"], "admin");
    assert!(body["user"].get("password").is_none());

    let claims = decode_token(TEST_SECRET, body["token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.role, Role::Admin);
    assert_eq!(claims.email, ADMIN_EMAIL);
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let app = build_test_app();
    app.seed_admin();

    for body in [
        json!({ "email": ADMIN_EMAIL, "password": "nope" }),
        json!({ "email": "ghost@hkili.com", "password": ADMIN_PASSWORD }),
    ] {
        let res = app.json(Method::POST, "/api/auth/login", None, body).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(res).await["error"], "Invalid credentials");
    }
}

#[tokio::test]
async fn blocked_account_cannot_log_in() {
    let app = build_test_app();
    app.seed_admin();
    app.seed_user("kid@example.com", "sunshine", Role::User);
    let admin_token = app.token_for(ADMIN_EMAIL);

    let kid = app.state.db.get_user_by_email("kid@example.com").unwrap().unwrap();
    let res = app
        .json(
            Method::PATCH,
            &format!("/api/users/{}", kid.id),
            Some(&admin_token),
            json!({ "status": "blocked" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "blocked");

    let res = app
        .json(
            Method::POST,
            "/api/auth/login",
            None,
            json!({ "email": "kid@example.com", "password": "sunshine" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(res).await["error"], "Account is blocked");
}

#[tokio::test]
async fn login_with_missing_fields_is_a_bad_request() {
    let app = build_test_app();

    let res = app
        .json(Method::POST, "/api/auth/login", None, json!({ "email": "", "password": "" }))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .json(Method::POST, "/api/auth/login", None, json!({ "email": "a@b.c" }))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(res).await["error"].is_string());
}

#[tokio::test]
async fn register_creates_a_plain_user_and_rejects_duplicates() {
    let app = build_test_app();
    let body = json!({ "email": "Kid@Example.com", "password": "sunshine", "name": " Kid " });

    let res = app.json(Method::POST, "/api/auth/register", None, body.clone()).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created = body_json(res).await;
    assert_eq!(created["user"]["email"], "kid@example.com");
    assert_eq!(created["user"]["role"], "user");
    assert_eq!(created["user"]["status"], "active");
    assert_eq!(created["user"]["coins"], 0);
    assert_eq!(created["user"]["name"], "Kid");

    let res = app.json(Method::POST, "/api/auth/register", None, body).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(res).await["error"], "Email is already registered");
}

#[tokio::test]
async fn register_cannot_smuggle_a_role() {
    let app = build_test_app();
    let res = app
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            json!({ "email": "sneaky@example.com", "password": "sunshine", "role": "admin" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(app.state.db.get_user_by_email("sneaky@example.com").unwrap().is_none());
}

#[tokio::test]
async fn register_validates_email_and_password() {
    let app = build_test_app();

    let res = app
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            json!({ "email": "not-an-email", "password": "sunshine" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            json!({ "email": "kid@example.com", "password": "123" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn me_requires_a_valid_token() {
    let app = build_test_app();
    app.seed_admin();

    let res = app.get("/api/auth/me", None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(res).await["error"], "Missing authentication token");

    let res = app.get("/api/auth/me", Some("garbage")).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(res).await["error"], "Invalid or expired token");

    let token = app.token_for(ADMIN_EMAIL);
    let res = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["email"], ADMIN_EMAIL);
}

#[tokio::test]
async fn health_reports_ok() {
    let app = build_test_app();
    let res = app.get("/health", None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "ok");
}

#[tokio::test]
async fn concurrent_registrations_for_one_email_yield_one_account() {
    let app = build_test_app();
    let body = json!({ "email": "twin@example.com", "password": "sunshine" });

    let (first, second) = tokio::join!(
        app.json(Method::POST, "/api/auth/register", None, body.clone()),
        app.json(Method::POST, "/api/auth/register", None, body.clone()),
    );

    let mut statuses = [first.status(), second.status()];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::CONFLICT]);
    assert_eq!(app.state.db.count_users().unwrap(), 1);
}
