#![allow(dead_code)]

use std::path::Path;

use axum::Router;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE};
use axum::http::{Method, Request, Response};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use hkili_api::auth::{hash_password, issue_token};
use hkili_api::config::{CloudinaryConfig, Config};
use hkili_api::{AppState, AppStateInner, build_router};
use hkili_db::Database;
use hkili_db::models::NewUser;
use hkili_types::models::{Role, User};

pub const TEST_SECRET: &str = "integration-test-secret";
pub const ADMIN_EMAIL: &str = "admin@hkili.com";
pub const ADMIN_PASSWORD: &str = "admin-password";

/// Router plus the state behind it, so tests can seed the store directly.
/// The temp dir holds uploads and admin pages for the lifetime of the test.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub dir: TempDir,
}

pub fn test_config(dir: &Path) -> Config {
    Config {
        jwt_secret: TEST_SECRET.to_string(),
        token_ttl_hours: 24,
        db_path: dir.join("unused.db"),
        host: "127.0.0.1".to_string(),
        port: 0,
        upload_dir: dir.join("uploads"),
        admin_dir: dir.join("admin"),
        cloudinary: Some(CloudinaryConfig {
            cloud_name: "hkili-test".to_string(),
            api_key: "123456".to_string(),
            api_secret: "shhh".to_string(),
            folder: "stories".to_string(),
        }),
    }
}

pub fn build_test_app() -> TestApp {
    let dir = TempDir::new().expect("temp dir");
    let db = Database::open_in_memory().expect("in-memory db");
    let state = AppStateInner::new(db, test_config(dir.path()));
    TestApp {
        router: build_router(state.clone()),
        state,
        dir,
    }
}

impl TestApp {
    pub fn seed_user(&self, email: &str, password: &str, role: Role) -> Uuid {
        let id = Uuid::new_v4();
        let hash = hash_password(password).expect("hashing should succeed");
        self.state
            .db
            .create_user(&NewUser {
                id,
                email,
                password_hash: &hash,
                name: Some("Seeded"),
                role,
            })
            .expect("user creation should succeed");
        id
    }

    pub fn seed_admin(&self) -> Uuid {
        self.seed_user(ADMIN_EMAIL, ADMIN_PASSWORD, Role::Admin)
    }

    /// Token for an already seeded user, issued without going through login.
    pub fn token_for(&self, email: &str) -> String {
        let row = self
            .state
            .db
            .get_user_by_email(email)
            .expect("lookup should succeed")
            .expect("user should exist");
        let user = User::try_from(row).expect("row should decode");
        issue_token(TEST_SECRET, 24, &user).expect("token should encode")
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.expect("router is infallible")
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response<Body> {
        self.send(request(Method::GET, uri, token, Body::empty())).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> Response<Body> {
        self.send(request(Method::DELETE, uri, token, Body::empty())).await
    }

    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: serde_json::Value,
    ) -> Response<Body> {
        let mut req = request(method, uri, token, Body::from(body.to_string()));
        req.headers_mut()
            .insert(CONTENT_TYPE, "application/json".parse().unwrap());
        self.send(req).await
    }

    pub async fn get_with_cookie(&self, uri: &str, token: &str) -> Response<Body> {
        let req = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(COOKIE, format!("token={token}"))
            .body(Body::empty())
            .unwrap();
        self.send(req).await
    }
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(body).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    if bytes.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(&bytes).expect("body should be JSON")
}
