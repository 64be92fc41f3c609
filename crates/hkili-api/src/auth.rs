use anyhow::Context;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{self, SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{info, warn};
use uuid::Uuid;

use hkili_db::{Database, is_unique_violation};
use hkili_db::models::NewUser;
use hkili_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};
use hkili_types::models::{Role, User, UserStatus};

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::middleware::AuthUser;
use crate::state::{AppState, with_db};

const MIN_PASSWORD_LEN: usize = 6;

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest("Email and password are required".into()));
    }

    let row = with_db(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".into()))?;

    if !verify_password(&req.password, &row.password)? {
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let user = User::try_from(row)?;
    if user.status == UserStatus::Blocked {
        warn!("Blocked user {} attempted to log in", user.id);
        return Err(ApiError::Forbidden("Account is blocked".into()));
    }

    let token = issue_token(&state.config.jwt_secret, state.config.token_ttl_hours, &user)?;
    Ok(Json(AuthResponse { token, user }))
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = normalize_email(&req.email);
    if !email.contains('@') {
        return Err(ApiError::BadRequest("A valid email is required".into()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let lookup = email.clone();
    if with_db(&state, move |db| db.get_user_by_email(&lookup)).await?.is_some() {
        return Err(ApiError::Conflict("Email is already registered".into()));
    }

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();
    let name = req.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

    // The lookup above is only a fast path; a concurrent registration can
    // still win the insert, which the UNIQUE index reports.
    let row = with_db(&state, move |db| {
        let created = db.create_user(&NewUser {
            id: user_id,
            email: &email,
            password_hash: &password_hash,
            name: name.as_deref(),
            role: Role::User,
        });
        match created {
            Err(e) if is_unique_violation(&e) => return Ok(None),
            other => other?,
        }
        let row = db
            .get_user_by_id(&user_id.to_string())?
            .with_context(|| format!("user {user_id} vanished after insert"))?;
        Ok(Some(row))
    })
    .await?
    .ok_or_else(|| ApiError::Conflict("Email is already registered".into()))?;

    let user = User::try_from(row)?;
    info!("Registered user {} ({})", user.id, user.email);

    let token = issue_token(&state.config.jwt_secret, state.config.token_ttl_hours, &user)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// The caller's current record, re-read from the store.
pub async fn me(State(state): State<AppState>, caller: AuthUser) -> ApiResult<Json<User>> {
    let id = caller.id.to_string();
    let row = with_db(&state, move |db| db.get_user_by_id(&id))
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(Json(User::try_from(row)?))
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Inserts an active administrator unless the email is taken. Returns the
/// new id, or `None` when the account already existed.
pub fn seed_admin(db: &Database, email: &str, password: &str) -> anyhow::Result<Option<Uuid>> {
    let email = normalize_email(email);
    if db.get_user_by_email(&email)?.is_some() {
        return Ok(None);
    }

    let password_hash = hash_password(password)?;
    let id = Uuid::new_v4();
    db.create_user(&NewUser {
        id,
        email: &email,
        password_hash: &password_hash,
        name: Some("Administrator"),
        role: Role::Admin,
    })?;
    Ok(Some(id))
}

// -- Passwords --

/// Argon2id PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

/// `Ok(false)` on a wrong password; `Err` only when the stored hash is corrupt.
pub fn verify_password(password: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("corrupt password hash: {}", e))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("password verification failed: {}", e)),
    }
}

// -- Tokens --

pub fn issue_token(secret: &str, ttl_hours: i64, user: &User) -> anyhow::Result<String> {
    let now = chrono::Utc::now();
    let expires = chrono::Duration::try_hours(ttl_hours)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| anyhow::anyhow!("token lifetime of {ttl_hours} hours is out of range"))?;
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role,
        iat: now.timestamp(),
        exp: expires.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verifies the HS256 signature and expiry.
pub fn decode_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}
