use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use tracing::debug;
use uuid::Uuid;

use hkili_types::models::Role;

use crate::auth::decode_token;
use crate::error::ApiError;
use crate::state::AppState;

/// Cookie the admin panel stores its token in.
pub const TOKEN_COOKIE: &str = "token";

/// Bearer token from the Authorization header, falling back to the `token`
/// cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

/// Caller identity decoded from a valid token. The role is the one embedded
/// at issuance; the store is not consulted.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins may touch anything; everyone else only what they own.
    pub fn ensure_owner(&self, owner: Option<Uuid>) -> Result<(), ApiError> {
        if self.is_admin() || owner == Some(self.id) {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Not allowed to access this resource".into()))
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("Missing authentication token".into()))?;

        let claims = decode_token(&state.config.jwt_secret, &token)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;

        Ok(AuthUser {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }
}

/// An [`AuthUser`] whose role claim is `admin`; 403 otherwise.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::Forbidden("Admin role required".into()));
        }
        Ok(RequireAdmin(user))
    }
}

/// Edge gate for the admin panel pages. Missing or invalid tokens go to the
/// login page, non-admins go home, admins pass through.
pub async fn admin_gate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(token) = token_from_headers(req.headers()) else {
        debug!("admin page without token: {}", req.uri().path());
        return Redirect::temporary("/login").into_response();
    };

    match decode_token(&state.config.jwt_secret, &token) {
        Err(_) => Redirect::temporary("/login").into_response(),
        Ok(claims) if claims.role != Role::Admin => Redirect::temporary("/").into_response(),
        Ok(_) => next.run(req).await,
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(header::COOKIE, HeaderValue::from_static("token=from-cookie"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn cookie_is_the_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; token=abc"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn non_bearer_scheme_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert_eq!(token_from_headers(&headers), None);
    }

    #[test]
    fn ownership_rules() {
        let owner = Uuid::new_v4();
        let user = AuthUser { id: owner, email: "u@x".into(), role: Role::User };
        assert!(user.ensure_owner(Some(owner)).is_ok());
        assert!(user.ensure_owner(Some(Uuid::new_v4())).is_err());
        assert!(user.ensure_owner(None).is_err());

        let admin = AuthUser { id: Uuid::new_v4(), email: "a@x".into(), role: Role::Admin };
        assert!(admin.ensure_owner(None).is_ok());
    }
}
