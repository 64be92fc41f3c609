use axum::{
    Json,
    extract::{Path, State},
};
use tracing::info;

use hkili_types::api::{DeleteResponse, UserPatch};
use hkili_types::models::User;

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::middleware::RequireAdmin;
use crate::state::{AppState, with_db};

pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> ApiResult<Json<Vec<User>>> {
    let rows = with_db(&state, |db| db.list_users()).await?;
    let users = rows
        .into_iter()
        .map(User::try_from)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(users))
}

/// Moderation patch: status, role, coin balance or display name.
pub async fn update_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<UserPatch>,
) -> ApiResult<Json<User>> {
    if patch.is_empty() {
        return Err(ApiError::BadRequest("Nothing to update".into()));
    }
    if patch.coins.is_some_and(|c| c < 0) {
        return Err(ApiError::BadRequest("Coins must not be negative".into()));
    }

    let summary = format!("{:?}", patch);
    let key = id.clone();
    let row = with_db(&state, move |db| {
        if !db.update_user(&key, &patch)? {
            return Ok(None);
        }
        db.get_user_by_id(&key)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User"))?;

    info!("User {} updated by admin {}: {}", id, admin.id, summary);
    Ok(Json(User::try_from(row)?))
}

/// Hard delete. The user's stories and characters stay behind.
pub async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let key = id.clone();
    if !with_db(&state, move |db| db.delete_user(&key)).await? {
        return Err(ApiError::not_found("User"));
    }

    info!("User {} deleted by admin {}", id, admin.id);
    Ok(Json(DeleteResponse { deleted: true }))
}
