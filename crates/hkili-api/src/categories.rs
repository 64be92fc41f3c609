use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use hkili_types::api::{CategoryRequest, DeleteResponse};
use hkili_types::models::Category;

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::middleware::{AuthUser, RequireAdmin};
use crate::state::{AppState, with_db};

pub async fn list_categories(
    State(state): State<AppState>,
    _caller: AuthUser,
) -> ApiResult<Json<Vec<Category>>> {
    let rows = with_db(&state, |db| db.list_categories()).await?;
    let categories = rows
        .into_iter()
        .map(Category::try_from)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(categories))
}

pub async fn create_category(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(req): ApiJson<CategoryRequest>,
) -> ApiResult<impl IntoResponse> {
    let category = Category {
        id: Uuid::new_v4(),
        name: required_name(&req)?,
        image: req.image,
        created_at: chrono::Utc::now(),
    };

    let record = category.clone();
    with_db(&state, move |db| db.insert_category(&record)).await?;
    info!("Category {} ({}) created by admin {}", category.id, category.name, admin.id);

    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn replace_category(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<CategoryRequest>,
) -> ApiResult<Json<Category>> {
    let name = required_name(&req)?;

    let key = id.clone();
    let existing = with_db(&state, move |db| db.get_category(&key))
        .await?
        .ok_or_else(|| ApiError::not_found("Category"))?;

    let category = Category {
        name,
        image: req.image,
        ..Category::try_from(existing)?
    };

    let record = category.clone();
    if !with_db(&state, move |db| db.replace_category(&record)).await? {
        return Err(ApiError::not_found("Category"));
    }
    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let key = id.clone();
    if !with_db(&state, move |db| db.delete_category(&key)).await? {
        return Err(ApiError::not_found("Category"));
    }

    info!("Category {} deleted by admin {}", id, admin.id);
    Ok(Json(DeleteResponse { deleted: true }))
}

fn required_name(req: &CategoryRequest) -> ApiResult<String> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Category name is required".into()));
    }
    Ok(name.to_string())
}
