use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use hkili_types::api::{DeleteResponse, StoryPatch, StoryQuery, StoryRequest};
use hkili_types::models::Story;

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::middleware::AuthUser;
use crate::state::{AppState, with_db};

/// Admins see every story (optionally one user's); everyone else sees their own.
pub async fn list_stories(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<StoryQuery>,
) -> ApiResult<Json<Vec<Story>>> {
    let owner = if caller.is_admin() {
        query.user_id
    } else {
        Some(caller.id)
    };

    let rows = with_db(&state, move |db| {
        db.list_stories(owner.map(|o| o.to_string()).as_deref())
    })
    .await?;

    let stories = rows
        .into_iter()
        .map(Story::try_from)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(stories))
}

pub async fn create_story(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(req): ApiJson<StoryRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_story(&req)?;

    let story = Story {
        id: Uuid::new_v4(),
        user_id: caller.id,
        title: req.title.trim().to_string(),
        segments: req.segments,
        genre: req.genre,
        character_ids: req.character_ids,
        is_favorite: false,
        is_downloaded: false,
        created_at: chrono::Utc::now(),
    };

    let record = story.clone();
    with_db(&state, move |db| db.insert_story(&record)).await?;
    info!("Story {} created by {}", story.id, caller.id);

    Ok((StatusCode::CREATED, Json(story)))
}

pub async fn get_story(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Story>> {
    let story = load_story(&state, id).await?;
    caller.ensure_owner(Some(story.user_id))?;
    Ok(Json(story))
}

/// Full replace of title, segments, genre and characters.
pub async fn replace_story(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<StoryRequest>,
) -> ApiResult<Json<Story>> {
    let existing = load_story(&state, id).await?;
    caller.ensure_owner(Some(existing.user_id))?;
    validate_story(&req)?;

    let story = Story {
        title: req.title.trim().to_string(),
        segments: req.segments,
        genre: req.genre,
        character_ids: req.character_ids,
        ..existing
    };

    let record = story.clone();
    if !with_db(&state, move |db| db.replace_story(&record)).await? {
        return Err(ApiError::not_found("Story"));
    }
    Ok(Json(story))
}

pub async fn patch_story(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<StoryPatch>,
) -> ApiResult<Json<Story>> {
    let existing = load_story(&state, id.clone()).await?;
    caller.ensure_owner(Some(existing.user_id))?;

    if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::BadRequest("Title must not be empty".into()));
    }

    let patch = StoryPatch {
        title: patch.title.map(|t| t.trim().to_string()),
        ..patch
    };
    let key = id.clone();
    with_db(&state, move |db| db.patch_story(&key, &patch)).await?;

    Ok(Json(load_story(&state, id).await?))
}

pub async fn delete_story(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let existing = load_story(&state, id.clone()).await?;
    caller.ensure_owner(Some(existing.user_id))?;

    if !with_db(&state, move |db| db.delete_story(&id)).await? {
        return Err(ApiError::not_found("Story"));
    }
    info!("Story {} deleted by {}", existing.id, caller.id);
    Ok(Json(DeleteResponse { deleted: true }))
}

async fn load_story(state: &AppState, id: String) -> ApiResult<Story> {
    let row = with_db(state, move |db| db.get_story(&id))
        .await?
        .ok_or_else(|| ApiError::not_found("Story"))?;
    Ok(Story::try_from(row)?)
}

/// A story needs a title and at least one segment with text.
fn validate_story(req: &StoryRequest) -> ApiResult<()> {
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title is required".into()));
    }
    if !req.segments.iter().any(|s| !s.text.trim().is_empty()) {
        return Err(ApiError::BadRequest("Story content is required".into()));
    }
    Ok(())
}
