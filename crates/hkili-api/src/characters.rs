use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use hkili_types::api::{CharacterRequest, DeleteResponse};
use hkili_types::models::{Character, normalize_interests};

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::middleware::AuthUser;
use crate::state::{AppState, with_db};

pub async fn list_characters(
    State(state): State<AppState>,
    caller: AuthUser,
) -> ApiResult<Json<Vec<Character>>> {
    let owner = (!caller.is_admin()).then(|| caller.id.to_string());
    let rows = with_db(&state, move |db| db.list_characters(owner.as_deref())).await?;

    let characters = rows
        .into_iter()
        .map(Character::try_from)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(characters))
}

pub async fn create_character(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(req): ApiJson<CharacterRequest>,
) -> ApiResult<impl IntoResponse> {
    let character = build_character(Uuid::new_v4(), Some(caller.id), chrono::Utc::now(), req)?;

    let record = character.clone();
    with_db(&state, move |db| db.insert_character(&record)).await?;
    info!("Character {} ({}) created by {}", character.id, character.name, caller.id);

    Ok((StatusCode::CREATED, Json(character)))
}

/// Characters without an owner were created by the panel and are readable
/// by everyone.
pub async fn get_character(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Character>> {
    let character = load_character(&state, id).await?;
    if character.user_id.is_some() {
        caller.ensure_owner(character.user_id)?;
    }
    Ok(Json(character))
}

pub async fn replace_character(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<CharacterRequest>,
) -> ApiResult<Json<Character>> {
    let existing = load_character(&state, id).await?;
    caller.ensure_owner(existing.user_id)?;

    let character = build_character(existing.id, existing.user_id, existing.created_at, req)?;
    let record = character.clone();
    if !with_db(&state, move |db| db.replace_character(&record)).await? {
        return Err(ApiError::not_found("Character"));
    }
    Ok(Json(character))
}

pub async fn delete_character(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let existing = load_character(&state, id.clone()).await?;
    caller.ensure_owner(existing.user_id)?;

    if !with_db(&state, move |db| db.delete_character(&id)).await? {
        return Err(ApiError::not_found("Character"));
    }
    info!("Character {} deleted by {}", existing.id, caller.id);
    Ok(Json(DeleteResponse { deleted: true }))
}

async fn load_character(state: &AppState, id: String) -> ApiResult<Character> {
    let row = with_db(state, move |db| db.get_character(&id))
        .await?
        .ok_or_else(|| ApiError::not_found("Character"))?;
    Ok(Character::try_from(row)?)
}

fn build_character(
    id: Uuid,
    user_id: Option<Uuid>,
    created_at: chrono::DateTime<chrono::Utc>,
    req: CharacterRequest,
) -> ApiResult<Character> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Character name is required".into()));
    }

    Ok(Character {
        id,
        user_id,
        name: name.to_string(),
        age: req.age,
        gender: req.gender,
        skin_tone: req.skin_tone,
        hair_style: req.hair_style,
        hair_color: req.hair_color,
        eye_color: req.eye_color,
        interests: normalize_interests(&req.interests),
        is_main: req.is_main,
        avatar: req.avatar,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_required() {
        let req = CharacterRequest { name: "  ".into(), ..Default::default() };
        let err = build_character(Uuid::new_v4(), None, chrono::Utc::now(), req).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn interests_become_a_set() {
        let req = CharacterRequest {
            name: " Layla ".into(),
            interests: vec!["cats".into(), "cats".into(), "  ".into(), "stars".into()],
            is_main: true,
            ..Default::default()
        };
        let character = build_character(Uuid::new_v4(), None, chrono::Utc::now(), req).unwrap();
        assert_eq!(character.name, "Layla");
        assert_eq!(character.interests, vec!["cats", "stars"]);
        assert!(character.is_main);
    }
}
