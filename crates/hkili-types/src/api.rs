use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Role, StorySegment, User, UserStatus};

// -- JWT Claims --

/// Claims carried by every bearer token. The role is fixed at issuance and
/// trusted until `exp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

// -- Auth --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

// -- Stories --

/// Body for story creation and full replacement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoryRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub segments: Vec<StorySegment>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub character_ids: Vec<Uuid>,
}

/// Partial story update. Absent and `null` fields both mean "unchanged";
/// a full replace is the way to clear `genre`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_downloaded: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoryQuery {
    pub user_id: Option<Uuid>,
}

// -- Characters --

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharacterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub skin_tone: Option<String>,
    #[serde(default)]
    pub hair_style: Option<String>,
    #[serde(default)]
    pub hair_color: Option<String>,
    #[serde(default)]
    pub eye_color: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub is_main: bool,
    #[serde(default)]
    pub avatar: Option<String>,
}

// -- Categories --

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

// -- User moderation --

/// Admin moderation patch. `null` is the same as absent, so a display name
/// can be changed but not removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coins: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.role.is_none() && self.coins.is_none() && self.name.is_none()
    }
}

// -- Dashboard --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentStory {
    pub id: Uuid,
    pub title: String,
    pub genre: Option<String>,
    pub created_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub total_users: u64,
    pub total_stories: u64,
    pub total_characters: u64,
    pub total_categories: u64,
    pub total_coins: i64,
    pub active_users: u64,
    pub blocked_users: u64,
    pub recent_stories: Vec<RecentStory>,
}

// -- Media --

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
}

/// Parameters a client needs to upload straight to the asset host.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadSignature {
    pub signature: String,
    pub timestamp: i64,
    pub api_key: String,
    pub cloud_name: String,
    pub folder: String,
}

// -- Misc --

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
