//! Database row types. These map directly to SQLite rows and stay distinct
//! from the hkili-types API models; `TryFrom` does the decoding.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use uuid::Uuid;

use hkili_types::models::{Category, Character, Story, StorySegment, User};

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub status: String,
    pub role: String,
    pub coins: i64,
    pub created_at: String,
}

/// Insert payload for the users collection.
pub struct NewUser<'a> {
    pub id: Uuid,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub name: Option<&'a str>,
    pub role: hkili_types::models::Role,
}

pub struct StoryRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub segments: String,
    pub genre: Option<String>,
    pub character_ids: String,
    pub is_favorite: bool,
    pub is_downloaded: bool,
    pub created_at: String,
}

pub struct CharacterRow {
    pub id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub skin_tone: Option<String>,
    pub hair_style: Option<String>,
    pub hair_color: Option<String>,
    pub eye_color: Option<String>,
    pub interests: String,
    pub is_main: bool,
    pub avatar: Option<String>,
    pub created_at: String,
}

pub struct CategoryRow {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub created_at: String,
}

/// A story joined with its owner; owner columns are NULL once the user is gone.
pub struct RecentStoryRow {
    pub id: String,
    pub title: String,
    pub genre: Option<String>,
    pub created_at: String,
    pub user_id: String,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
}

/// The two user columns the dashboard reduces over.
pub struct UserBalanceRow {
    pub coins: i64,
    pub status: String,
}

// -- Encoding helpers --

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by hand through the sqlite shell use datetime('now').
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("corrupt timestamp '{raw}'"))
}

fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("corrupt id '{raw}'"))
}

// -- Row decoding --

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_id(&row.id)?,
            email: row.email,
            name: row.name,
            status: row.status.parse().map_err(anyhow::Error::msg)?,
            role: row.role.parse().map_err(anyhow::Error::msg)?,
            coins: row.coins,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl TryFrom<StoryRow> for Story {
    type Error = anyhow::Error;

    fn try_from(row: StoryRow) -> Result<Self> {
        let segments: Vec<StorySegment> = serde_json::from_str(&row.segments)
            .with_context(|| format!("corrupt segments on story '{}'", row.id))?;
        let character_ids: Vec<Uuid> = serde_json::from_str(&row.character_ids)
            .with_context(|| format!("corrupt character_ids on story '{}'", row.id))?;

        Ok(Story {
            id: parse_id(&row.id)?,
            user_id: parse_id(&row.user_id)?,
            title: row.title,
            segments,
            genre: row.genre,
            character_ids,
            is_favorite: row.is_favorite,
            is_downloaded: row.is_downloaded,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl TryFrom<CharacterRow> for Character {
    type Error = anyhow::Error;

    fn try_from(row: CharacterRow) -> Result<Self> {
        let interests: Vec<String> = serde_json::from_str(&row.interests)
            .with_context(|| format!("corrupt interests on character '{}'", row.id))?;

        Ok(Character {
            id: parse_id(&row.id)?,
            user_id: row.user_id.as_deref().map(parse_id).transpose()?,
            name: row.name,
            age: row.age,
            gender: row.gender,
            skin_tone: row.skin_tone,
            hair_style: row.hair_style,
            hair_color: row.hair_color,
            eye_color: row.eye_color,
            interests,
            is_main: row.is_main,
            avatar: row.avatar,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl TryFrom<CategoryRow> for Category {
    type Error = anyhow::Error;

    fn try_from(row: CategoryRow) -> Result<Self> {
        Ok(Category {
            id: parse_id(&row.id)?,
            name: row.name,
            image: row.image,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl TryFrom<RecentStoryRow> for hkili_types::api::RecentStory {
    type Error = anyhow::Error;

    fn try_from(row: RecentStoryRow) -> Result<Self> {
        Ok(hkili_types::api::RecentStory {
            id: parse_id(&row.id)?,
            title: row.title,
            genre: row.genre,
            created_at: parse_timestamp(&row.created_at)?,
            user_id: parse_id(&row.user_id)?,
            user_email: row.user_email,
            user_name: row.user_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_accept_both_formats() {
        let now = Utc::now();
        let stored = format_timestamp(now);
        let parsed = parse_timestamp(&stored).unwrap();
        assert_eq!(parsed.timestamp_millis(), now.timestamp_millis());

        let legacy = parse_timestamp("2024-03-01 12:30:00").unwrap();
        assert_eq!(legacy.to_rfc3339(), "2024-03-01T12:30:00+00:00");
    }

    #[test]
    fn corrupt_segments_are_reported() {
        let row = StoryRow {
            id: Uuid::new_v4().to_string(),
            user_id: Uuid::new_v4().to_string(),
            title: "t".into(),
            segments: "not json".into(),
            genre: None,
            character_ids: "[]".into(),
            is_favorite: false,
            is_downloaded: false,
            created_at: format_timestamp(Utc::now()),
        };
        let err = Story::try_from(row).unwrap_err();
        assert!(err.to_string().contains("corrupt segments"));
    }
}
