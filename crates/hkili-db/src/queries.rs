use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};

use hkili_types::api::{StoryPatch, UserPatch};
use hkili_types::models::{Category, Character, Story};

use crate::Database;
use crate::models::{
    CategoryRow, CharacterRow, NewUser, RecentStoryRow, StoryRow, UserBalanceRow, UserRow,
    format_timestamp,
};

const USER_COLUMNS: &str = "id, email, password, name, status, role, coins, created_at";
const STORY_COLUMNS: &str =
    "id, user_id, title, segments, genre, character_ids, is_favorite, is_downloaded, created_at";
const CHARACTER_COLUMNS: &str = "id, user_id, name, age, gender, skin_tone, hair_style, hair_color, eye_color, interests, is_main, avatar, created_at";
const CATEGORY_COLUMNS: &str = "id, name, image, created_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser<'_>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password, name, role, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user.id.to_string(),
                    user.email,
                    user.password_hash,
                    user.name,
                    user.role.as_str(),
                    format_timestamp(Utc::now()),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_one(conn, &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"), email, user_from_row)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_one(conn, &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"), id, user_from_row)
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Applies only the fields present in the patch. Returns false when no
    /// user has this id.
    pub fn update_user(&self, id: &str, patch: &UserPatch) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET
                    status = COALESCE(?2, status),
                    role   = COALESCE(?3, role),
                    coins  = COALESCE(?4, coins),
                    name   = COALESCE(?5, name)
                 WHERE id = ?1",
                params![
                    id,
                    patch.status.map(|s| s.as_str()),
                    patch.role.map(|r| r.as_str()),
                    patch.coins,
                    patch.name,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])? > 0))
    }

    pub fn count_users(&self) -> Result<u64> {
        self.with_conn(|conn| count(conn, "users"))
    }

    pub fn user_balances(&self) -> Result<Vec<UserBalanceRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT coins, status FROM users")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(UserBalanceRow {
                        coins: row.get(0)?,
                        status: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Stories --

    pub fn insert_story(&self, story: &Story) -> Result<()> {
        let segments = serde_json::to_string(&story.segments)?;
        let character_ids = serde_json::to_string(&story.character_ids)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO stories (id, user_id, title, segments, genre, character_ids, is_favorite, is_downloaded, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    story.id.to_string(),
                    story.user_id.to_string(),
                    story.title,
                    segments,
                    story.genre,
                    character_ids,
                    story.is_favorite,
                    story.is_downloaded,
                    format_timestamp(story.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_story(&self, id: &str) -> Result<Option<StoryRow>> {
        self.with_conn(|conn| {
            query_one(conn, &format!("SELECT {STORY_COLUMNS} FROM stories WHERE id = ?1"), id, story_from_row)
        })
    }

    /// Newest first. `owner` restricts the listing to one user's stories.
    pub fn list_stories(&self, owner: Option<&str>) -> Result<Vec<StoryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {STORY_COLUMNS} FROM stories
                 WHERE ?1 IS NULL OR user_id = ?1
                 ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([owner], story_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Replaces the story's content. Owner, flags and creation time are kept.
    pub fn replace_story(&self, story: &Story) -> Result<bool> {
        let segments = serde_json::to_string(&story.segments)?;
        let character_ids = serde_json::to_string(&story.character_ids)?;
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE stories SET title = ?2, segments = ?3, genre = ?4, character_ids = ?5 WHERE id = ?1",
                params![story.id.to_string(), story.title, segments, story.genre, character_ids],
            )?;
            Ok(changed > 0)
        })
    }

    /// `None` fields keep their stored value, so a patch never clears a column.
    pub fn patch_story(&self, id: &str, patch: &StoryPatch) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE stories SET
                    title         = COALESCE(?2, title),
                    genre         = COALESCE(?3, genre),
                    is_favorite   = COALESCE(?4, is_favorite),
                    is_downloaded = COALESCE(?5, is_downloaded)
                 WHERE id = ?1",
                params![id, patch.title, patch.genre, patch.is_favorite, patch.is_downloaded],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_story(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM stories WHERE id = ?1", [id])? > 0))
    }

    pub fn count_stories(&self) -> Result<u64> {
        self.with_conn(|conn| count(conn, "stories"))
    }

    /// Most recent stories with their owner's email and name.
    pub fn recent_stories(&self, limit: u32) -> Result<Vec<RecentStoryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.title, s.genre, s.created_at, s.user_id, u.email, u.name
                 FROM stories s
                 LEFT JOIN users u ON s.user_id = u.id
                 ORDER BY s.created_at DESC, s.rowid DESC
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([limit], |row| {
                    Ok(RecentStoryRow {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        genre: row.get(2)?,
                        created_at: row.get(3)?,
                        user_id: row.get(4)?,
                        user_email: row.get(5)?,
                        user_name: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Characters --

    pub fn insert_character(&self, character: &Character) -> Result<()> {
        let interests = serde_json::to_string(&character.interests)?;
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO characters ({CHARACTER_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    character.id.to_string(),
                    character.user_id.map(|u| u.to_string()),
                    character.name,
                    character.age,
                    character.gender,
                    character.skin_tone,
                    character.hair_style,
                    character.hair_color,
                    character.eye_color,
                    interests,
                    character.is_main,
                    character.avatar,
                    format_timestamp(character.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_character(&self, id: &str) -> Result<Option<CharacterRow>> {
        self.with_conn(|conn| {
            query_one(
                conn,
                &format!("SELECT {CHARACTER_COLUMNS} FROM characters WHERE id = ?1"),
                id,
                character_from_row,
            )
        })
    }

    pub fn list_characters(&self, owner: Option<&str>) -> Result<Vec<CharacterRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHARACTER_COLUMNS} FROM characters
                 WHERE ?1 IS NULL OR user_id = ?1
                 ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([owner], character_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Replaces every descriptive field. Owner and creation time are kept.
    pub fn replace_character(&self, character: &Character) -> Result<bool> {
        let interests = serde_json::to_string(&character.interests)?;
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE characters SET
                    name = ?2, age = ?3, gender = ?4, skin_tone = ?5, hair_style = ?6,
                    hair_color = ?7, eye_color = ?8, interests = ?9, is_main = ?10, avatar = ?11
                 WHERE id = ?1",
                params![
                    character.id.to_string(),
                    character.name,
                    character.age,
                    character.gender,
                    character.skin_tone,
                    character.hair_style,
                    character.hair_color,
                    character.eye_color,
                    interests,
                    character.is_main,
                    character.avatar,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_character(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM characters WHERE id = ?1", [id])? > 0))
    }

    pub fn count_characters(&self) -> Result<u64> {
        self.with_conn(|conn| count(conn, "characters"))
    }

    // -- Categories --

    pub fn insert_category(&self, category: &Category) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO categories (id, name, image, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    category.id.to_string(),
                    category.name,
                    category.image,
                    format_timestamp(category.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_category(&self, id: &str) -> Result<Option<CategoryRow>> {
        self.with_conn(|conn| {
            query_one(
                conn,
                &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"),
                id,
                category_from_row,
            )
        })
    }

    pub fn list_categories(&self) -> Result<Vec<CategoryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([], category_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn replace_category(&self, category: &Category) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE categories SET name = ?2, image = ?3 WHERE id = ?1",
                params![category.id.to_string(), category.name, category.image],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_category(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM categories WHERE id = ?1", [id])? > 0))
    }

    pub fn count_categories(&self) -> Result<u64> {
        self.with_conn(|conn| count(conn, "categories"))
    }
}

fn query_one<T>(
    conn: &Connection,
    sql: &str,
    key: &str,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    Ok(stmt.query_row([key], map).optional()?)
}

/// `table` is always one of the fixed collection names above.
fn count(conn: &Connection, table: &str) -> Result<u64> {
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
    Ok(n as u64)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        name: row.get(3)?,
        status: row.get(4)?,
        role: row.get(5)?,
        coins: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn story_from_row(row: &Row<'_>) -> rusqlite::Result<StoryRow> {
    Ok(StoryRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        segments: row.get(3)?,
        genre: row.get(4)?,
        character_ids: row.get(5)?,
        is_favorite: row.get(6)?,
        is_downloaded: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn character_from_row(row: &Row<'_>) -> rusqlite::Result<CharacterRow> {
    Ok(CharacterRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        age: row.get(3)?,
        gender: row.get(4)?,
        skin_tone: row.get(5)?,
        hair_style: row.get(6)?,
        hair_color: row.get(7)?,
        eye_color: row.get(8)?,
        interests: row.get(9)?,
        is_main: row.get(10)?,
        avatar: row.get(11)?,
        created_at: row.get(12)?,
    })
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<CategoryRow> {
    Ok(CategoryRow {
        id: row.get(0)?,
        name: row.get(1)?,
        image: row.get(2)?,
        created_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use hkili_types::models::{Role, StorySegment, User, UserStatus};
    use uuid::Uuid;

    use super::*;

    fn seed_user(db: &Database, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.create_user(&NewUser {
            id,
            email,
            password_hash: "hash",
            name: Some("Test"),
            role: Role::User,
        })
        .unwrap();
        id
    }

    fn story_for(user_id: Uuid, title: &str, age_secs: i64) -> Story {
        Story {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            segments: vec![StorySegment {
                text: "Once upon a time".into(),
                image: None,
                audio: Some("/uploads/a.mp3".into()),
            }],
            genre: Some("adventure".into()),
            character_ids: vec![Uuid::new_v4()],
            is_favorite: false,
            is_downloaded: false,
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn user_defaults_and_patch() {
        let db = Database::open_in_memory().unwrap();
        let id = seed_user(&db, "kid@example.com");

        let user = User::try_from(db.get_user_by_email("kid@example.com").unwrap().unwrap()).unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.role, Role::User);
        assert_eq!(user.coins, 0);

        let patch = UserPatch {
            status: Some(UserStatus::Blocked),
            coins: Some(40),
            ..Default::default()
        };
        assert!(db.update_user(&id.to_string(), &patch).unwrap());

        let user = User::try_from(db.get_user_by_id(&id.to_string()).unwrap().unwrap()).unwrap();
        assert_eq!(user.status, UserStatus::Blocked);
        assert_eq!(user.coins, 40);
        assert_eq!(user.name.as_deref(), Some("Test"));

        assert!(!db.update_user(&Uuid::new_v4().to_string(), &patch).unwrap());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, "dup@example.com");
        let again = db.create_user(&NewUser {
            id: Uuid::new_v4(),
            email: "dup@example.com",
            password_hash: "hash",
            name: None,
            role: Role::User,
        });
        assert!(crate::is_unique_violation(&again.unwrap_err()));

        let other = anyhow::anyhow!("disk on fire");
        assert!(!crate::is_unique_violation(&other));
    }

    #[test]
    fn stories_round_trip_and_filter_by_owner() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "alice@example.com");
        let bob = seed_user(&db, "bob@example.com");

        let story = story_for(alice, "Dragon", 10);
        db.insert_story(&story).unwrap();
        db.insert_story(&story_for(bob, "Moon", 5)).unwrap();

        let fetched = Story::try_from(db.get_story(&story.id.to_string()).unwrap().unwrap()).unwrap();
        assert_eq!(fetched.segments, story.segments);
        assert_eq!(fetched.character_ids, story.character_ids);

        let all = db.list_stories(None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "Moon");

        let mine = db.list_stories(Some(&alice.to_string())).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "Dragon");
    }

    #[test]
    fn deleting_user_keeps_stories() {
        let db = Database::open_in_memory().unwrap();
        let owner = seed_user(&db, "gone@example.com");
        db.insert_story(&story_for(owner, "Orphan", 0)).unwrap();

        assert!(db.delete_user(&owner.to_string()).unwrap());
        assert!(!db.delete_user(&owner.to_string()).unwrap());
        assert_eq!(db.count_stories().unwrap(), 1);

        let recent = db.recent_stories(5).unwrap();
        assert_eq!(recent.len(), 1);
        assert!(recent[0].user_email.is_none());
    }

    #[test]
    fn recent_stories_are_limited_and_ordered() {
        let db = Database::open_in_memory().unwrap();
        let owner = seed_user(&db, "writer@example.com");
        for i in 0..7 {
            db.insert_story(&story_for(owner, &format!("story-{i}"), 100 - i)).unwrap();
        }

        let recent = db.recent_stories(5).unwrap();
        let titles: Vec<&str> = recent.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["story-6", "story-5", "story-4", "story-3", "story-2"]);
        assert_eq!(recent[0].user_email.as_deref(), Some("writer@example.com"));
    }

    #[test]
    fn patch_story_touches_only_given_fields() {
        let db = Database::open_in_memory().unwrap();
        let owner = seed_user(&db, "flags@example.com");
        let story = story_for(owner, "Flags", 0);
        db.insert_story(&story).unwrap();

        let patch = StoryPatch {
            is_favorite: Some(true),
            ..Default::default()
        };
        assert!(db.patch_story(&story.id.to_string(), &patch).unwrap());

        let row = db.get_story(&story.id.to_string()).unwrap().unwrap();
        assert!(row.is_favorite);
        assert!(!row.is_downloaded);
        assert_eq!(row.title, "Flags");
    }

    #[test]
    fn balances_cover_every_user() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a@example.com");
        seed_user(&db, "b@example.com");
        db.update_user(&a.to_string(), &UserPatch { coins: Some(15), ..Default::default() })
            .unwrap();

        let balances = db.user_balances().unwrap();
        assert_eq!(balances.len(), 2);
        assert_eq!(balances.iter().map(|b| b.coins).sum::<i64>(), 15);
    }
}
