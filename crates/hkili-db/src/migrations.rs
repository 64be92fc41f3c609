use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Collections have no foreign keys between them: deleting a user must
/// leave that user's stories in place.
pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial collections)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                name        TEXT,
                status      TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'blocked')),
                role        TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
                coins       INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE stories (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL,
                title           TEXT NOT NULL,
                segments        TEXT NOT NULL DEFAULT '[]',
                genre           TEXT,
                character_ids   TEXT NOT NULL DEFAULT '[]',
                is_favorite     INTEGER NOT NULL DEFAULT 0,
                is_downloaded   INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_stories_user
                ON stories(user_id, created_at);

            CREATE TABLE characters (
                id          TEXT PRIMARY KEY,
                user_id     TEXT,
                name        TEXT NOT NULL,
                age         INTEGER,
                gender      TEXT,
                skin_tone   TEXT,
                hair_style  TEXT,
                hair_color  TEXT,
                eye_color   TEXT,
                interests   TEXT NOT NULL DEFAULT '[]',
                is_main     INTEGER NOT NULL DEFAULT 0,
                avatar      TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_characters_user
                ON characters(user_id);

            CREATE TABLE categories (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                image       TEXT,
                created_at  TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
