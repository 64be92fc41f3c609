use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// One year.
const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

/// Credentials for signed uploads straight to the asset host.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// One secret signs and verifies every token: admin and mobile routes
    /// share a single authentication domain.
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub admin_dir: PathBuf,
    pub cloudinary: Option<CloudinaryConfig>,
}

impl Config {
    /// Reads `HKILI_*` and `CLOUDINARY_*` variables. Call `dotenvy::dotenv()`
    /// first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("HKILI_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("HKILI_JWT_SECRET is unset or still a placeholder");
        }

        let token_ttl_hours =
            parse_token_ttl(std::env::var("HKILI_TOKEN_TTL_HOURS").ok().as_deref())?;

        let port: u16 = std::env::var("HKILI_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .context("HKILI_PORT must be a port number")?;

        Ok(Self {
            jwt_secret,
            token_ttl_hours,
            db_path: env_or("HKILI_DB_PATH", "hkili.db").into(),
            host: env_or("HKILI_HOST", "0.0.0.0"),
            port,
            upload_dir: env_or("HKILI_UPLOAD_DIR", "./uploads").into(),
            admin_dir: env_or("HKILI_ADMIN_DIR", "./admin").into(),
            cloudinary: cloudinary_from_env(),
        })
    }
}

/// Unset means the default; anything else must be a whole number of hours
/// between 1 and `MAX_TOKEN_TTL_HOURS`.
fn parse_token_ttl(raw: Option<&str>) -> Result<i64> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_TOKEN_TTL_HOURS);
    };
    let hours: i64 = raw
        .trim()
        .parse()
        .context("HKILI_TOKEN_TTL_HOURS must be an integer")?;
    if !(1..=MAX_TOKEN_TTL_HOURS).contains(&hours) {
        bail!("HKILI_TOKEN_TTL_HOURS must be between 1 and {MAX_TOKEN_TTL_HOURS}, got {hours}");
    }
    Ok(hours)
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

/// All three credentials must be present; the folder has a default.
fn cloudinary_from_env() -> Option<CloudinaryConfig> {
    let cloud_name = std::env::var("CLOUDINARY_CLOUD_NAME").ok()?;
    let api_key = std::env::var("CLOUDINARY_API_KEY").ok()?;
    let api_secret = std::env::var("CLOUDINARY_API_SECRET").ok()?;
    Some(CloudinaryConfig {
        cloud_name,
        api_key,
        api_secret,
        folder: env_or("CLOUDINARY_FOLDER", "hkili"),
    })
}
