//! One-shot setup: insert the seed administrator if the email is free.

use std::path::PathBuf;

use anyhow::{Context, bail};
use tracing::info;

use hkili_api::auth::seed_admin;
use hkili_db::Database;

const DEFAULT_ADMIN_EMAIL: &str = "admin@hkili.com";

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hkili_seed_admin=info,hkili_db=info".into()),
        )
        .init();

    let db_path: PathBuf = std::env::var("HKILI_DB_PATH")
        .unwrap_or_else(|_| "hkili.db".into())
        .into();
    let email = std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| DEFAULT_ADMIN_EMAIL.into());
    let password = std::env::var("ADMIN_PASSWORD").context("ADMIN_PASSWORD must be set")?;
    if password.is_empty() {
        bail!("ADMIN_PASSWORD must not be empty");
    }

    let db = Database::open(&db_path)?;
    match seed_admin(&db, &email, &password)? {
        Some(id) => info!("Seeded admin {} ({})", email, id),
        None => info!("Admin {} already exists, nothing to do", email),
    }
    Ok(())
}
