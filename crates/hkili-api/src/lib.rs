pub mod auth;
pub mod categories;
pub mod characters;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod extract;
pub mod files;
pub mod media;
pub mod middleware;
pub mod router;
pub mod state;
pub mod stories;
pub mod users;

pub use router::build_router;
pub use state::{AppState, AppStateInner};
