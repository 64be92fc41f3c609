use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use hkili_types::api::HealthResponse;

use crate::files::{MAX_UPLOAD_SIZE, UPLOADS_ROUTE};
use crate::middleware::admin_gate;
use crate::state::AppState;
use crate::{auth, categories, characters, dashboard, files, media, stories, users};

/// Every route of the service. Guards live in the handlers' extractors,
/// except the admin pages which sit behind [`admin_gate`].
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/me", get(auth::me))
        .route("/api/stories", get(stories::list_stories).post(stories::create_story))
        .route(
            "/api/stories/{id}",
            get(stories::get_story)
                .put(stories::replace_story)
                .patch(stories::patch_story)
                .delete(stories::delete_story),
        )
        .route(
            "/api/characters",
            get(characters::list_characters).post(characters::create_character),
        )
        .route(
            "/api/characters/{id}",
            get(characters::get_character)
                .put(characters::replace_character)
                .delete(characters::delete_character),
        )
        .route("/api/users", get(users::list_users))
        .route("/api/users/{id}", patch(users::update_user).delete(users::delete_user))
        .route(
            "/api/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/api/categories/{id}",
            put(categories::replace_category).delete(categories::delete_category),
        )
        .route("/api/dashboard", get(dashboard::get_dashboard))
        .route(
            "/api/upload",
            post(files::upload_file).layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE)),
        )
        .route("/api/cloudinary-sign", get(media::cloudinary_sign))
        .route("/health", get(health));

    // route_layer keeps the gate off this router's fallback, which `merge`
    // would otherwise adopt for every unmatched path.
    let admin_pages = Router::new()
        .nest_service("/admin", ServeDir::new(&state.config.admin_dir))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_gate));

    Router::new()
        .merge(api)
        .merge(admin_pages)
        .nest_service(UPLOADS_ROUTE, ServeDir::new(&state.config.upload_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}
