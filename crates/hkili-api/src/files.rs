use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use uuid::Uuid;

use hkili_types::api::UploadResponse;

use crate::error::{ApiError, ApiResult};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Public prefix the upload directory is served under.
pub const UPLOADS_ROUTE: &str = "/uploads";

/// 50 MB upload limit for files
pub const MAX_UPLOAD_SIZE: usize = 50 * 1024 * 1024;

/// POST /api/upload: stores the first file field of a multipart body under
/// a generated unique name and returns its relative URL.
pub async fn upload_file(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let Some(original) = field.file_name().map(str::to_string) else {
            continue;
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        let stored_name = unique_name(&original);
        let dir = &state.config.upload_dir;
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            error!("Failed to create upload directory {}: {}", dir.display(), e);
            ApiError::Internal(e.into())
        })?;

        let path = dir.join(&stored_name);
        let mut file = tokio::fs::File::create(&path).await.map_err(|e| {
            error!("Failed to create file {}: {}", path.display(), e);
            ApiError::Internal(e.into())
        })?;
        file.write_all(&data).await.map_err(|e| {
            error!("Failed to write file {}: {}", path.display(), e);
            ApiError::Internal(e.into())
        })?;
        file.flush().await.map_err(|e| ApiError::Internal(e.into()))?;

        info!("Admin {} uploaded {} ({} bytes)", admin.id, stored_name, data.len());
        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                url: format!("{UPLOADS_ROUTE}/{stored_name}"),
            }),
        ));
    }

    Err(ApiError::BadRequest("No file received".into()))
}

/// `<unix millis>-<8 hex>-<sanitized name>`
fn unique_name(original: &str) -> String {
    let tag = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        &tag[..8],
        sanitize_filename(original)
    )
}

/// Keeps ASCII alphanumerics, `.`, `-` and `_`; anything else (path
/// separators included) becomes `_`. Leading dots are dropped so the result
/// can never be hidden or `..`.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}
