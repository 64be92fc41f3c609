use axum::{Json, extract::State};
use sha1::{Digest, Sha1};
use tracing::debug;

use hkili_types::api::UploadSignature;

use crate::error::{ApiError, ApiResult};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// GET /api/cloudinary-sign: credentials for one direct upload to the
/// asset host, valid for the returned timestamp.
pub async fn cloudinary_sign(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> ApiResult<Json<UploadSignature>> {
    let cloud = state.config.cloudinary.as_ref().ok_or_else(|| {
        ApiError::Internal(anyhow::anyhow!("asset host credentials are not configured"))
    })?;

    let timestamp = chrono::Utc::now().timestamp();
    let signature = sign_params(
        &[("folder", cloud.folder.clone()), ("timestamp", timestamp.to_string())],
        &cloud.api_secret,
    );
    debug!("Issued upload signature for admin {}", admin.id);

    Ok(Json(UploadSignature {
        signature,
        timestamp,
        api_key: cloud.api_key.clone(),
        cloud_name: cloud.cloud_name.clone(),
        folder: cloud.folder.clone(),
    }))
}

/// SHA-1 hex of `k1=v1&k2=v2...` (keys sorted) with the secret appended.
pub fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_known_digest() {
        // sha1("public_id=sample_image&timestamp=1315060510abcd")
        let sig = sign_params(
            &[
                ("timestamp", "1315060510".to_string()),
                ("public_id", "sample_image".to_string()),
            ],
            "abcd",
        );
        assert_eq!(sig, "b4ad47fb4e25c7bf5f92a20089f9db59bc302313");
    }

    #[test]
    fn order_of_params_does_not_matter() {
        let a = sign_params(&[("a", "1".into()), ("b", "2".into())], "s");
        let b = sign_params(&[("b", "2".into()), ("a", "1".into())], "s");
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
    }
}
