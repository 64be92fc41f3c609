use axum::extract::FromRequest;

use crate::error::ApiError;

/// `axum::Json` whose rejections (bad syntax, missing fields, wrong enum
/// values) come back as 400 with the usual error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
