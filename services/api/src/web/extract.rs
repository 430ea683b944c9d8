//! services/api/src/web/extract.rs
//!
//! Request extractors whose rejections answer in the API's `{"error": ...}`
//! shape instead of axum's plain-text bodies.

use axum::extract::FromRequest;

use crate::error::HttpError;

/// `axum::Json` with malformed bodies reported as 400.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(HttpError))]
pub struct AppJson<T>(pub T);
