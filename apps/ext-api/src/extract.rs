//! # Request Extractors
//!
//! Drop-in replacements for axum's `Json`, `Query` and `Path` whose
//! rejections use the `ApiError` body instead of axum's plain text.
//!
//! ```text
//! POST /api/containers/give   body: {"quantity": "two"}
//!
//! axum::Json     → 422 text/plain  "Failed to deserialize the JSON body..."
//! extract::Json  → 400 {"code": "VALIDATION_ERROR", "message": "..."}
//! ```

use axum::extract::{FromRequest, FromRequestParts};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::ApiError;

/// JSON request body, also usable as a response.
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct Query<T>(pub T);

#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct Path<T>(pub T);
