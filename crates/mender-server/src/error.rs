//! HTTP error mapping for handlers

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mender_core::MenderError;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// Unknown run id
    NotFound,
    Internal(String),
}

impl From<MenderError> for ApiError {
    fn from(error: MenderError) -> Self {
        match error {
            MenderError::Other(message) | MenderError::Config(message) => {
                Self::BadRequest(message)
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "error", "message": message })),
            )
                .into_response(),
            // The dashboard polls on this exact body
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "status": "not_found" })),
            )
                .into_response(),
            Self::Internal(message) => {
                tracing::error!("Request failed: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "status": "error", "message": message })),
                )
                    .into_response()
            }
        }
    }
}
