//! HTTP response helpers and the `AppError` → status-code mapping

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::errors::{AppError, SourceError};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Source(source) => match source {
                SourceError::Timeout { .. }
                | SourceError::AuthenticationFailed { .. }
                | SourceError::UpstreamStatus { .. } => StatusCode::BAD_GATEWAY,
                SourceError::Parse { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            },
            AppError::Store { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Http(_) => StatusCode::BAD_GATEWAY,
            AppError::Configuration { .. } | AppError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// 200 with a JSON body
pub fn ok<T: serde::Serialize>(body: T) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

/// 201 with a JSON body
pub fn created<T: serde::Serialize>(body: T) -> Response {
    (StatusCode::CREATED, Json(body)).into_response()
}

/// 204 without a body
pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
