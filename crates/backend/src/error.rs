use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::storage::StorageError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Errors returned by the REST handlers, rendered as the JSON error envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "RESOURCE_NOT_FOUND",
            ApiError::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::new_v4().to_string();
        let message = match &self {
            ApiError::Storage(e) => {
                tracing::error!(%request_id, error = %e, "storage failure");
                "Database operation failed".to_string()
            }
            other => {
                tracing::warn!(%request_id, code = other.code(), "{other}");
                other.to_string()
            }
        };

        let body = json!({
            "error": {
                "code": self.code(),
                "message": message,
                "details": {},
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "request_id": request_id,
            }
        });
        let mut response = (self.status(), Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
}
