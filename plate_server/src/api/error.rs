use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Handler errors, rendered as `{"error": ...}` bodies.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
    /// The scanner ran and failed; `details` carries its diagnostics.
    ProcessingFailed { details: String },
}

impl From<plate_common::Error> for ApiError {
    fn from(error: plate_common::Error) -> Self {
        match error {
            plate_common::Error::NotFound(what) => ApiError::NotFound(what),
            plate_common::Error::InvalidInput(what) => ApiError::BadRequest(what),
            plate_common::Error::InvalidJson { .. } => {
                ApiError::Internal("Invalid JSON format".to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(error: std::io::Error) -> Self {
        ApiError::Internal(error.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, json!({ "error": message })),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": message }))
            }
            ApiError::ProcessingFailed { details } => {
                tracing::error!(%details, "processing failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Processing failed", "details": details }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
