use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use filedrop_common::StoreError;

/// Errors returned to HTTP callers.
///
/// Not-found variants answer with a plain-text body; everything else is a
/// JSON object of the form `{"error": "<message>"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("User not found")]
    MissingIdentity,
    #[error("{0}")]
    BadRequest(String),
    #[error("File too large (max: {max} bytes)")]
    TooLarge { max: usize },
    #[error("File not found")]
    FileNotFound,
    #[error("Directory not found")]
    DirectoryNotFound,
    #[error("Storage operation failed")]
    Storage(#[source] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MissingIdentity => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::FileNotFound | Self::DirectoryNotFound => {
                return (StatusCode::NOT_FOUND, self.to_string()).into_response();
            }
            Self::Storage(e) => {
                error!(error = %e, "Storage operation failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(error_json(&self.to_string()))).into_response()
    }
}

pub fn error_json(message: &str) -> serde_json::Value {
    serde_json::json!({ "error": message })
}
