use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use cove_crypto::CryptoError;

/// Failure taxonomy for the pipelines, mapped onto HTTP status codes.
///
/// The distinctions matter to clients: `DecryptionFailed` is server-side
/// data corruption (500), never to be confused with `AccessDenied` (403) or
/// `NotFound` (404). Metadata-extraction failures never appear here — they
/// are swallowed inside the pipeline with a log line.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("file not found")]
    NotFound,

    #[error("access denied")]
    AccessDenied,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("file too large")]
    TooLarge,

    #[error("decryption failed")]
    DecryptionFailed(#[source] CryptoError),

    #[error("upload failed")]
    UploadFailed(#[source] anyhow::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for DriveError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            DriveError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            DriveError::AccessDenied => (StatusCode::FORBIDDEN, self.to_string()),
            DriveError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            DriveError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            DriveError::TooLarge => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            DriveError::DecryptionFailed(cause) => {
                error!("decryption failed: {cause}");
                (StatusCode::INTERNAL_SERVER_ERROR, "decryption failed".into())
            }
            DriveError::UploadFailed(cause) => {
                error!("upload failed: {cause:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, "failed to upload file".into())
            }
            DriveError::Internal(cause) => {
                error!("internal error: {cause:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, "server error".into())
            }
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}
