pub mod images;
pub mod system;

use axum::http::StatusCode;
use davstore::{RemoteError, StorageError};

fn error_json(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({ "error": { "code": code, "message": message } })
}

/// Status and error body for a failed storage operation.
pub(crate) fn storage_error(e: &StorageError) -> (StatusCode, serde_json::Value) {
    let (status, code) = match e {
        StorageError::Containment(_) => (StatusCode::BAD_REQUEST, "outside_root"),
        StorageError::Remote(r) if r.is_not_found() => (StatusCode::NOT_FOUND, "not_found"),
        StorageError::Remote(RemoteError::NotACollection(_)) => {
            (StatusCode::CONFLICT, "not_a_directory")
        }
        StorageError::Remote(_) => (StatusCode::BAD_GATEWAY, "webdav_error"),
        StorageError::LocalIo { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "staging_failed"),
        StorageError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "misconfigured"),
    };
    (status, error_json(code, &e.to_string()))
}
