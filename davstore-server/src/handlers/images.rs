use std::io::Write;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use davstore::Image;
use serde::Deserialize;
use tracing::{info, warn};

use super::{error_json, storage_error};
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct UploadQuery {
    /// Directory relative to the storage root; defaults to `YYYY/MM`.
    pub dir: Option<String>,
}

// ── PUT /api/upload/{name} ──

pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> impl IntoResponse {
    if body.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(error_json("empty_body", "Upload body is empty")));
    }

    // Held until `save` returns; the file is removed on drop.
    let staged = match stage(body).await {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "Failed to stage upload");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_json("staging_failed", &e.to_string())),
            );
        }
    };

    let image = Image::new(name, staged.path());
    match state.storage.save(&image, query.dir.as_deref()).await {
        Ok(url) => {
            info!(name = %image.name, url = %url, "Image uploaded");
            (StatusCode::CREATED, Json(serde_json::json!({ "url": url })))
        }
        Err(e) => {
            let (status, body) = storage_error(&e);
            (status, Json(body))
        }
    }
}

// ── GET /api/exists/{*path} ──

pub async fn image_exists(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> impl IntoResponse {
    let (dir, filename) = split_object_path(&path);
    let dir = format!("{}/{}", state.storage.root_prefix(), dir);
    match state.storage.exists(filename, Some(&dir)).await {
        Ok(exists) => (StatusCode::OK, Json(serde_json::json!({ "exists": exists }))),
        Err(e) => {
            let (status, body) = storage_error(&e);
            (status, Json(body))
        }
    }
}

// ── DELETE /api/objects/{*path} ──

pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> impl IntoResponse {
    let (dir, filename) = split_object_path(&path);
    let deleted = state.storage.delete(filename, Some(dir)).await;
    (StatusCode::OK, Json(serde_json::json!({ "deleted": deleted })))
}

/// Write the body to a temp file off the async workers.
async fn stage(body: Bytes) -> std::io::Result<tempfile::NamedTempFile> {
    tokio::task::spawn_blocking(move || {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(&body)?;
        file.flush()?;
        Ok::<_, std::io::Error>(file)
    })
    .await?
}

/// `2024/05/x.jpg` → (`2024/05`, `x.jpg`); a bare name has an empty directory.
fn split_object_path(path: &str) -> (&str, &str) {
    let path = path.trim_matches('/');
    match path.rsplit_once('/') {
        Some((dir, name)) => (dir, name),
        None => ("", path),
    }
}
