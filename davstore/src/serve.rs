use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::{debug, warn};

use crate::adapter::ImageStorage;
use crate::error::StorageError;

/// Error behind a failed `serve` response, attached as a response extension
/// so outer layers (logging, custom error pages) can inspect it.
#[derive(Debug, Clone)]
pub struct ServeFailure(pub Arc<StorageError>);

impl ImageStorage {
    /// Router that streams stored objects back to the client.
    ///
    /// The request path is taken relative to the storage root, so hosts nest
    /// this router under the public prefix. Object bodies are piped through
    /// as they arrive from the WebDAV server.
    pub fn serve(self: Arc<Self>) -> Router {
        Router::new()
            .route("/{*path}", get(serve_object))
            .with_state(self)
    }
}

async fn serve_object(
    State(storage): State<Arc<ImageStorage>>,
    Path(path): Path<String>,
) -> Response {
    let stored = match storage.sandbox.resolve_under_root(&path) {
        Ok(p) => p,
        Err(e) => return not_found(e.into()),
    };

    let stream = match storage.store.open_read_stream(&stored).await {
        Ok(s) => s,
        Err(e) => return not_found(e.into()),
    };
    debug!(path = %stored, "Streaming stored object");

    let mime = mime_guess::from_path(&stored).first_or_octet_stream();
    (
        [(header::CONTENT_TYPE, mime.essence_str().to_string())],
        Body::from_stream(stream),
    )
        .into_response()
}

fn not_found(error: StorageError) -> Response {
    warn!(error = %error, "Failed to serve stored object");
    let mut resp = StatusCode::NOT_FOUND.into_response();
    resp.extensions_mut().insert(ServeFailure(Arc::new(error)));
    resp
}
