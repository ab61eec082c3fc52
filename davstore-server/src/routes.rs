use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, put};
use axum::Router;

use crate::handlers::{images, system};
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    let api = Router::new()
        .route("/api/health", get(system::health))
        .route("/api/upload/{name}", put(images::upload_image))
        .route("/api/exists/{*path}", get(images::image_exists))
        .route("/api/objects/{*path}", delete(images::delete_image))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(Arc::clone(&state));

    let public_prefix = state.storage.public_prefix().to_string();
    api.nest(&public_prefix, Arc::clone(&state.storage).serve())
}
