use std::sync::Arc;
use std::time::Instant;

use davstore::ImageStorage;

/// Shared application state
pub struct AppState {
    pub storage: Arc<ImageStorage>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(storage: Arc<ImageStorage>) -> Self {
        Self {
            storage,
            started_at: Instant::now(),
        }
    }
}
