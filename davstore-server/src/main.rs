mod config;
mod handlers;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use davstore::ImageStorage;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::ServerConfig;
use state::AppState;

const DEFAULT_CONFIG_PATH: &str = "davstore.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    info!("davstore-server starting");

    // An explicit path must exist; the default one is optional so a purely
    // environment-configured deployment still starts.
    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::load(&PathBuf::from(path))?,
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                ServerConfig::load(&default_path)?
            } else {
                ServerConfig::default()
            }
        }
    };

    let port: u16 = std::env::var("DAVSTORE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(config.port);

    let storage = Arc::new(ImageStorage::connect(config.webdav.clone())?);
    if storage.public_prefix() == "/" {
        anyhow::bail!("public prefix must not be the site root");
    }

    let state = Arc::new(AppState::new(storage));
    let app = routes::build_router(state, config.max_upload_bytes).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port = port, "Listening on http://0.0.0.0:{}", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
