use std::path::PathBuf;

/// A resolved path fell outside the configured storage root.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Path escapes storage root {root}: {path}")]
pub struct ContainmentError {
    pub root: String,
    pub path: String,
}

/// Failure reported by the remote WebDAV server or the HTTP layer underneath it.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("Not a collection: {0}")]
    NotACollection(String),
    #[error("WebDAV error: HTTP {status} - {reason}")]
    Server { status: u16, reason: String },
    /// Failures from non-HTTP transports (in-memory stores, test doubles).
    #[error("Transport error: {0}")]
    Transport(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, RemoteError::AlreadyExists(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("A URL to the WebDAV server is required (set `url` or WEBDAV_SERVER_URL)")]
    MissingUrl,
    #[error("Invalid WebDAV server URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    Containment(#[from] ContainmentError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("Failed to read {}: {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = StorageError> = std::result::Result<T, E>;
