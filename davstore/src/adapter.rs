//! Image storage on a WebDAV share.
//!
//! `ImageStorage` is what a host embeds: it owns the sandbox, the remote store
//! facade and the naming policy, and exposes `exists`, `save`, `save_raw`,
//! `read`, `delete` and `serve` (see `serve.rs`). Stored paths live under the
//! root prefix; the URIs handed back to callers live under the public prefix.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::backend::RemoteTransport;
use crate::config::{DavConfig, StorageConfig};
use crate::error::{ContainmentError, StorageError};
use crate::naming::{DatedNaming, Image, NamingPolicy, ObjectProbe};
use crate::paths::{self, Sandbox};
use crate::provision::DirectoryProvisioner;
use crate::store::RemoteStore;
use crate::webdav::WebDavTransport;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadOptions {
    /// Path relative to the storage root.
    #[serde(default)]
    pub path: String,
}

impl ReadOptions {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

pub struct ImageStorage {
    pub(crate) sandbox: Sandbox,
    /// The public prefix, used the same way the sandbox uses the root.
    public: Sandbox,
    pub(crate) store: RemoteStore,
    naming: Arc<dyn NamingPolicy>,
}

impl ImageStorage {
    pub fn new(config: &StorageConfig, transport: Arc<dyn RemoteTransport>) -> Self {
        Self {
            sandbox: Sandbox::new(&config.root_prefix),
            public: Sandbox::new(&config.public_prefix),
            store: RemoteStore::new(transport),
            naming: Arc::new(DatedNaming),
        }
    }

    /// Resolve `config` (explicit values first, `WEBDAV_*` environment as
    /// fallback) and connect to the configured WebDAV server.
    pub fn connect(config: DavConfig) -> Result<Self, StorageError> {
        let resolved = config.resolve()?;
        let transport = WebDavTransport::from_config(&resolved)?;
        info!(
            url = %resolved.url,
            root = %resolved.root_prefix,
            public = %resolved.public_prefix,
            "WebDAV image storage configured"
        );
        Ok(Self::new(&resolved, Arc::new(transport)))
    }

    pub fn with_naming(mut self, naming: Arc<dyn NamingPolicy>) -> Self {
        self.naming = naming;
        self
    }

    pub fn root_prefix(&self) -> &str {
        self.sandbox.root()
    }

    pub fn public_prefix(&self) -> &str {
        self.public.root()
    }

    /// Default upload directory, relative to the root.
    pub fn target_dir(&self) -> String {
        self.naming.target_dir()
    }

    /// Public URI for a stored path, `None` if the path is outside the root.
    pub fn public_uri(&self, stored_path: &str) -> Option<String> {
        let rel = self.sandbox.relative(stored_path)?;
        Some(paths::join(&[self.public.root(), rel]))
    }

    /// Inverse of [`public_uri`](Self::public_uri).
    pub fn stored_path(&self, public_uri: &str) -> Option<String> {
        let rel = self.public.relative(&paths::normalize(public_uri))?.to_string();
        self.sandbox.resolve_under_root(&rel).ok()
    }

    /// Check for `filename` inside `dir` (an absolute path, the root by default).
    ///
    /// Escaping the root is an error; transport failures read as `false`.
    pub async fn exists(&self, filename: &str, dir: Option<&str>) -> Result<bool, StorageError> {
        let dir = dir.unwrap_or(self.sandbox.root());
        let path = self.sandbox.resolve(dir, filename)?;
        Ok(self.store.exists(&path).await)
    }

    /// Store a staged local file under `dir` (relative to the root, the
    /// naming policy's target directory by default) and return its public URI.
    pub async fn save(&self, image: &Image, dir: Option<&str>) -> Result<String, StorageError> {
        let dir = match dir {
            Some(d) => d.to_string(),
            None => self.naming.target_dir(),
        };
        let dir_path = self.sandbox.resolve_under_root(&dir)?;

        let (target, data) = tokio::try_join!(
            self.naming.unique_file_name(self, image, &dir_path),
            read_local(&image.local_path),
        )?;
        debug!(name = %image.name, target = %target, bytes = data.len(), "Saving image");

        self.save_raw(data, &target).await
    }

    /// Write `data` at `target_path` and return its public URI.
    ///
    /// A target that is not already under the root is rooted first. The parent
    /// directories are provisioned before the write.
    pub async fn save_raw(&self, data: Bytes, target_path: &str) -> Result<String, StorageError> {
        let rooted = if self.sandbox.contains(target_path) {
            target_path.to_string()
        } else {
            format!("{}/{}", self.sandbox.root(), target_path)
        };
        let path = self.sandbox.check(&rooted)?;
        let (parent, _) = paths::split_parent(&path).ok_or_else(|| self.escape(&path))?;

        DirectoryProvisioner::new(&self.sandbox, &self.store)
            .ensure_directory(parent)
            .await?;
        self.store.write(&path, data).await?;

        let uri = self.public_uri(&path).ok_or_else(|| self.escape(&path))?;
        info!(path = %path, uri = %uri, "Stored object");
        Ok(uri)
    }

    /// Read a whole object. `options.path` is relative to the root; one
    /// trailing separator is ignored.
    pub async fn read(&self, options: &ReadOptions) -> Result<Bytes, StorageError> {
        let rel = strip_trailing_separator(&options.path);
        let path = self.sandbox.resolve_under_root(rel)?;
        Ok(self.store.read_all(&path).await?)
    }

    /// Best-effort delete of `dir/filename` (dir relative to the root, the
    /// naming policy's target directory by default). Never errors: `false`
    /// covers "already gone", transport failures and paths outside the root.
    pub async fn delete(&self, filename: &str, dir: Option<&str>) -> bool {
        let dir = match dir {
            Some(d) => d.to_string(),
            None => self.naming.target_dir(),
        };
        match self.sandbox.check(&paths::join(&[self.sandbox.root(), dir.as_str(), filename])) {
            Ok(path) => self.store.delete(&path).await,
            Err(e) => {
                warn!(error = %e, "Refusing delete outside storage root");
                false
            }
        }
    }

    fn escape(&self, path: &str) -> ContainmentError {
        ContainmentError {
            root: self.sandbox.root().to_string(),
            path: path.to_string(),
        }
    }
}

#[async_trait]
impl ObjectProbe for ImageStorage {
    async fn exists(&self, filename: &str, dir: &str) -> Result<bool, StorageError> {
        ImageStorage::exists(self, filename, Some(dir)).await
    }
}

async fn read_local(path: &Path) -> Result<Bytes, StorageError> {
    tokio::fs::read(path)
        .await
        .map(Bytes::from)
        .map_err(|source| StorageError::LocalIo {
            path: path.to_path_buf(),
            source,
        })
}

fn strip_trailing_separator(path: &str) -> &str {
    path.strip_suffix('/')
        .or_else(|| path.strip_suffix('\\'))
        .unwrap_or(path)
}
