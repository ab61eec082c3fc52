//! Target directory and collision-free file naming.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::paths;

/// Stem used when the uploaded name has nothing usable left, e.g. `..`.
const FALLBACK_STEM: &str = "image";

/// A locally staged file waiting to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub name: String,
    pub local_path: PathBuf,
}

impl Image {
    pub fn new(name: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            local_path: local_path.into(),
        }
    }
}

/// Existence check the naming policy uses to detect collisions.
#[async_trait]
pub trait ObjectProbe: Send + Sync {
    async fn exists(&self, filename: &str, dir: &str) -> Result<bool, StorageError>;
}

#[async_trait]
pub trait NamingPolicy: Send + Sync {
    /// Default directory, relative to the storage root, for new uploads.
    fn target_dir(&self) -> String;

    /// Full path under `dir` for `image` that does not collide with an
    /// existing object.
    async fn unique_file_name(
        &self,
        probe: &dyn ObjectProbe,
        image: &Image,
        dir: &str,
    ) -> Result<String, StorageError>;
}

/// `YYYY/MM` directories, `name-N.ext` on collision.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatedNaming;

#[async_trait]
impl NamingPolicy for DatedNaming {
    fn target_dir(&self) -> String {
        Utc::now().format("%Y/%m").to_string()
    }

    async fn unique_file_name(
        &self,
        probe: &dyn ObjectProbe,
        image: &Image,
        dir: &str,
    ) -> Result<String, StorageError> {
        let (stem, ext) = split_extension(base_name(&image.name));
        // `.`, `..` and empty names would resolve to a directory, not a file.
        let (stem, ext) = if stem.chars().all(|c| c == '.') {
            let ext = if ext == "." { "" } else { ext };
            (FALLBACK_STEM.to_string(), ext)
        } else {
            (sanitize(stem), ext)
        };

        let mut attempt: u32 = 0;
        loop {
            let candidate = if attempt == 0 {
                format!("{}{}", stem, ext)
            } else {
                format!("{}-{}{}", stem, attempt, ext)
            };
            if !probe.exists(&candidate, dir).await? {
                return Ok(paths::join(&[dir, candidate.as_str()]));
            }
            attempt += 1;
        }
    }
}

fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Split `photo.final.jpg` into `("photo.final", ".jpg")`. Dotfiles have no extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// Anything other than ASCII word characters, `@` and `.` becomes `-`.
fn sanitize(stem: &str) -> String {
    stem.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '@' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
