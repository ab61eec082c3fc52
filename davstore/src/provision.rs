//! Directory provisioning on the remote store.
//!
//! WebDAV has no recursive MKCOL, so a target directory is created one
//! collection at a time walking down from the storage root. Each level has to
//! exist before its child can be created, which makes the walk strictly
//! sequential. Nothing is rolled back on failure; ancestors created before the
//! failing level stay in place and a retry picks up where it stopped. A file
//! sitting where a collection is expected stops the walk before any MKCOL.

use tracing::{debug, warn};

use crate::error::{RemoteError, StorageError};
use crate::paths::Sandbox;
use crate::store::{Presence, RemoteStore};

pub struct DirectoryProvisioner<'a> {
    sandbox: &'a Sandbox,
    store: &'a RemoteStore,
}

impl<'a> DirectoryProvisioner<'a> {
    pub fn new(sandbox: &'a Sandbox, store: &'a RemoteStore) -> Self {
        Self { sandbox, store }
    }

    /// Make sure every collection between the root and `target_dir` exists.
    pub async fn ensure_directory(&self, target_dir: &str) -> Result<(), StorageError> {
        let target = self.sandbox.check(target_dir)?;
        let segments = self.sandbox.segments(&target)?;

        let mut dir_path = self.sandbox.root().trim_end_matches('/').to_string();
        for segment in segments {
            dir_path.push('/');
            dir_path.push_str(segment);

            match self.store.probe(&dir_path).await {
                Presence::Found(stat) if stat.is_collection => continue,
                Presence::Found(_) => return Err(RemoteError::NotACollection(dir_path).into()),
                Presence::Absent => {}
                Presence::Failed(e) => {
                    warn!(path = %dir_path, error = %e, "stat failed, attempting creation")
                }
            }
            match self.store.create_directory(&dir_path).await {
                Ok(()) => debug!(path = %dir_path, "Created remote directory"),
                // Lost a race with a concurrent creator; the directory is there.
                Err(e) if e.is_already_exists() => {
                    debug!(path = %dir_path, "Remote directory appeared concurrently")
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
