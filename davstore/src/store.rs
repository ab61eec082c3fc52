//! Remote object store facade.
//!
//! Thin layer over a [`RemoteTransport`] that keeps the three-way outcome of
//! existence checks and deletes for logging, while callers get the boolean
//! contract: any failure reads as "absent" / "not deleted".

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::backend::{ByteStream, ObjectStat, RemoteTransport};
use crate::error::RemoteError;

/// Outcome of a `stat` before it is collapsed to a boolean.
#[derive(Debug)]
pub enum Presence {
    Found(ObjectStat),
    Absent,
    Failed(RemoteError),
}

impl Presence {
    pub fn is_found(&self) -> bool {
        matches!(self, Presence::Found(_))
    }
}

#[derive(Clone)]
pub struct RemoteStore {
    transport: Arc<dyn RemoteTransport>,
}

impl RemoteStore {
    pub fn new(transport: Arc<dyn RemoteTransport>) -> Self {
        Self { transport }
    }

    pub async fn probe(&self, path: &str) -> Presence {
        match self.transport.stat(path).await {
            Ok(stat) => Presence::Found(stat),
            Err(e) if e.is_not_found() => Presence::Absent,
            Err(e) => Presence::Failed(e),
        }
    }

    /// Transport failures are reported as absence.
    pub async fn exists(&self, path: &str) -> bool {
        match self.probe(path).await {
            Presence::Found(_) => true,
            Presence::Absent => false,
            Presence::Failed(e) => {
                warn!(path = %path, error = %e, "stat failed, treating as absent");
                false
            }
        }
    }

    pub async fn create_directory(&self, path: &str) -> Result<(), RemoteError> {
        self.transport.create_directory(path).await
    }

    pub async fn write(&self, path: &str, data: Bytes) -> Result<(), RemoteError> {
        self.transport.put_file_contents(path, data).await
    }

    pub async fn read_all(&self, path: &str) -> Result<Bytes, RemoteError> {
        self.transport.get_file_contents(path).await
    }

    pub async fn try_delete(&self, path: &str) -> Result<(), RemoteError> {
        self.transport.delete_file(path).await
    }

    /// `false` for both an already absent object and a failed request.
    pub async fn delete(&self, path: &str) -> bool {
        match self.try_delete(path).await {
            Ok(()) => true,
            Err(e) if e.is_not_found() => {
                debug!(path = %path, "delete of absent object");
                false
            }
            Err(e) => {
                warn!(path = %path, error = %e, "delete failed");
                false
            }
        }
    }

    pub async fn open_read_stream(&self, path: &str) -> Result<ByteStream, RemoteError> {
        self.transport.create_read_stream(path).await
    }
}
