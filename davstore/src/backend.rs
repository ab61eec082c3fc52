use std::pin::Pin;

use bytes::Bytes;
use futures_util::stream::Stream;

use crate::error::RemoteError;

/// Streamed object body. Errors after the first chunk surface as stream items.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, RemoteError>> + Send>>;

/// Metadata returned by a successful `stat`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectStat {
    pub is_collection: bool,
    pub content_length: Option<u64>,
}

/// Directory/file protocol spoken by the remote store.
///
/// Paths are absolute, normalized and `/`-separated; they have already passed
/// the sandbox by the time a transport sees them. Implementations report a
/// missing object as `RemoteError::NotFound` and a directory that already
/// exists as `RemoteError::AlreadyExists`.
#[async_trait::async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn stat(&self, path: &str) -> Result<ObjectStat, RemoteError>;

    async fn create_directory(&self, path: &str) -> Result<(), RemoteError>;

    async fn put_file_contents(&self, path: &str, data: Bytes) -> Result<(), RemoteError>;

    async fn get_file_contents(&self, path: &str) -> Result<Bytes, RemoteError>;

    async fn delete_file(&self, path: &str) -> Result<(), RemoteError>;

    /// Open a streaming read. An absent or unreachable object fails here,
    /// before any bytes are produced.
    async fn create_read_stream(&self, path: &str) -> Result<ByteStream, RemoteError>;
}
