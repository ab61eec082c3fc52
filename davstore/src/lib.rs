//! WebDAV-backed image storage.
//!
//! Saves, reads, deletes and serves binary assets on a WebDAV share while
//! keeping every remote path inside a configured root prefix, and hands out
//! URIs under a separate public prefix.

pub mod adapter;
pub mod backend;
pub mod config;
pub mod error;
pub mod memory;
pub mod naming;
pub mod paths;
pub mod provision;
pub mod serve;
pub mod store;
pub mod webdav;

pub use adapter::{ImageStorage, ReadOptions};
pub use backend::{ByteStream, ObjectStat, RemoteTransport};
pub use config::{DavConfig, StorageConfig};
pub use error::{ConfigError, ContainmentError, RemoteError, StorageError};
pub use naming::{DatedNaming, Image, NamingPolicy, ObjectProbe};
pub use serve::ServeFailure;
pub use webdav::WebDavTransport;
