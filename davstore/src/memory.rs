//! In-memory WebDAV stand-in.
//!
//! Behaves like a strict WebDAV server: MKCOL and PUT need an existing parent
//! collection, MKCOL on an existing resource reports "already exists". Every
//! call is recorded in order so tests can assert on the exact protocol
//! traffic, and failures can be injected per operation and path.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;

use crate::backend::{ByteStream, ObjectStat, RemoteTransport};
use crate::error::RemoteError;
use crate::paths;

const STREAM_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Stat,
    CreateDirectory,
    Put,
    Get,
    Delete,
    Stream,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    pub path: String,
}

#[derive(Default)]
struct State {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Bytes>,
    calls: Vec<Call>,
    failures: HashSet<(Op, String)>,
}

pub struct MemoryTransport {
    state: Mutex<State>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        let mut state = State::default();
        state.dirs.insert("/".to_string());
        Self { state: Mutex::new(state) }
    }

    /// Create a collection and all of its ancestors without recording calls.
    pub fn insert_dir(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        let mut acc = String::new();
        for seg in paths::normalize(path).split('/').filter(|s| !s.is_empty()) {
            acc.push('/');
            acc.push_str(seg);
            state.dirs.insert(acc.clone());
        }
    }

    /// Store a file, creating its parent collections, without recording calls.
    pub fn insert_file(&self, path: &str, data: impl Into<Bytes>) {
        let path = paths::normalize(path);
        if let Some((parent, _)) = paths::split_parent(&path) {
            self.insert_dir(parent);
        }
        self.state.lock().unwrap().files.insert(path, data.into());
    }

    pub fn fail_on(&self, op: Op, path: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert((op, path.to_string()));
    }

    pub fn contains(&self, path: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.files.contains_key(path) || state.dirs.contains(path)
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.state.lock().unwrap().dirs.contains(path)
    }

    pub fn file(&self, path: &str) -> Option<Bytes> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_of(&self, op: Op) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.op == op)
            .map(|c| c.path)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Record the call and apply any injected failure.
    async fn begin(&self, op: Op, path: &str) -> Result<(), RemoteError> {
        // Let concurrently joined futures interleave at every remote call.
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call {
            op,
            path: path.to_string(),
        });
        if state.failures.contains(&(op, path.to_string())) {
            return Err(RemoteError::Transport(format!("injected {:?} failure: {}", op, path)));
        }
        Ok(())
    }
}

fn parent_is_dir(state: &State, path: &str) -> bool {
    paths::split_parent(path)
        .map(|(parent, _)| state.dirs.contains(parent))
        .unwrap_or(false)
}

fn missing_parent(path: &str) -> RemoteError {
    RemoteError::Server {
        status: 409,
        reason: format!("parent collection missing: {}", path),
    }
}

#[async_trait]
impl RemoteTransport for MemoryTransport {
    async fn stat(&self, path: &str) -> Result<ObjectStat, RemoteError> {
        self.begin(Op::Stat, path).await?;
        let state = self.state.lock().unwrap();
        if state.dirs.contains(path) {
            return Ok(ObjectStat {
                is_collection: true,
                content_length: None,
            });
        }
        match state.files.get(path) {
            Some(data) => Ok(ObjectStat {
                is_collection: false,
                content_length: Some(data.len() as u64),
            }),
            None => Err(RemoteError::NotFound(path.to_string())),
        }
    }

    async fn create_directory(&self, path: &str) -> Result<(), RemoteError> {
        self.begin(Op::CreateDirectory, path).await?;
        let mut state = self.state.lock().unwrap();
        if state.dirs.contains(path) || state.files.contains_key(path) {
            return Err(RemoteError::AlreadyExists(path.to_string()));
        }
        if !parent_is_dir(&state, path) {
            return Err(missing_parent(path));
        }
        state.dirs.insert(path.to_string());
        Ok(())
    }

    async fn put_file_contents(&self, path: &str, data: Bytes) -> Result<(), RemoteError> {
        self.begin(Op::Put, path).await?;
        let mut state = self.state.lock().unwrap();
        if !parent_is_dir(&state, path) {
            return Err(missing_parent(path));
        }
        state.files.insert(path.to_string(), data);
        Ok(())
    }

    async fn get_file_contents(&self, path: &str) -> Result<Bytes, RemoteError> {
        self.begin(Op::Get, path).await?;
        let state = self.state.lock().unwrap();
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }

    async fn delete_file(&self, path: &str) -> Result<(), RemoteError> {
        self.begin(Op::Delete, path).await?;
        let mut state = self.state.lock().unwrap();
        match state.files.remove(path) {
            Some(_) => Ok(()),
            None => Err(RemoteError::NotFound(path.to_string())),
        }
    }

    async fn create_read_stream(&self, path: &str) -> Result<ByteStream, RemoteError> {
        self.begin(Op::Stream, path).await?;
        let state = self.state.lock().unwrap();
        let data = state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))?;
        let chunks: Vec<Result<Bytes, RemoteError>> = (0..data.len())
            .step_by(STREAM_CHUNK)
            .map(|start| Ok(data.slice(start..(start + STREAM_CHUNK).min(data.len()))))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;

    #[tokio::test]
    async fn test_mkcol_requires_parent() {
        let t = MemoryTransport::new();
        let err = t.create_directory("/a/b").await.unwrap_err();
        assert!(matches!(err, RemoteError::Server { status: 409, .. }));
        t.create_directory("/a").await.unwrap();
        t.create_directory("/a/b").await.unwrap();
        assert!(t.create_directory("/a").await.unwrap_err().is_already_exists());
    }

    #[tokio::test]
    async fn test_stream_chunks_cover_whole_object() {
        let t = MemoryTransport::new();
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        t.insert_file("/big.bin", data.clone());

        let mut stream = t.create_read_stream("/big.bin").await.unwrap();
        let mut out = Vec::new();
        let mut chunks = 0;
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
            chunks += 1;
        }
        assert_eq!(out, data);
        assert_eq!(chunks, 3);
    }

    #[tokio::test]
    async fn test_calls_are_recorded_even_when_failing() {
        let t = MemoryTransport::new();
        t.fail_on(Op::Get, "/x");
        assert!(t.get_file_contents("/x").await.is_err());
        assert_eq!(t.calls(), vec![Call { op: Op::Get, path: "/x".into() }]);
    }
}
