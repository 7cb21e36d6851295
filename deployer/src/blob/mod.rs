//! Blob store adapter
//!
//! Durable key -> bytes storage behind published sites. Keys are POSIX-style
//! relative paths: never a leading or trailing slash, never an empty segment.

pub mod mime;
pub mod object;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::errors::DeployError;

pub use object::ObjectBlobStore;

/// Errors reported by a blob store backend
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid blob key: {0}")]
    InvalidKey(String),

    /// The backend itself is unusable (bad credentials, missing bucket, unreachable)
    #[error("Blob store misconfigured: {0}")]
    Misconfigured(String),

    #[error("Blob store error: {0}")]
    Backend(String),
}

impl From<BlobError> for DeployError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::Misconfigured(msg) => DeployError::ConfigError(msg),
            BlobError::NotFound(key) => DeployError::NotFound(key),
            other => DeployError::Publish(other.to_string()),
        }
    }
}

/// Metadata of a stored blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMetadata {
    pub key: String,
    pub size: u64,
    pub content_type: String,
    pub last_modified: DateTime<Utc>,
}

/// A stored blob with its contents
#[derive(Debug, Clone)]
pub struct BlobObject {
    pub metadata: BlobMetadata,
    pub bytes: Bytes,
}

/// Blob store contract used by the publisher and the site server
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` at `key`, replacing any existing blob
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), BlobError>;

    /// Fetch metadata only
    async fn head(&self, key: &str) -> Result<BlobMetadata, BlobError>;

    /// Fetch contents and metadata
    async fn get(&self, key: &str) -> Result<BlobObject, BlobError>;

    /// List every key under `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError>;
}

/// Normalize a key: backslashes become slashes, empty and `.` segments are dropped.
///
/// Rejects empty keys and `..` segments.
pub fn normalize_key(key: &str) -> Result<String, BlobError> {
    let mut segments = Vec::new();
    for segment in key.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return Err(BlobError::InvalidKey(key.to_string())),
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return Err(BlobError::InvalidKey(key.to_string()));
    }

    Ok(segments.join("/"))
}

/// Join key fragments and normalize the result
pub fn join_key(prefix: &str, rest: &str) -> Result<String, BlobError> {
    normalize_key(&format!("{}/{}", prefix, rest))
}
