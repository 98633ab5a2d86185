//! Storage abstraction trait
//!
//! `ObjectStorage` is the capability the pipeline needs from object storage:
//! download, upload with or without overwrite, batch removal and URL derivation.

use crate::StorageBackend;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid object location: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Reject bucket names and object paths that could escape their namespace.
pub fn validate_location(bucket: &str, path: &str) -> StorageResult<()> {
    if bucket.is_empty() || bucket.contains('/') || bucket.contains("..") {
        return Err(StorageError::InvalidKey(format!(
            "Invalid bucket name: {}",
            bucket
        )));
    }
    if path.is_empty() || path.contains("..") || path.starts_with('/') || path.contains('\\') {
        return Err(StorageError::InvalidKey(
            "Object path contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

/// Object storage abstraction
///
/// Implemented by the S3 and local filesystem backends, and by in-memory mocks in
/// tests. Every operation names its bucket explicitly.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Download an object's bytes.
    async fn download(&self, bucket: &str, path: &str) -> StorageResult<Vec<u8>>;

    /// Upload an object. With `upsert == false` an existing object is left untouched
    /// and `StorageError::AlreadyExists` is returned.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> StorageResult<()>;

    /// Remove objects. Missing objects are not an error.
    async fn remove(&self, bucket: &str, paths: &[String]) -> StorageResult<()>;

    /// Stable public URL for an object in a publicly readable bucket.
    fn public_url(&self, bucket: &str, path: &str) -> String;

    /// Time-limited URL for direct GET access.
    async fn signed_url(&self, bucket: &str, path: &str, expires_in: Duration)
        -> StorageResult<String>;

    async fn exists(&self, bucket: &str, path: &str) -> StorageResult<bool>;

    fn backend_type(&self) -> StorageBackend;
}
