//! Trackroom Storage Library
//!
//! Bucket-aware object storage used by the preview pipeline. Objects are addressed
//! by `(bucket, path)`; the source bucket holds uploaded originals and the preview
//! bucket holds generated previews.
//!
//! # Object path format
//!
//! Paths are relative (`{song_id}/{file_name}`) and must not contain `..` or a
//! leading `/`. Bucket names must be a single path segment.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use trackroom_core::StorageBackend;
pub use traits::{validate_location, ObjectStorage, StorageError, StorageResult};
