use crate::traits::{validate_location, ObjectStorage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage: objects live at `{base_path}/{bucket}/{path}`.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for all buckets (e.g., "/var/lib/trackroom/storage")
    /// * `base_url` - Base URL the root is served under (e.g., "http://localhost:4000/storage")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    /// Map `(bucket, path)` to a filesystem path inside the storage root.
    fn object_path(&self, bucket: &str, path: &str) -> StorageResult<PathBuf> {
        validate_location(bucket, path)?;

        let full = self.base_path.join(bucket).join(path);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        if let Ok(canonical) = full.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Object path resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(full)
    }

    fn generate_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", self.base_url.trim_end_matches('/'), bucket, path)
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn download(&self, bucket: &str, path: &str) -> StorageResult<Vec<u8>> {
        let file_path = self.object_path(bucket, path)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&file_path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(format!("{}/{}", bucket, path)));
        }

        let data = fs::read(&file_path).await.map_err(|e| {
            StorageError::DownloadFailed(format!(
                "Failed to read file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        tracing::info!(
            bucket = %bucket,
            key = %path,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage download successful"
        );

        Ok(data)
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        _content_type: &str,
        upsert: bool,
    ) -> StorageResult<()> {
        let file_path = self.object_path(bucket, path)?;
        let size = data.len();

        self.ensure_parent_dir(&file_path).await?;

        let start = std::time::Instant::now();

        let mut options = fs::OpenOptions::new();
        options.write(true);
        if upsert {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }

        let mut file = options.open(&file_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                StorageError::AlreadyExists(format!("{}/{}", bucket, path))
            } else {
                StorageError::UploadFailed(format!(
                    "Failed to create file {}: {}",
                    file_path.display(),
                    e
                ))
            }
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to write file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to sync file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        tracing::info!(
            bucket = %bucket,
            key = %path,
            size_bytes = size,
            upsert,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> StorageResult<()> {
        let start = std::time::Instant::now();

        for path in paths {
            let file_path = self.object_path(bucket, path)?;
            if !fs::try_exists(&file_path).await.unwrap_or(false) {
                continue;
            }
            fs::remove_file(&file_path).await.map_err(|e| {
                StorageError::DeleteFailed(format!(
                    "Failed to delete file {}: {}",
                    file_path.display(),
                    e
                ))
            })?;
        }

        tracing::info!(
            bucket = %bucket,
            count = paths.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage remove successful"
        );

        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.generate_url(bucket, path)
    }

    async fn signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        self.object_path(bucket, path)?;
        let expires_at = chrono::Utc::now().timestamp() + expires_in.as_secs() as i64;
        Ok(format!(
            "{}?expires={}",
            self.generate_url(bucket, path),
            expires_at
        ))
    }

    async fn exists(&self, bucket: &str, path: &str) -> StorageResult<bool> {
        let file_path = self.object_path(bucket, path)?;
        Ok(fs::try_exists(&file_path).await.unwrap_or(false))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn storage(dir: &Path) -> LocalStorage {
        LocalStorage::new(dir, "http://localhost:4000/storage".to_string())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_local_storage_upload_download() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        storage
            .upload("audio-originals", "song-1/take.wav", b"RIFF".to_vec(), "audio/wav", false)
            .await
            .unwrap();

        let downloaded = storage.download("audio-originals", "song-1/take.wav").await.unwrap();
        assert_eq!(downloaded, b"RIFF".to_vec());
        assert!(dir.path().join("audio-originals/song-1/take.wav").exists());
    }

    #[tokio::test]
    async fn test_upload_without_upsert_keeps_existing_object() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        storage
            .upload("audio-previews", "s/p.mp3", b"first".to_vec(), "audio/mpeg", false)
            .await
            .unwrap();
        let result = storage
            .upload("audio-previews", "s/p.mp3", b"second".to_vec(), "audio/mpeg", false)
            .await;
        assert!(matches!(result, Err(StorageError::AlreadyExists(_))));
        assert_eq!(
            storage.download("audio-previews", "s/p.mp3").await.unwrap(),
            b"first".to_vec()
        );

        storage
            .upload("audio-previews", "s/p.mp3", b"third".to_vec(), "audio/mpeg", true)
            .await
            .unwrap();
        assert_eq!(
            storage.download("audio-previews", "s/p.mp3").await.unwrap(),
            b"third".to_vec()
        );
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.download("audio-originals", "../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage
            .remove("audio-originals", &["../etc/passwd".to_string()])
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("..", "passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_download_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.download("audio-originals", "nope/missing.wav").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_ignores_missing_objects() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        storage
            .upload("audio-originals", "s/a.wav", b"a".to_vec(), "audio/wav", true)
            .await
            .unwrap();
        storage
            .remove(
                "audio-originals",
                &["s/a.wav".to_string(), "s/never-existed.wav".to_string()],
            )
            .await
            .unwrap();
        assert!(!storage.exists("audio-originals", "s/a.wav").await.unwrap());
    }

    #[tokio::test]
    async fn test_urls_include_bucket() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        assert_eq!(
            storage.public_url("audio-previews", "s/p.mp3"),
            "http://localhost:4000/storage/audio-previews/s/p.mp3"
        );
        let signed = storage
            .signed_url("audio-previews", "s/p.mp3", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(signed.starts_with("http://localhost:4000/storage/audio-previews/s/p.mp3?expires="));
    }
}
