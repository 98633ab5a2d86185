use crate::traits::{validate_location, ObjectStorage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectStore, ObjectStoreExt, PutMode, PutOptions,
    PutPayload, Result as ObjectResult,
};
use std::collections::HashMap;
use std::time::Duration;

/// Put options carrying the object's Content-Type. Without upsert the write fails if
/// the key already exists.
fn put_options(content_type: &str, upsert: bool) -> PutOptions {
    let mode = if upsert {
        PutMode::Overwrite
    } else {
        PutMode::Create
    };
    let mut options = PutOptions::from(mode);
    if !content_type.is_empty() {
        options.attributes = Attributes::from_iter([(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        )]);
    }
    options
}

/// S3 storage implementation holding one object store per configured bucket.
#[derive(Clone)]
pub struct S3Storage {
    stores: HashMap<String, AmazonS3>,
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `buckets` - Buckets this instance may address (source and preview)
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub async fn new(
        buckets: &[String],
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut stores = HashMap::with_capacity(buckets.len());

        for bucket in buckets {
            let mut builder = AmazonS3Builder::from_env()
                .with_region(region.clone())
                .with_bucket_name(bucket.clone());

            if let Some(ref endpoint) = endpoint_url {
                let allow_http = endpoint.starts_with("http://");
                builder = builder
                    .with_endpoint(endpoint.clone())
                    .with_allow_http(allow_http);
            }

            let store = builder
                .build()
                .map_err(|e| StorageError::ConfigError(e.to_string()))?;
            stores.insert(bucket.clone(), store);
        }

        Ok(S3Storage {
            stores,
            region,
            endpoint_url,
        })
    }

    fn store(&self, bucket: &str) -> StorageResult<&AmazonS3> {
        self.stores.get(bucket).ok_or_else(|| {
            StorageError::ConfigError(format!("Bucket {} is not configured", bucket))
        })
    }

    /// Public URL for an object.
    ///
    /// AWS uses virtual-hosted style: https://{bucket}.s3.{region}.amazonaws.com/{key}.
    /// Custom endpoints use path style: {endpoint}/{bucket}/{key}.
    fn generate_url(&self, bucket: &str, key: &str) -> String {
        if let Some(ref endpoint) = self.endpoint_url {
            format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key)
        } else {
            format!("https://{}.s3.{}.amazonaws.com/{}", bucket, self.region, key)
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn download(&self, bucket: &str, path: &str) -> StorageResult<Vec<u8>> {
        validate_location(bucket, path)?;
        let store = self.store(bucket)?;
        let start = std::time::Instant::now();
        let location = Path::from(path.to_string());

        let result: ObjectResult<_> = store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => {
                StorageError::NotFound(format!("{}/{}", bucket, path))
            }
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %bucket,
                    key = %path,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::info!(
            bucket = %bucket,
            key = %path,
            size_bytes = bytes.len() as u64,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(bytes.to_vec())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> StorageResult<()> {
        validate_location(bucket, path)?;
        let store = self.store(bucket)?;
        let size = data.len() as u64;
        let payload = PutPayload::from(Bytes::from(data));
        let location = Path::from(path.to_string());
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = store
            .put_opts(&location, payload, put_options(content_type, upsert))
            .await;

        result.map_err(|e| match e {
            ObjectStoreError::AlreadyExists { .. } => {
                StorageError::AlreadyExists(format!("{}/{}", bucket, path))
            }
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %bucket,
                    key = %path,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                StorageError::UploadFailed(other.to_string())
            }
        })?;

        tracing::info!(
            bucket = %bucket,
            key = %path,
            size_bytes = size,
            upsert,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> StorageResult<()> {
        let store = self.store(bucket)?;
        let start = std::time::Instant::now();

        for path in paths {
            validate_location(bucket, path)?;
            let location = Path::from(path.to_string());
            let result: ObjectResult<_> = store.delete(&location).await;

            match result {
                Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        bucket = %bucket,
                        key = %path,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "S3 delete failed"
                    );
                    return Err(StorageError::DeleteFailed(e.to_string()));
                }
            }
        }

        tracing::info!(
            bucket = %bucket,
            count = paths.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 remove successful"
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
        validate_location(bucket, path)?;
        let store = self.store(bucket)?;
        let location = Path::from(path.to_string());
        let url_result: ObjectResult<_> = store
            .signed_url(Method::GET, &location, expires_in)
            .await;

        let url = url_result
            .map_err(|e| StorageError::BackendError(e.to_string()))?
            .to_string();

        Ok(url)
    }

    async fn exists(&self, bucket: &str, path: &str) -> StorageResult<bool> {
        validate_location(bucket, path)?;
        let store = self.store(bucket)?;
        let location = Path::from(path.to_string());
        match store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
