//! In-memory object storage

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use trackroom_storage::{ObjectStorage, StorageBackend, StorageError, StorageResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOp {
    Download,
    Upload,
    Remove,
    Exists,
}

#[derive(Debug, Clone)]
struct MockObject {
    data: Vec<u8>,
    content_type: String,
}

/// Object storage keyed by `(bucket, path)`, with per-bucket failure injection.
#[derive(Clone, Default)]
pub struct MockObjectStorage {
    objects: Arc<Mutex<HashMap<(String, String), MockObject>>>,
    failures: Arc<Mutex<HashSet<(StorageOp, String)>>>,
    ops: Arc<Mutex<Vec<String>>>,
}

impl MockObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object.
    pub fn put(&self, bucket: &str, path: &str, data: Vec<u8>) {
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), path.to_string()),
            MockObject {
                data,
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    pub fn get(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), path.to_string()))
            .map(|o| o.data.clone())
    }

    pub fn content_type(&self, bucket: &str, path: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), path.to_string()))
            .map(|o| o.content_type.clone())
    }

    pub fn contains(&self, bucket: &str, path: &str) -> bool {
        self.get(bucket, path).is_some()
    }

    /// Sorted object paths in a bucket.
    pub fn paths(&self, bucket: &str) -> Vec<String> {
        let mut paths: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, p)| p.clone())
            .collect();
        paths.sort();
        paths
    }

    /// Make every `op` on `bucket` fail from now on.
    pub fn fail(&self, op: StorageOp, bucket: &str) {
        self.failures.lock().unwrap().insert((op, bucket.to_string()));
    }

    /// Operations performed so far, as `"<op> <bucket>/<path>"`.
    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    fn record(&self, op: StorageOp, bucket: &str, path: &str) -> StorageResult<()> {
        self.ops
            .lock()
            .unwrap()
            .push(format!("{:?} {}/{}", op, bucket, path).to_lowercase());
        if self
            .failures
            .lock()
            .unwrap()
            .contains(&(op, bucket.to_string()))
        {
            let message = format!("injected {:?} failure for {}/{}", op, bucket, path);
            return Err(match op {
                StorageOp::Download => StorageError::DownloadFailed(message),
                StorageOp::Upload => StorageError::UploadFailed(message),
                StorageOp::Remove => StorageError::DeleteFailed(message),
                StorageOp::Exists => StorageError::BackendError(message),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for MockObjectStorage {
    async fn download(&self, bucket: &str, path: &str) -> StorageResult<Vec<u8>> {
        self.record(StorageOp::Download, bucket, path)?;
        self.get(bucket, path)
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", bucket, path)))
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> StorageResult<()> {
        self.record(StorageOp::Upload, bucket, path)?;
        let mut objects = self.objects.lock().unwrap();
        let key = (bucket.to_string(), path.to_string());
        if !upsert && objects.contains_key(&key) {
            return Err(StorageError::AlreadyExists(format!("{}/{}", bucket, path)));
        }
        objects.insert(
            key,
            MockObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> StorageResult<()> {
        for path in paths {
            self.record(StorageOp::Remove, bucket, path)?;
        }
        let mut objects = self.objects.lock().unwrap();
        for path in paths {
            objects.remove(&(bucket.to_string(), path.clone()));
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("https://storage.example.com/{}/{}", bucket, path)
    }

    async fn signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(format!(
            "https://storage.example.com/{}/{}?expires={}",
            bucket,
            path,
            expires_in.as_secs()
        ))
    }

    async fn exists(&self, bucket: &str, path: &str) -> StorageResult<bool> {
        self.record(StorageOp::Exists, bucket, path)?;
        Ok(self.contains(bucket, path))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
