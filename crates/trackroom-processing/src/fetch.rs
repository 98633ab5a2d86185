//! Original fetcher

use std::path::PathBuf;
use std::sync::Arc;
use trackroom_storage::ObjectStorage;

use crate::error::PipelineError;
use crate::scratch::ScratchSpace;

/// A downloaded original in scratch space.
#[derive(Debug, Clone)]
pub struct FetchedOriginal {
    pub local_path: PathBuf,
    pub size_bytes: i64,
}

/// File name used for the local copy: `source.<ext>` with a sanitized extension.
pub fn local_source_name(object_path: &str) -> String {
    let file_name = object_path.rsplit('/').next().unwrap_or(object_path);
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .unwrap_or_else(|| "bin".to_string());
    format!("source.{}", ext)
}

/// Download `bucket/path` into the scratch directory. Single attempt.
#[tracing::instrument(skip(storage, scratch), fields(bucket = %bucket, path = %path))]
pub async fn fetch_original(
    storage: &Arc<dyn ObjectStorage>,
    scratch: &ScratchSpace,
    bucket: &str,
    path: &str,
) -> Result<FetchedOriginal, PipelineError> {
    let start = std::time::Instant::now();

    let data = storage
        .download(bucket, path)
        .await
        .map_err(|e| PipelineError::Fetch(e.to_string()))?;

    if data.is_empty() {
        return Err(PipelineError::Fetch(format!(
            "Object {}/{} is empty",
            bucket, path
        )));
    }

    let local_path = scratch.file(&local_source_name(path));
    let size_bytes = data.len() as i64;
    tokio::fs::write(&local_path, &data)
        .await
        .map_err(|e| PipelineError::Fetch(format!("Failed to write scratch copy: {}", e)))?;

    tracing::info!(
        size_bytes,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Original fetched"
    );

    Ok(FetchedOriginal {
        local_path,
        size_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockObjectStorage;

    #[test]
    fn test_local_source_name() {
        assert_eq!(local_source_name("song/take-1.WAV"), "source.wav");
        assert_eq!(local_source_name("song/take.flac"), "source.flac");
        assert_eq!(local_source_name("song/noext"), "source.bin");
        assert_eq!(local_source_name("song/weird.ext$"), "source.bin");
        assert_eq!(local_source_name("song/long.extension"), "source.bin");
    }

    #[tokio::test]
    async fn test_fetch_writes_scratch_copy() {
        let mock = MockObjectStorage::new();
        mock.put("audio-originals", "song/take.wav", vec![1, 2, 3, 4]);
        let storage: Arc<dyn ObjectStorage> = Arc::new(mock);
        let scratch = ScratchSpace::create(None).unwrap();

        let fetched = fetch_original(&storage, &scratch, "audio-originals", "song/take.wav")
            .await
            .unwrap();
        assert_eq!(fetched.size_bytes, 4);
        assert_eq!(std::fs::read(&fetched.local_path).unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_missing_object_is_fetch_error() {
        let storage: Arc<dyn ObjectStorage> = Arc::new(MockObjectStorage::new());
        let scratch = ScratchSpace::create(None).unwrap();
        let result = fetch_original(&storage, &scratch, "audio-originals", "song/none.wav").await;
        assert!(matches!(result, Err(PipelineError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_empty_object_is_fetch_error() {
        let mock = MockObjectStorage::new();
        mock.put("audio-originals", "song/empty.wav", Vec::new());
        let storage: Arc<dyn ObjectStorage> = Arc::new(mock);
        let scratch = ScratchSpace::create(None).unwrap();
        let result = fetch_original(&storage, &scratch, "audio-originals", "song/empty.wav").await;
        match result {
            Err(PipelineError::Fetch(msg)) => assert!(msg.contains("empty")),
            other => panic!("Expected fetch error, got {:?}", other),
        }
    }
}
