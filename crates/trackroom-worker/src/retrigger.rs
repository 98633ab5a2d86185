//! Maintenance re-trigger
//!
//! Scans the song store for rows with a known original but no preview or no
//! waveform and re-emits a storage event for each, with a fixed concurrency width
//! and a per-item timeout so one stuck item cannot hold up the batch.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use trackroom_core::{AppError, Config, StorageEvent};
use trackroom_db::SongMediaStore;

use crate::emitter::TriggerEmitter;

/// Configuration for the re-trigger service
#[derive(Debug, Clone)]
pub struct RetriggerConfig {
    pub source_bucket: String,
    pub concurrency: usize,
    pub item_timeout: Duration,
    pub scan_limit: i64,
}

impl Default for RetriggerConfig {
    fn default() -> Self {
        Self {
            source_bucket: "audio-originals".to_string(),
            concurrency: 8,
            item_timeout: Duration::from_secs(12),
            scan_limit: 500,
        }
    }
}

impl From<&Config> for RetriggerConfig {
    fn from(config: &Config) -> Self {
        Self {
            source_bucket: config.source_bucket().to_string(),
            concurrency: config.retrigger_concurrency().max(1),
            item_timeout: Duration::from_secs(config.retrigger_item_timeout_secs()),
            scan_limit: config.retrigger_scan_limit(),
        }
    }
}

/// Aggregate counts of one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetriggerSummary {
    /// Songs found and re-emitted.
    pub triggered: usize,
    /// Events accepted.
    pub succeeded: usize,
    /// Events rejected by the trigger.
    pub failed: usize,
    /// Events that timed out or could not be delivered.
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemResult {
    Accepted,
    Rejected,
    Error,
}

pub struct RetriggerService {
    store: Arc<dyn SongMediaStore>,
    emitter: Arc<dyn TriggerEmitter>,
    config: RetriggerConfig,
}

impl RetriggerService {
    pub fn new(
        store: Arc<dyn SongMediaStore>,
        emitter: Arc<dyn TriggerEmitter>,
        config: RetriggerConfig,
    ) -> Self {
        Self {
            store,
            emitter,
            config,
        }
    }

    pub fn config(&self) -> &RetriggerConfig {
        &self.config
    }

    #[tracing::instrument(skip(self), fields(concurrency = self.config.concurrency))]
    pub async fn run(&self) -> Result<RetriggerSummary, AppError> {
        let songs = self.store.list_missing_media(self.config.scan_limit).await?;
        let mut summary = RetriggerSummary {
            triggered: songs.len(),
            ..RetriggerSummary::default()
        };

        if songs.is_empty() {
            tracing::info!("No songs missing preview or waveform");
            return Ok(summary);
        }

        tracing::info!(song_count = songs.len(), "Re-emitting trigger events");

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut handles = Vec::with_capacity(songs.len());

        for song in songs {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| AppError::Internal(format!("Re-trigger semaphore closed: {}", e)))?;
            let emitter = self.emitter.clone();
            let event = StorageEvent::object_created(&self.config.source_bucket, &song.audio_url);
            let item_timeout = self.config.item_timeout;

            handles.push(tokio::spawn(async move {
                let result = tokio::time::timeout(item_timeout, emitter.emit(&event)).await;
                drop(permit);

                match result {
                    Ok(Ok(true)) => ItemResult::Accepted,
                    Ok(Ok(false)) => ItemResult::Rejected,
                    Ok(Err(e)) => {
                        tracing::warn!(song_id = %song.id, error = %e, "Re-trigger failed");
                        ItemResult::Error
                    }
                    Err(_) => {
                        tracing::warn!(
                            song_id = %song.id,
                            timeout_secs = item_timeout.as_secs(),
                            "Re-trigger timed out"
                        );
                        ItemResult::Error
                    }
                }
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(ItemResult::Accepted) => summary.succeeded += 1,
                Ok(ItemResult::Rejected) => summary.failed += 1,
                Ok(ItemResult::Error) => summary.errors += 1,
                Err(e) => {
                    tracing::error!(error = %e, "Re-trigger task panicked");
                    summary.errors += 1;
                }
            }
        }

        tracing::info!(
            triggered = summary.triggered,
            succeeded = summary.succeeded,
            failed = summary.failed,
            errors = summary.errors,
            "Re-trigger scan complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::EmitError;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use trackroom_processing::test_helpers::{MockSongRecord, MockSongStore};
    use uuid::Uuid;

    /// Scripted emitter keyed by object name: accept, reject, fail or hang.
    #[derive(Default)]
    struct ScriptedEmitter {
        reject: HashSet<String>,
        fail: HashSet<String>,
        hang: HashSet<String>,
        seen: Mutex<Vec<StorageEvent>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl TriggerEmitter for ScriptedEmitter {
        async fn emit(&self, event: &StorageEvent) -> Result<bool, EmitError> {
            self.seen.lock().unwrap().push(event.clone());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;

            let name = &event.record.name;
            let result = if self.hang.contains(name) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(true)
            } else if self.fail.contains(name) {
                Err(EmitError::Transport("connection refused".to_string()))
            } else {
                Ok(!self.reject.contains(name))
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    fn store_with(count: usize) -> (Arc<MockSongStore>, Vec<String>) {
        let store = Arc::new(MockSongStore::new());
        let mut names = Vec::new();
        for i in 0..count {
            let id = Uuid::new_v4();
            let name = format!("{}/take-{}.wav", id, i);
            store.insert_song(id, Some(&name));
            names.push(name);
        }
        (store, names)
    }

    fn config(item_timeout: Duration) -> RetriggerConfig {
        RetriggerConfig {
            item_timeout,
            ..RetriggerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_counts_accepted_rejected_and_errors() {
        let (store, names) = store_with(5);
        let emitter = Arc::new(ScriptedEmitter {
            reject: HashSet::from([names[0].clone()]),
            fail: HashSet::from([names[1].clone()]),
            ..ScriptedEmitter::default()
        });
        let service = RetriggerService::new(store, emitter.clone(), config(Duration::from_secs(5)));

        let summary = service.run().await.unwrap();
        assert_eq!(
            summary,
            RetriggerSummary {
                triggered: 5,
                succeeded: 3,
                failed: 1,
                errors: 1
            }
        );

        let seen = emitter.seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        for event in seen.iter() {
            assert_eq!(event.record.bucket_id, "audio-originals");
            assert_eq!(event.table, "storage.objects");
            assert_eq!(event.record.size, Some(0));
        }
    }

    #[tokio::test]
    async fn test_stuck_item_times_out_without_blocking_batch() {
        let (store, names) = store_with(4);
        let emitter = Arc::new(ScriptedEmitter {
            hang: HashSet::from([names[2].clone()]),
            ..ScriptedEmitter::default()
        });
        let service =
            RetriggerService::new(store, emitter, config(Duration::from_millis(200)));

        let summary = tokio::time::timeout(Duration::from_secs(5), service.run())
            .await
            .expect("scan must finish despite a stuck item")
            .unwrap();
        assert_eq!(summary.triggered, 4);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.errors, 1);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let (store, _) = store_with(30);
        let emitter = Arc::new(ScriptedEmitter::default());
        let service = RetriggerService::new(
            store,
            emitter.clone(),
            RetriggerConfig {
                concurrency: 3,
                ..RetriggerConfig::default()
            },
        );

        let summary = service.run().await.unwrap();
        assert_eq!(summary.succeeded, 30);
        assert!(emitter.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_only_songs_missing_media_are_emitted() {
        let store = Arc::new(MockSongStore::new());
        let complete = Uuid::new_v4();
        store.insert_record(
            complete,
            MockSongRecord {
                audio_url: Some(format!("{}/a.wav", complete)),
                preview_url: Some("https://cdn/p.mp3".to_string()),
                waveform: Some(trackroom_core::WaveformSummary::zeroed(400, 30.0)),
                original_bit_depth: None,
                original_sample_rate: None,
                original_size_bytes: None,
                playback_size_bytes: None,
                playback_bitrate_kbps: None,
                status: trackroom_core::ProcessingStatus::Succeeded,
                last_error: None,
                updated_at: None,
                writes: 1,
            },
        );
        store.insert_song(Uuid::new_v4(), None);
        let missing = Uuid::new_v4();
        store.insert_song(missing, Some(&format!("{}/b.wav", missing)));

        let emitter = Arc::new(ScriptedEmitter::default());
        let service = RetriggerService::new(store, emitter.clone(), RetriggerConfig::default());
        let summary = service.run().await.unwrap();
        assert_eq!(summary.triggered, 1);
        assert_eq!(
            emitter.seen.lock().unwrap()[0].record.name,
            format!("{}/b.wav", missing)
        );
    }

    #[tokio::test]
    async fn test_store_failure_is_returned() {
        let store = Arc::new(MockSongStore::new());
        store.set_unavailable(true);
        let service = RetriggerService::new(
            store,
            Arc::new(ScriptedEmitter::default()),
            RetriggerConfig::default(),
        );
        assert!(matches!(
            service.run().await,
            Err(AppError::ServiceUnavailable(_))
        ));
    }

    #[test]
    fn test_summary_serializes_counts() {
        let json = serde_json::to_value(RetriggerSummary {
            triggered: 3,
            succeeded: 1,
            failed: 1,
            errors: 1,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"triggered": 3, "succeeded": 1, "failed": 1, "errors": 1})
        );
    }
}
