//! In-memory song store with the same status rules as the SQL repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use trackroom_core::{
    AppError, MissingMediaSong, ProcessingStatus, SongMediaFailure, SongMediaUpdate,
    WaveformSummary,
};
use trackroom_db::SongMediaStore;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct MockSongRecord {
    pub audio_url: Option<String>,
    pub preview_url: Option<String>,
    pub waveform: Option<WaveformSummary>,
    pub original_bit_depth: Option<i32>,
    pub original_sample_rate: Option<i32>,
    pub original_size_bytes: Option<i64>,
    pub playback_size_bytes: Option<i64>,
    pub playback_bitrate_kbps: Option<i32>,
    pub status: ProcessingStatus,
    pub last_error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Number of terminal writes applied.
    pub writes: usize,
}

impl MockSongRecord {
    fn pending(audio_url: Option<&str>) -> Self {
        Self {
            audio_url: audio_url.map(String::from),
            preview_url: None,
            waveform: None,
            original_bit_depth: None,
            original_sample_rate: None,
            original_size_bytes: None,
            playback_size_bytes: None,
            playback_bitrate_kbps: None,
            status: ProcessingStatus::Pending,
            last_error: None,
            updated_at: None,
            writes: 0,
        }
    }
}

#[derive(Clone, Default)]
pub struct MockSongStore {
    songs: Arc<Mutex<HashMap<Uuid, MockSongRecord>>>,
    fail_success: Arc<AtomicBool>,
    fail_all: Arc<AtomicBool>,
}

impl MockSongStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pending song row.
    pub fn insert_song(&self, id: Uuid, audio_url: Option<&str>) {
        self.songs
            .lock()
            .unwrap()
            .insert(id, MockSongRecord::pending(audio_url));
    }

    /// Insert a song row in a given state.
    pub fn insert_record(&self, id: Uuid, record: MockSongRecord) {
        self.songs.lock().unwrap().insert(id, record);
    }

    pub fn record(&self, id: Uuid) -> Option<MockSongRecord> {
        self.songs.lock().unwrap().get(&id).cloned()
    }

    /// Make success writes fail with a database error.
    pub fn set_fail_success(&self, fail: bool) {
        self.fail_success.store(fail, Ordering::SeqCst);
    }

    /// Make every call fail, including `ping`.
    pub fn set_unavailable(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(AppError::ServiceUnavailable(
                "record store unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SongMediaStore for MockSongStore {
    async fn publish_success(&self, update: &SongMediaUpdate) -> Result<(), AppError> {
        self.check_available()?;
        if self.fail_success.load(Ordering::SeqCst) {
            return Err(AppError::ServiceUnavailable(
                "connection reset by peer".to_string(),
            ));
        }
        let mut songs = self.songs.lock().unwrap();
        let record = songs
            .get_mut(&update.song_id)
            .ok_or_else(|| AppError::NotFound(format!("Song {} not found", update.song_id)))?;

        record.audio_url = Some(update.audio_url.clone());
        record.preview_url = Some(update.preview_url.clone());
        record.waveform = Some(update.waveform.clone());
        record.original_bit_depth = update.original_bit_depth;
        record.original_sample_rate = update.original_sample_rate;
        record.original_size_bytes = Some(update.original_size_bytes);
        record.playback_size_bytes = Some(update.playback_size_bytes);
        record.playback_bitrate_kbps = Some(update.playback_bitrate_kbps);
        record.status = ProcessingStatus::Succeeded;
        record.last_error = None;
        record.updated_at = Some(update.updated_at);
        record.writes += 1;
        Ok(())
    }

    async fn publish_failure(&self, failure: &SongMediaFailure) -> Result<(), AppError> {
        self.check_available()?;
        let mut songs = self.songs.lock().unwrap();
        let record = songs
            .get_mut(&failure.song_id)
            .ok_or_else(|| AppError::NotFound(format!("Song {} not found", failure.song_id)))?;

        if let Some(audio_url) = &failure.audio_url {
            record.audio_url = Some(audio_url.clone());
        }
        if record.status.can_transition_to(ProcessingStatus::Failed) {
            record.status = ProcessingStatus::Failed;
            record.last_error = Some(failure.error.clone());
        }
        record.updated_at = Some(failure.updated_at);
        record.writes += 1;
        Ok(())
    }

    async fn list_missing_media(&self, limit: i64) -> Result<Vec<MissingMediaSong>, AppError> {
        self.check_available()?;
        let songs = self.songs.lock().unwrap();
        let mut missing: Vec<(Option<DateTime<Utc>>, MissingMediaSong)> = songs
            .iter()
            .filter(|(_, r)| r.preview_url.is_none() || r.waveform.is_none())
            .filter_map(|(id, r)| {
                r.audio_url.as_ref().map(|audio_url| {
                    (
                        r.updated_at,
                        MissingMediaSong {
                            id: *id,
                            audio_url: audio_url.clone(),
                        },
                    )
                })
            })
            .collect();
        // NULLS FIRST, then oldest first
        missing.sort_by_key(|(updated_at, song)| (*updated_at, song.id));
        Ok(missing
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|(_, song)| song)
            .collect())
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.check_available()
    }
}
