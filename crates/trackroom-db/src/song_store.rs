//! Record store abstraction for the preview pipeline
//!
//! The pipeline talks to the song record store through this trait so it can be
//! exercised against an in-memory store in tests.

use async_trait::async_trait;
use trackroom_core::{AppError, MissingMediaSong, SongMediaFailure, SongMediaUpdate};

/// Media-column access to the song record store.
#[async_trait]
pub trait SongMediaStore: Send + Sync {
    /// Write the full success payload in one update and mark the song `succeeded`.
    ///
    /// Returns `AppError::NotFound` when no song row matches.
    async fn publish_success(&self, update: &SongMediaUpdate) -> Result<(), AppError>;

    /// Mark the song `failed` with the given message.
    ///
    /// A song that already succeeded keeps its status and error; only a replaced
    /// canonical `audio_url` is carried over.
    async fn publish_failure(&self, failure: &SongMediaFailure) -> Result<(), AppError>;

    /// Songs with a known original but no preview or no waveform.
    async fn list_missing_media(&self, limit: i64) -> Result<Vec<MissingMediaSong>, AppError>;

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), AppError>;
}
