//! Result publisher
//!
//! Writes the terminal status of a job to the record store: one full success
//! update, or a best-effort failure update that never fails outward.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use trackroom_core::{PreviewUrlMode, SongMediaFailure, SongMediaUpdate};
use trackroom_db::SongMediaStore;
use trackroom_storage::ObjectStorage;
use uuid::Uuid;

use crate::error::PipelineError;

pub struct ResultPublisher {
    store: Arc<dyn SongMediaStore>,
    storage: Arc<dyn ObjectStorage>,
    preview_bucket: String,
    url_mode: PreviewUrlMode,
    signed_url_ttl: Duration,
}

impl ResultPublisher {
    pub fn new(
        store: Arc<dyn SongMediaStore>,
        storage: Arc<dyn ObjectStorage>,
        preview_bucket: impl Into<String>,
        url_mode: PreviewUrlMode,
        signed_url_ttl: Duration,
    ) -> Self {
        Self {
            store,
            storage,
            preview_bucket: preview_bucket.into(),
            url_mode,
            signed_url_ttl,
        }
    }

    /// Dereferenceable URL for a preview object.
    pub async fn preview_url(&self, object_path: &str) -> Result<String, PipelineError> {
        match self.url_mode {
            PreviewUrlMode::Public => Ok(self.storage.public_url(&self.preview_bucket, object_path)),
            PreviewUrlMode::Signed => self
                .storage
                .signed_url(&self.preview_bucket, object_path, self.signed_url_ttl)
                .await
                .map_err(|e| PipelineError::Publish(e.to_string())),
        }
    }

    #[tracing::instrument(skip(self, update), fields(song_id = %update.song_id))]
    pub async fn publish_success(&self, update: &SongMediaUpdate) -> Result<(), PipelineError> {
        self.store
            .publish_success(update)
            .await
            .map_err(|e| PipelineError::Publish(e.to_string()))?;
        tracing::info!(preview_url = %update.preview_url, "Song marked succeeded");
        Ok(())
    }

    /// Record a failed job. Errors from the store are logged and dropped.
    #[tracing::instrument(skip(self, message, audio_url))]
    pub async fn publish_failure(&self, song_id: Uuid, message: &str, audio_url: Option<&str>) {
        let failure = SongMediaFailure {
            song_id,
            error: message.to_string(),
            audio_url: audio_url.map(String::from),
            updated_at: Utc::now(),
        };

        match self.store.publish_failure(&failure).await {
            Ok(()) => tracing::info!(error = %message, "Song marked failed"),
            Err(e) => tracing::error!(
                error = %e,
                job_error = %message,
                "Failed to record processing failure"
            ),
        }
    }
}
