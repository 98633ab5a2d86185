//! Song repository: media columns of the `songs` table.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use trackroom_core::{
    AppError, MissingMediaSong, ProcessingStatus, SongMediaFailure, SongMediaUpdate,
};

use crate::song_store::SongMediaStore;

const UPDATE_SUCCESS_SQL: &str = r#"
    UPDATE songs
    SET audio_url = $2,
        preview_url = $3,
        waveform_json = $4,
        original_bit_depth = $5,
        original_sample_rate = $6,
        original_size_bytes = $7,
        playback_size_bytes = $8,
        playback_bitrate_kbps = $9,
        processing_status = $10,
        last_processing_error = NULL,
        updated_at = $11
    WHERE id = $1
"#;

// SET expressions see the pre-update row, so a succeeded song keeps its status.
const UPDATE_FAILURE_SQL: &str = r#"
    UPDATE songs
    SET audio_url = COALESCE($3, audio_url),
        processing_status = CASE WHEN processing_status = $5 THEN processing_status ELSE $4 END,
        last_processing_error = CASE WHEN processing_status = $5 THEN last_processing_error ELSE $2 END,
        updated_at = $6
    WHERE id = $1
"#;

const SELECT_MISSING_MEDIA_SQL: &str = r#"
    SELECT id, audio_url
    FROM songs
    WHERE (preview_url IS NULL OR waveform_json IS NULL)
      AND audio_url IS NOT NULL
    ORDER BY updated_at ASC NULLS FIRST
    LIMIT $1
"#;

/// Repository for the `songs` table.
#[derive(Clone)]
pub struct SongRepository {
    pool: PgPool,
}

impl SongRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SongMediaStore for SongRepository {
    #[tracing::instrument(skip(self, update), fields(db.table = "songs", db.record_id = %update.song_id))]
    async fn publish_success(&self, update: &SongMediaUpdate) -> Result<(), AppError> {
        let waveform = serde_json::to_value(&update.waveform)?;

        let result = sqlx::query::<Postgres>(UPDATE_SUCCESS_SQL)
            .bind(update.song_id)
            .bind(&update.audio_url)
            .bind(&update.preview_url)
            .bind(waveform)
            .bind(update.original_bit_depth)
            .bind(update.original_sample_rate)
            .bind(update.original_size_bytes)
            .bind(update.playback_size_bytes)
            .bind(update.playback_bitrate_kbps)
            .bind(ProcessingStatus::Succeeded.as_str())
            .bind(update.updated_at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Song {} not found",
                update.song_id
            )));
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, failure), fields(db.table = "songs", db.record_id = %failure.song_id))]
    async fn publish_failure(&self, failure: &SongMediaFailure) -> Result<(), AppError> {
        let result = sqlx::query::<Postgres>(UPDATE_FAILURE_SQL)
            .bind(failure.song_id)
            .bind(&failure.error)
            .bind(failure.audio_url.as_deref())
            .bind(ProcessingStatus::Failed.as_str())
            .bind(ProcessingStatus::Succeeded.as_str())
            .bind(failure.updated_at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Song {} not found",
                failure.song_id
            )));
        }

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "songs"))]
    async fn list_missing_media(&self, limit: i64) -> Result<Vec<MissingMediaSong>, AppError> {
        let rows = sqlx::query_as::<Postgres, MissingMediaSong>(SELECT_MISSING_MEDIA_SQL)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query::<Postgres>("SELECT 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
