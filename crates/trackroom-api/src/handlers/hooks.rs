//! Storage trigger endpoint

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use trackroom_core::{AppError, StorageEvent};
use trackroom_processing::{JobOutcome, TriggerDecision};

use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct IgnoredResponse {
    pub status: &'static str,
    pub bucket: String,
}

/// Receive an object-created notification and run the job for it.
///
/// Events for other buckets are acknowledged with 200. A malformed object name is a
/// 400. Otherwise the response reflects the job's terminal outcome: 200 with the
/// outcome on success, 500 with the verbatim failure message otherwise.
#[tracing::instrument(skip(state, event), fields(bucket = %event.record.bucket_id, name = %event.record.name))]
pub async fn storage_hook(
    State(state): State<Arc<AppState>>,
    ValidatedJson(event): ValidatedJson<StorageEvent>,
) -> Result<impl IntoResponse, HttpAppError> {
    let job = match state.pipeline.receiver().accept(&event)? {
        TriggerDecision::Ignore { bucket } => {
            return Ok((
                StatusCode::OK,
                Json(serde_json::to_value(IgnoredResponse {
                    status: "ignored",
                    bucket,
                })
                .map_err(AppError::from)?),
            ));
        }
        TriggerDecision::Start(job) => job,
    };

    // The job runs on its own task so a dropped connection does not cancel it.
    let outcome = state
        .pipeline
        .spawn(job)
        .await
        .map_err(|e| AppError::Internal(format!("Job task failed: {}", e)))?;

    match outcome {
        JobOutcome::Succeeded { .. } => Ok((
            StatusCode::OK,
            Json(serde_json::to_value(&outcome).map_err(AppError::from)?),
        )),
        JobOutcome::Failed { error, .. } => Err(AppError::Processing(error).into()),
    }
}
