//! Maintenance endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use trackroom_worker::RetriggerSummary;

use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RetrofixResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub summary: RetriggerSummary,
}

/// Re-emit trigger events for songs missing a preview or waveform.
pub async fn retrofix(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RetrofixResponse>, HttpAppError> {
    let summary = state.retrigger.run().await?;
    Ok(Json(RetrofixResponse { ok: true, summary }))
}
