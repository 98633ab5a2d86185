//! Trigger emitters
//!
//! An emitter delivers one storage event to the preview pipeline. `Ok(true)` means
//! the event was accepted, `Ok(false)` that it was rejected, and `Err` that it
//! could not be delivered at all.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use trackroom_core::StorageEvent;
use trackroom_processing::{PreviewPipeline, TriggerDecision};

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("Trigger request timed out")]
    Timeout,

    #[error("Trigger transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait TriggerEmitter: Send + Sync {
    async fn emit(&self, event: &StorageEvent) -> Result<bool, EmitError>;
}

/// POSTs events as JSON to an external trigger endpoint.
#[derive(Clone, Debug)]
pub struct HttpTriggerEmitter {
    client: Client,
    url: String,
    secret: Option<String>,
}

impl HttpTriggerEmitter {
    pub fn new(
        url: impl Into<String>,
        secret: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
            secret,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TriggerEmitter for HttpTriggerEmitter {
    async fn emit(&self, event: &StorageEvent) -> Result<bool, EmitError> {
        let mut request = self.client.post(&self.url).json(event);
        if let Some(secret) = &self.secret {
            request = request.header("Authorization", format!("Bearer {}", secret));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EmitError::Timeout
            } else {
                EmitError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                status = status.as_u16(),
                name = %event.record.name,
                body = %body,
                "Trigger endpoint rejected event"
            );
            return Ok(false);
        }
        Ok(true)
    }
}

/// Hands events straight to a pipeline in this process. Accepted jobs run on their
/// own task, so the emit returns as soon as the event is validated.
#[derive(Clone)]
pub struct InProcessEmitter {
    pipeline: Arc<PreviewPipeline>,
}

impl InProcessEmitter {
    pub fn new(pipeline: Arc<PreviewPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl TriggerEmitter for InProcessEmitter {
    async fn emit(&self, event: &StorageEvent) -> Result<bool, EmitError> {
        match self.pipeline.receiver().accept(event) {
            Ok(TriggerDecision::Start(job)) => {
                tracing::debug!(song_id = %job.song_id, "Job dispatched in-process");
                drop(self.pipeline.spawn(job));
                Ok(true)
            }
            Ok(TriggerDecision::Ignore { .. }) => Ok(true),
            Err(e) => {
                tracing::warn!(name = %event.record.name, error = %e, "Event rejected");
                Ok(false)
            }
        }
    }
}
