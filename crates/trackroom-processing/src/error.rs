//! Pipeline error taxonomy
//!
//! Each pipeline step reports failures with its own kind. Fatal kinds stop the job
//! and are recorded verbatim on the song; non-fatal kinds degrade the result
//! (missing probe metadata, zero-filled waveform) and the job continues.

use thiserror::Error;
use trackroom_core::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Probe failed: {0}")]
    Probe(String),

    #[error("Quantize failed: {0}")]
    Quantize(String),

    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("Analyze failed: {0}")]
    Analyze(String),

    #[error("Publish failed: {0}")]
    Publish(String),
}

impl PipelineError {
    /// Whether this error ends the job with a `failed` status.
    pub fn is_fatal(&self) -> bool {
        match self {
            PipelineError::Fetch(_)
            | PipelineError::Quantize(_)
            | PipelineError::Encode(_)
            | PipelineError::Publish(_) => true,
            PipelineError::Validation(_) | PipelineError::Probe(_) | PipelineError::Analyze(_) => {
                false
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::Fetch(_) => "fetch",
            PipelineError::Probe(_) => "probe",
            PipelineError::Quantize(_) => "quantize",
            PipelineError::Encode(_) => "encode",
            PipelineError::Analyze(_) => "analyze",
            PipelineError::Publish(_) => "publish",
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(msg) => AppError::InvalidInput(msg),
            other => AppError::Processing(other.to_string()),
        }
    }
}
