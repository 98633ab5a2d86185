//! Trackroom Processing Library
//!
//! The audio preview pipeline: fetch an uploaded original into a scratch
//! directory, probe it, re-quantize high bit depth sources to 16-bit PCM, encode a
//! capped MP3 preview, summarize its waveform and record the outcome on the song.
//!
//! External tools (ffprobe, ffmpeg) are reached through the `ToolRunner` trait so
//! every step can run against scripted tools in tests.

pub mod audio;
pub mod config;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod publisher;
pub mod scratch;
pub mod tool;
pub mod trigger;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

// Re-export commonly used types
pub use audio::{
    preview_window, requires_quantization, summarize_samples, FormatProber, PreviewEncoder,
    PreviewWindow, ProbeReport, QuantizeDecision, Quantizer, WaveformAnalyzer,
};
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use fetch::{fetch_original, FetchedOriginal};
pub use pipeline::{JobOutcome, JobStage, PreviewPipeline, ProcessingJob};
pub use publisher::ResultPublisher;
pub use scratch::ScratchSpace;
pub use tool::{ProcessToolRunner, ToolError, ToolInvocation, ToolOutput, ToolRunner};
pub use trigger::{TriggerDecision, TriggerReceiver};
