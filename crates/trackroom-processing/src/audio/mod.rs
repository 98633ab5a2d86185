//! Audio steps of the preview pipeline
//!
//! Each step drives ffprobe or ffmpeg through a `ToolRunner` and maps tool failures
//! into its own `PipelineError` kind.

pub mod preview;
pub mod probe;
pub mod quantize;
pub mod waveform;

pub use preview::{preview_object_path, preview_window, EncodedPreview, PreviewEncoder, PreviewWindow};
pub use probe::{requires_quantization, FormatProber, ProbeReport};
pub use quantize::{quantized_object_path, QuantizeDecision, QuantizedOriginal, Quantizer};
pub use waveform::{decode_pcm_s16le, summarize_samples, WaveformAnalyzer};
