//! Waveform analyzer
//!
//! Decodes a mono low-rate PCM window with ffmpeg and reduces it to a fixed number
//! of normalized buckets. Analysis never fails a job: when every source fails the
//! summary is all zeros.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use trackroom_core::{WaveformReduction, WaveformSummary};

use crate::error::PipelineError;
use crate::tool::{ToolInvocation, ToolRunner};

const FULL_SCALE: f64 = 32768.0;

/// Little-endian signed 16-bit samples. A trailing odd byte is ignored.
pub fn decode_pcm_s16le(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Partition `samples` into `buckets` contiguous ranges and reduce each to a value
/// in [0, 1]. Bucket `i` covers `[i * len / n, (i + 1) * len / n)`; buckets with no
/// samples are 0.
pub fn summarize_samples(samples: &[i16], buckets: usize, reduction: WaveformReduction) -> Vec<f64> {
    let len = samples.len();
    (0..buckets)
        .map(|i| {
            let start = i * len / buckets;
            let end = (i + 1) * len / buckets;
            let slice = &samples[start..end];
            if slice.is_empty() {
                return 0.0;
            }
            let value = match reduction {
                WaveformReduction::Peak => {
                    let peak = slice.iter().map(|s| (*s as i32).abs()).max().unwrap_or(0);
                    peak as f64 / FULL_SCALE
                }
                WaveformReduction::Rms => {
                    let sum: f64 = slice.iter().map(|s| (*s as f64) * (*s as f64)).sum();
                    (sum / slice.len() as f64).sqrt() / FULL_SCALE
                }
            };
            round3(value.clamp(0.0, 1.0))
        })
        .collect()
}

pub struct WaveformAnalyzer {
    tools: Arc<dyn ToolRunner>,
    ffmpeg_path: String,
    timeout: Duration,
    buckets: usize,
    sample_rate: u32,
    max_duration: f64,
    reduction: WaveformReduction,
}

impl WaveformAnalyzer {
    pub fn new(
        tools: Arc<dyn ToolRunner>,
        ffmpeg_path: impl Into<String>,
        timeout: Duration,
        buckets: usize,
        sample_rate: u32,
        max_duration: f64,
        reduction: WaveformReduction,
    ) -> Self {
        Self {
            tools,
            ffmpeg_path: ffmpeg_path.into(),
            timeout,
            buckets,
            sample_rate,
            max_duration,
            reduction,
        }
    }

    pub fn buckets(&self) -> usize {
        self.buckets
    }

    fn invocation(&self, input: &Path) -> ToolInvocation {
        ToolInvocation::new(&self.ffmpeg_path, self.timeout)
            .args(["-v", "error", "-i"])
            .arg(input.to_string_lossy())
            .arg("-t")
            .arg(format!("{:.3}", self.max_duration))
            .args(["-map", "0:a:0", "-ac", "1", "-ar"])
            .arg(self.sample_rate.to_string())
            .args(["-f", "s16le", "-acodec", "pcm_s16le", "pipe:1"])
    }

    /// Summarize one source file.
    pub async fn analyze(&self, input: &Path) -> Result<WaveformSummary, PipelineError> {
        let output = self
            .tools
            .run(&self.invocation(input))
            .await
            .map_err(|e| PipelineError::Analyze(e.to_string()))?;

        let samples = decode_pcm_s16le(&output.stdout);
        if samples.is_empty() {
            return Err(PipelineError::Analyze("Decoded no samples".to_string()));
        }

        Ok(WaveformSummary {
            peaks: summarize_samples(&samples, self.buckets, self.reduction),
            duration: round3(samples.len() as f64 / self.sample_rate as f64),
        })
    }

    /// Try each source in order; fall back to a zeroed summary of `fallback_duration`.
    pub async fn summarize(&self, sources: &[&Path], fallback_duration: f64) -> WaveformSummary {
        for source in sources {
            match self.analyze(source).await {
                Ok(summary) => return summary,
                Err(e) => {
                    tracing::warn!(
                        source = %source.display(),
                        error = %e,
                        "Waveform analysis failed for source"
                    );
                }
            }
        }

        tracing::warn!(buckets = self.buckets, "Using zero-filled waveform");
        WaveformSummary::zeroed(self.buckets, round3(fallback_duration))
    }
}
