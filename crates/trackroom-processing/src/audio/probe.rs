//! Format prober (ffprobe)

use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::PipelineError;
use crate::tool::{ToolInvocation, ToolRunner};

/// Format details of the first audio stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeReport {
    pub codec_name: Option<String>,
    pub sample_rate: Option<i32>,
    pub channels: Option<i32>,
    pub sample_fmt: Option<String>,
    pub bit_depth: Option<i32>,
    /// Container duration in seconds.
    pub duration: Option<f64>,
}

impl ProbeReport {
    pub fn requires_quantization(&self) -> bool {
        requires_quantization(self.sample_fmt.as_deref(), self.bit_depth)
    }
}

/// Quantization is required for floating point sample formats, for 32-bit integer
/// formats not known to carry at most 24 significant bits, and for any integer bit
/// depth above 24.
///
/// ffprobe reports 24-bit PCM decoded as `s32` with `bits_per_raw_sample = 24`, which
/// does not need quantization.
pub fn requires_quantization(sample_fmt: Option<&str>, bit_depth: Option<i32>) -> bool {
    match sample_fmt.map(|f| f.trim().to_ascii_lowercase()).as_deref() {
        Some("flt" | "fltp" | "dbl" | "dblp") => true,
        Some("s32" | "s32p") => !matches!(bit_depth, Some(d) if d > 0 && d <= 24),
        Some("s64" | "s64p") => true,
        _ => bit_depth.is_some_and(|d| d > 24),
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_name: Option<String>,
    sample_rate: Option<String>,
    channels: Option<i32>,
    sample_fmt: Option<String>,
    bits_per_sample: Option<i32>,
    bits_per_raw_sample: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

fn bits_for_sample_fmt(sample_fmt: &str) -> Option<i32> {
    match sample_fmt.trim_end_matches('p') {
        "u8" => Some(8),
        "s16" => Some(16),
        "s32" | "flt" => Some(32),
        "s64" | "dbl" => Some(64),
        _ => None,
    }
}

/// Parse `ffprobe -of json` output.
pub fn parse_probe_output(stdout: &[u8]) -> Result<ProbeReport, PipelineError> {
    let output: FfprobeOutput = serde_json::from_slice(stdout)
        .map_err(|e| PipelineError::Probe(format!("Unreadable ffprobe output: {}", e)))?;

    let stream = output
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::Probe("No audio stream found".to_string()))?;

    let bit_depth = stream
        .bits_per_raw_sample
        .as_deref()
        .and_then(|s| s.trim().parse::<i32>().ok())
        .filter(|d| *d > 0)
        .or(stream.bits_per_sample.filter(|d| *d > 0))
        .or_else(|| stream.sample_fmt.as_deref().and_then(bits_for_sample_fmt));

    Ok(ProbeReport {
        codec_name: stream.codec_name,
        sample_rate: stream
            .sample_rate
            .as_deref()
            .and_then(|s| s.trim().parse::<i32>().ok())
            .filter(|r| *r > 0),
        channels: stream.channels,
        sample_fmt: stream.sample_fmt,
        bit_depth,
        duration: output
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0),
    })
}

pub struct FormatProber {
    tools: Arc<dyn ToolRunner>,
    ffprobe_path: String,
    timeout: Duration,
}

impl FormatProber {
    pub fn new(tools: Arc<dyn ToolRunner>, ffprobe_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            tools,
            ffprobe_path: ffprobe_path.into(),
            timeout,
        }
    }

    fn invocation(&self, input: &Path) -> ToolInvocation {
        ToolInvocation::new(&self.ffprobe_path, self.timeout)
            .args(["-v", "error", "-select_streams", "a:0", "-show_entries"])
            .arg("stream=codec_name,sample_rate,channels,sample_fmt,bits_per_sample,bits_per_raw_sample:format=duration")
            .args(["-of", "json"])
            .arg(input.to_string_lossy())
    }

    /// Inspect the first audio stream of `input`.
    pub async fn probe(&self, input: &Path) -> Result<ProbeReport, PipelineError> {
        let output = self
            .tools
            .run(&self.invocation(input))
            .await
            .map_err(|e| PipelineError::Probe(e.to_string()))?;
        let report = parse_probe_output(&output.stdout)?;

        tracing::info!(
            codec = ?report.codec_name,
            sample_rate = ?report.sample_rate,
            channels = ?report.channels,
            sample_fmt = ?report.sample_fmt,
            bit_depth = ?report.bit_depth,
            duration = ?report.duration,
            "Source probed"
        );
        Ok(report)
    }
}
