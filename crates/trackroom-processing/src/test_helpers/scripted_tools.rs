//! Scripted stand-in for ffprobe and ffmpeg
//!
//! Invocations are classified by their arguments. Probe calls return a canned JSON
//! report, re-encode calls write a small file to their output path and analysis
//! calls return canned PCM on stdout.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::tool::{ToolError, ToolInvocation, ToolOutput, ToolRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolStep {
    Probe,
    Quantize,
    Encode,
    Analyze,
}

impl ToolStep {
    pub fn classify(invocation: &ToolInvocation) -> Self {
        if invocation.tool_name().contains("ffprobe") {
            ToolStep::Probe
        } else if invocation.has_arg("libmp3lame") {
            ToolStep::Encode
        } else if invocation.has_arg("pipe:1") {
            ToolStep::Analyze
        } else {
            ToolStep::Quantize
        }
    }
}

/// ffprobe JSON for a single audio stream.
pub fn probe_json(
    codec_name: &str,
    sample_fmt: &str,
    bits_per_raw_sample: Option<i32>,
    sample_rate: i32,
    channels: i32,
    duration: f64,
) -> String {
    let mut stream = serde_json::json!({
        "codec_name": codec_name,
        "sample_rate": sample_rate.to_string(),
        "channels": channels,
        "sample_fmt": sample_fmt,
        "bits_per_sample": bits_per_raw_sample.unwrap_or(0),
    });
    if let Some(bits) = bits_per_raw_sample {
        stream["bits_per_raw_sample"] = serde_json::Value::String(bits.to_string());
    }
    serde_json::json!({
        "streams": [stream],
        "format": {"duration": format!("{:.6}", duration)},
    })
    .to_string()
}

struct ScriptedFailure {
    error: ToolError,
    remaining: Option<usize>,
}

pub struct ScriptedToolRunner {
    probe_output: Mutex<String>,
    pcm: Mutex<Vec<u8>>,
    quantized_bytes: Vec<u8>,
    preview_bytes: Vec<u8>,
    failures: Mutex<HashMap<ToolStep, ScriptedFailure>>,
    calls: Arc<Mutex<Vec<ToolInvocation>>>,
}

impl ScriptedToolRunner {
    /// Defaults to a 60 s 16-bit 44.1 kHz stereo WAV and a half-scale sine-like PCM
    /// window.
    pub fn new() -> Self {
        let samples: Vec<i16> = (0..8_000 * 30)
            .map(|i| if i % 2 == 0 { 16_384 } else { -16_384 })
            .collect();
        Self {
            probe_output: Mutex::new(probe_json("pcm_s16le", "s16", None, 44_100, 2, 60.0)),
            pcm: Mutex::new(samples.iter().flat_map(|s| s.to_le_bytes()).collect()),
            quantized_bytes: b"RIFF scripted 16-bit wav".to_vec(),
            preview_bytes: b"ID3 scripted mp3 preview".to_vec(),
            failures: Mutex::new(HashMap::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_probe(self, json: impl Into<String>) -> Self {
        *self.probe_output.lock().unwrap() = json.into();
        self
    }

    pub fn with_samples(self, samples: &[i16]) -> Self {
        *self.pcm.lock().unwrap() = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        self
    }

    /// Fail every call of `step`.
    pub fn fail_step(&self, step: ToolStep, error: ToolError) {
        self.failures.lock().unwrap().insert(
            step,
            ScriptedFailure {
                error,
                remaining: None,
            },
        );
    }

    /// Fail only the next call of `step`.
    pub fn fail_step_once(&self, step: ToolStep, error: ToolError) {
        self.failures.lock().unwrap().insert(
            step,
            ScriptedFailure {
                error,
                remaining: Some(1),
            },
        );
    }

    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, step: ToolStep) -> Vec<ToolInvocation> {
        self.calls()
            .into_iter()
            .filter(|inv| ToolStep::classify(inv) == step)
            .collect()
    }

    fn take_failure(&self, step: ToolStep) -> Option<ToolError> {
        let mut failures = self.failures.lock().unwrap();
        let failure = failures.get_mut(&step)?;
        let error = failure.error.clone();
        match failure.remaining.as_mut() {
            Some(remaining) if *remaining <= 1 => {
                failures.remove(&step);
            }
            Some(remaining) => *remaining -= 1,
            None => {}
        }
        Some(error)
    }
}

impl Default for ScriptedToolRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience error values for failure injection.
impl ToolError {
    pub fn scripted_exit(program: &str, stderr: &str) -> Self {
        ToolError::Exit {
            program: program.to_string(),
            code: Some(1),
            stderr_excerpt: stderr.to_string(),
        }
    }

    pub fn scripted_timeout(program: &str, secs: u64) -> Self {
        ToolError::Timeout {
            program: program.to_string(),
            timeout: Duration::from_secs(secs),
        }
    }
}

#[async_trait]
impl ToolRunner for ScriptedToolRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        self.calls.lock().unwrap().push(invocation.clone());
        let step = ToolStep::classify(invocation);

        if let Some(error) = self.take_failure(step) {
            return Err(error);
        }

        match step {
            ToolStep::Probe => Ok(ToolOutput {
                stdout: self.probe_output.lock().unwrap().clone().into_bytes(),
                stderr: String::new(),
            }),
            ToolStep::Analyze => Ok(ToolOutput {
                stdout: self.pcm.lock().unwrap().clone(),
                stderr: String::new(),
            }),
            ToolStep::Quantize | ToolStep::Encode => {
                let output = invocation.args.last().cloned().unwrap_or_default();
                let data = if step == ToolStep::Encode {
                    &self.preview_bytes
                } else {
                    &self.quantized_bytes
                };
                tokio::fs::write(&output, data)
                    .await
                    .map_err(|e| ToolError::Spawn {
                        program: invocation.tool_name().to_string(),
                        message: e.to_string(),
                    })?;
                Ok(ToolOutput::default())
            }
        }
    }
}
