//! Quantizer: dithered reduction of high bit depth originals to 16-bit PCM
//!
//! The replacement is uploaded under a new name and confirmed before the previous
//! canonical object is removed, so a failure at any point before the delete leaves
//! the original untouched.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use trackroom_storage::ObjectStorage;

use crate::audio::probe::ProbeReport;
use crate::error::PipelineError;
use crate::scratch::ScratchSpace;
use crate::tool::{ToolInvocation, ToolRunner};

const QUANTIZED_FILE: &str = "quantized-16bit.wav";
const QUANTIZED_PREFIX: &str = "orig-16bit";

/// Whether the quantize step runs for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantizeDecision {
    Skip,
    Quantize { sample_fmt: Option<String>, bit_depth: Option<i32> },
}

impl QuantizeDecision {
    /// A missing probe report means the format is unknown; quantization is skipped.
    pub fn for_report(report: Option<&ProbeReport>) -> Self {
        match report {
            Some(report) if report.requires_quantization() => QuantizeDecision::Quantize {
                sample_fmt: report.sample_fmt.clone(),
                bit_depth: report.bit_depth,
            },
            _ => QuantizeDecision::Skip,
        }
    }
}

/// The new canonical original after quantization.
#[derive(Debug, Clone)]
pub struct QuantizedOriginal {
    pub object_path: String,
    pub local_path: PathBuf,
    pub size_bytes: i64,
    /// Replaced original that could not be removed.
    pub orphaned_path: Option<String>,
}

/// `song/take.flac` becomes `song/orig-16bit-<ts>-take.wav`.
pub fn quantized_object_path(original: &str, timestamp_ms: i64) -> String {
    let (dir, file_name) = match original.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, original),
    };
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(file_name);
    let name = format!("{}-{}-{}.wav", QUANTIZED_PREFIX, timestamp_ms, stem);
    match dir {
        Some(dir) => format!("{}/{}", dir, name),
        None => name,
    }
}

pub struct Quantizer {
    tools: Arc<dyn ToolRunner>,
    storage: Arc<dyn ObjectStorage>,
    ffmpeg_path: String,
    timeout: Duration,
    bucket: String,
}

impl Quantizer {
    pub fn new(
        tools: Arc<dyn ToolRunner>,
        storage: Arc<dyn ObjectStorage>,
        ffmpeg_path: impl Into<String>,
        timeout: Duration,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            tools,
            storage,
            ffmpeg_path: ffmpeg_path.into(),
            timeout,
            bucket: bucket.into(),
        }
    }

    fn invocation(&self, input: &Path, output: &Path) -> ToolInvocation {
        ToolInvocation::new(&self.ffmpeg_path, self.timeout)
            .args(["-y", "-v", "error", "-i"])
            .arg(input.to_string_lossy())
            .args(["-map", "0:a:0", "-af", "aresample=osf=s16:dither_method=triangular"])
            .args(["-c:a", "pcm_s16le", "-f", "wav"])
            .arg(output.to_string_lossy())
    }

    /// Re-encode `input` to 16-bit PCM, upload it next to `object_path` and retire
    /// the old object.
    #[tracing::instrument(skip(self, scratch, input), fields(bucket = %self.bucket))]
    pub async fn quantize(
        &self,
        scratch: &ScratchSpace,
        input: &Path,
        object_path: &str,
    ) -> Result<QuantizedOriginal, PipelineError> {
        let output = scratch.file(QUANTIZED_FILE);
        self.tools
            .run(&self.invocation(input, &output))
            .await
            .map_err(|e| PipelineError::Quantize(e.to_string()))?;

        let data = tokio::fs::read(&output).await.map_err(|e| {
            PipelineError::Quantize(format!("Re-encoded file unreadable: {}", e))
        })?;
        if data.is_empty() {
            return Err(PipelineError::Quantize(
                "Re-encoded file is empty".to_string(),
            ));
        }
        let size_bytes = data.len() as i64;

        let new_path = quantized_object_path(object_path, Utc::now().timestamp_millis());
        self.storage
            .upload(&self.bucket, &new_path, data, "audio/wav", true)
            .await
            .map_err(|e| PipelineError::Quantize(e.to_string()))?;

        let confirmed = self
            .storage
            .exists(&self.bucket, &new_path)
            .await
            .map_err(|e| PipelineError::Quantize(e.to_string()))?;
        if !confirmed {
            return Err(PipelineError::Quantize(format!(
                "Uploaded replacement {} not found",
                new_path
            )));
        }

        let mut orphaned_path = None;
        if new_path != object_path {
            if let Err(e) = self
                .storage
                .remove(&self.bucket, &[object_path.to_string()])
                .await
            {
                tracing::warn!(
                    bucket = %self.bucket,
                    orphaned_object = %object_path,
                    new_path = %new_path,
                    error = %e,
                    "Failed to remove replaced original"
                );
                orphaned_path = Some(object_path.to_string());
            }
        }

        tracing::info!(
            old_path = %object_path,
            new_path = %new_path,
            size_bytes,
            "Original replaced with 16-bit PCM"
        );

        Ok(QuantizedOriginal {
            object_path: new_path,
            local_path: output,
            size_bytes,
            orphaned_path,
        })
    }
}
