//! Preview encoder: a duration-capped MP3 clip of the canonical original

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use trackroom_core::PreviewStartPolicy;
use trackroom_storage::ObjectStorage;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::scratch::ScratchSpace;
use crate::tool::{ToolInvocation, ToolRunner};

const PREVIEW_FILE: &str = "preview.mp3";

/// Clip boundaries in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewWindow {
    pub start: f64,
    pub length: f64,
}

/// Choose the clip for a source of `duration` seconds, capped at `max` seconds.
///
/// With an unknown duration the clip starts at 0 and ffmpeg stops at the cap or at
/// the end of the source, whichever comes first.
pub fn preview_window(duration: Option<f64>, max: f64, policy: PreviewStartPolicy) -> PreviewWindow {
    let max = max.max(0.0);
    let Some(duration) = duration.filter(|d| d.is_finite() && *d > 0.0) else {
        return PreviewWindow {
            start: 0.0,
            length: max,
        };
    };

    let start = match policy {
        PreviewStartPolicy::FromStart => 0.0,
        PreviewStartPolicy::Representative => {
            (duration - max).min(duration / 2.0 - max / 2.0).clamp(0.0, duration)
        }
    };

    PreviewWindow {
        start,
        length: max.min(duration - start),
    }
}

/// `<song_id>/playback-<ts>-<random>.mp3`; unique per run.
pub fn preview_object_path(song_id: Uuid, timestamp_ms: i64) -> String {
    format!(
        "{}/playback-{}-{:08x}.mp3",
        song_id,
        timestamp_ms,
        rand::random::<u32>()
    )
}

/// A preview uploaded to the preview bucket.
#[derive(Debug, Clone)]
pub struct EncodedPreview {
    pub object_path: String,
    pub local_path: PathBuf,
    pub size_bytes: i64,
    pub window: PreviewWindow,
}

pub struct PreviewEncoder {
    tools: Arc<dyn ToolRunner>,
    storage: Arc<dyn ObjectStorage>,
    ffmpeg_path: String,
    timeout: Duration,
    bucket: String,
    bitrate_kbps: u32,
    sample_rate: u32,
    max_duration: f64,
    policy: PreviewStartPolicy,
}

impl PreviewEncoder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tools: Arc<dyn ToolRunner>,
        storage: Arc<dyn ObjectStorage>,
        ffmpeg_path: impl Into<String>,
        timeout: Duration,
        bucket: impl Into<String>,
        bitrate_kbps: u32,
        sample_rate: u32,
        max_duration: f64,
        policy: PreviewStartPolicy,
    ) -> Self {
        Self {
            tools,
            storage,
            ffmpeg_path: ffmpeg_path.into(),
            timeout,
            bucket: bucket.into(),
            bitrate_kbps,
            sample_rate,
            max_duration,
            policy,
        }
    }

    pub fn bitrate_kbps(&self) -> u32 {
        self.bitrate_kbps
    }

    fn invocation(&self, input: &Path, output: &Path, window: PreviewWindow) -> ToolInvocation {
        let mut invocation = ToolInvocation::new(&self.ffmpeg_path, self.timeout).args(["-y", "-v", "error"]);
        if window.start > 0.0 {
            invocation = invocation.arg("-ss").arg(format!("{:.3}", window.start));
        }
        invocation
            .arg("-i")
            .arg(input.to_string_lossy())
            .arg("-t")
            .arg(format!("{:.3}", window.length))
            .args(["-map", "0:a:0", "-vn", "-c:a", "libmp3lame"])
            .arg("-b:a")
            .arg(format!("{}k", self.bitrate_kbps))
            .arg("-ar")
            .arg(self.sample_rate.to_string())
            .args(["-f", "mp3"])
            .arg(output.to_string_lossy())
    }

    /// Encode the preview of `input` and upload it for `song_id`.
    #[tracing::instrument(skip(self, scratch, input), fields(bucket = %self.bucket))]
    pub async fn encode(
        &self,
        scratch: &ScratchSpace,
        input: &Path,
        song_id: Uuid,
        source_duration: Option<f64>,
    ) -> Result<EncodedPreview, PipelineError> {
        let window = preview_window(source_duration, self.max_duration, self.policy);
        let output = scratch.file(PREVIEW_FILE);

        self.tools
            .run(&self.invocation(input, &output, window))
            .await
            .map_err(|e| PipelineError::Encode(e.to_string()))?;

        let data = tokio::fs::read(&output)
            .await
            .map_err(|e| PipelineError::Encode(format!("Preview file unreadable: {}", e)))?;
        if data.is_empty() {
            return Err(PipelineError::Encode("Preview file is empty".to_string()));
        }
        let size_bytes = data.len() as i64;

        let object_path = preview_object_path(song_id, Utc::now().timestamp_millis());
        self.storage
            .upload(&self.bucket, &object_path, data, "audio/mpeg", false)
            .await
            .map_err(|e| PipelineError::Encode(e.to_string()))?;

        tracing::info!(
            object_path = %object_path,
            start = window.start,
            length = window.length,
            size_bytes,
            "Preview uploaded"
        );

        Ok(EncodedPreview {
            object_path,
            local_path: output,
            size_bytes,
            window,
        })
    }
}
