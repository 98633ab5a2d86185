//! Pipeline settings derived from the service configuration

use std::path::PathBuf;
use std::time::Duration;
use trackroom_core::{
    Config, PreviewServiceConfig, PreviewStartPolicy, PreviewUrlMode, WaveformReduction,
    MAX_PREVIEW_DURATION_SECS,
};

/// Everything a job needs to know besides its inputs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source_bucket: String,
    pub preview_bucket: String,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub probe_timeout: Duration,
    pub quantize_timeout: Duration,
    pub encode_timeout: Duration,
    pub analyze_timeout: Duration,
    /// Preview cap in seconds.
    pub preview_duration: f64,
    pub preview_bitrate_kbps: u32,
    pub preview_sample_rate: u32,
    pub preview_start: PreviewStartPolicy,
    pub preview_url_mode: PreviewUrlMode,
    pub signed_url_ttl: Duration,
    pub waveform_buckets: usize,
    pub waveform_sample_rate: u32,
    pub waveform_reduction: WaveformReduction,
    pub scratch_dir: Option<PathBuf>,
    pub max_concurrent_jobs: usize,
}

impl PipelineConfig {
    pub fn from_settings(settings: &PreviewServiceConfig) -> Self {
        Self {
            source_bucket: settings.source_bucket.clone(),
            preview_bucket: settings.preview_bucket.clone(),
            ffmpeg_path: settings.ffmpeg_path.clone(),
            ffprobe_path: settings.ffprobe_path.clone(),
            probe_timeout: Duration::from_secs(settings.probe_timeout_secs),
            quantize_timeout: Duration::from_secs(settings.quantize_timeout_secs),
            encode_timeout: Duration::from_secs(settings.encode_timeout_secs),
            analyze_timeout: Duration::from_secs(settings.analyze_timeout_secs),
            preview_duration: settings
                .preview_duration_secs
                .clamp(1, MAX_PREVIEW_DURATION_SECS) as f64,
            preview_bitrate_kbps: settings.preview_bitrate_kbps,
            preview_sample_rate: settings.preview_sample_rate,
            preview_start: settings.preview_start,
            preview_url_mode: settings.preview_url_mode,
            signed_url_ttl: Duration::from_secs(settings.signed_url_ttl_secs),
            waveform_buckets: settings.waveform_buckets,
            waveform_sample_rate: settings.waveform_sample_rate,
            waveform_reduction: settings.waveform_reduction,
            scratch_dir: settings.scratch_dir.as_ref().map(PathBuf::from),
            max_concurrent_jobs: settings.max_concurrent_jobs.max(1),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_settings(&PreviewServiceConfig::default())
    }
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self::from_settings(config.settings())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.source_bucket, "audio-originals");
        assert_eq!(config.preview_bucket, "audio-previews");
        assert_eq!(config.preview_duration, 30.0);
        assert_eq!(config.preview_bitrate_kbps, 128);
        assert_eq!(config.preview_sample_rate, 44_100);
        assert_eq!(config.waveform_buckets, 400);
        assert_eq!(config.waveform_sample_rate, 8_000);
        assert_eq!(config.encode_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_from_config_carries_overrides() {
        let settings = PreviewServiceConfig {
            preview_duration_secs: 20,
            waveform_buckets: 64,
            scratch_dir: Some("/tmp/trackroom".to_string()),
            max_concurrent_jobs: 0,
            ..PreviewServiceConfig::default()
        };
        let config = PipelineConfig::from(&Config(Box::new(settings)));
        assert_eq!(config.preview_duration, 20.0);
        assert_eq!(config.waveform_buckets, 64);
        assert_eq!(config.scratch_dir, Some(PathBuf::from("/tmp/trackroom")));
        assert_eq!(config.max_concurrent_jobs, 1);
    }

    #[test]
    fn test_preview_duration_is_capped() {
        let settings = PreviewServiceConfig {
            preview_duration_secs: 120,
            ..PreviewServiceConfig::default()
        };
        let config = PipelineConfig::from_settings(&settings);
        assert_eq!(config.preview_duration, 30.0);

        let window = crate::audio::preview_window(
            Some(300.0),
            config.preview_duration,
            PreviewStartPolicy::FromStart,
        );
        assert_eq!(window.start, 0.0);
        assert_eq!(window.length, 30.0);
    }
}
