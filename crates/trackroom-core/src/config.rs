//! Configuration module
//!
//! Service configuration is read from the environment (with `.env` support through
//! dotenvy). Every numeric setting has a default constant; unparsable values fall
//! back to that default. Structural problems are reported by `validate()`.

use std::env;
use std::str::FromStr;

use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 4000;
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MIN_SERVICE_SECRET_LEN: usize = 16;

const SOURCE_BUCKET: &str = "audio-originals";
const PREVIEW_BUCKET: &str = "audio-previews";
const PROBE_TIMEOUT_SECS: u64 = 30;
const QUANTIZE_TIMEOUT_SECS: u64 = 300;
const ENCODE_TIMEOUT_SECS: u64 = 300;
const ANALYZE_TIMEOUT_SECS: u64 = 60;
const PREVIEW_DURATION_SECS: u64 = 30;
/// Hard cap on preview length and on the waveform decode window.
pub const MAX_PREVIEW_DURATION_SECS: u64 = 30;
const PREVIEW_BITRATE_KBPS: u32 = 128;
const PREVIEW_SAMPLE_RATE: u32 = 44_100;
const SIGNED_URL_TTL_SECS: u64 = 7 * 24 * 3600;
const WAVEFORM_BUCKETS: usize = 400;
const WAVEFORM_SAMPLE_RATE: u32 = 8_000;
const MAX_CONCURRENT_JOBS: usize = 4;
const RETRIGGER_CONCURRENCY: usize = 8;
const RETRIGGER_ITEM_TIMEOUT_SECS: u64 = 12;
const RETRIGGER_SCAN_LIMIT: i64 = 500;

/// Where the preview clip starts within the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewStartPolicy {
    /// Clip starts at 0s.
    #[default]
    FromStart,
    /// Clip starts at `clamp(min(d - 30, d/2 - 15), 0, d)`.
    Representative,
}

impl FromStr for PreviewStartPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "start" | "from_start" => Ok(PreviewStartPolicy::FromStart),
            "representative" | "middle" => Ok(PreviewStartPolicy::Representative),
            _ => Err(anyhow::anyhow!("Invalid preview start policy: {}", s)),
        }
    }
}

/// How the published preview URL is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewUrlMode {
    #[default]
    Public,
    Signed,
}

impl FromStr for PreviewUrlMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "public" => Ok(PreviewUrlMode::Public),
            "signed" => Ok(PreviewUrlMode::Signed),
            _ => Err(anyhow::anyhow!("Invalid preview URL mode: {}", s)),
        }
    }
}

/// Per-bucket reduction used by the waveform summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaveformReduction {
    #[default]
    Peak,
    Rms,
}

impl FromStr for WaveformReduction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "peak" => Ok(WaveformReduction::Peak),
            "rms" => Ok(WaveformReduction::Rms),
            _ => Err(anyhow::anyhow!("Invalid waveform reduction: {}", s)),
        }
    }
}

/// Process-level settings.
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
    pub log_format: String,
}

/// Preview service configuration
#[derive(Clone, Debug)]
pub struct PreviewServiceConfig {
    pub base: BaseConfig,
    pub database_url: String,
    /// Pre-shared bearer credential for the trigger and maintenance endpoints
    pub service_secret: Option<String>,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // MinIO and other S3-compatible providers
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub source_bucket: String,
    pub preview_bucket: String,
    // External tools
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub probe_timeout_secs: u64,
    pub quantize_timeout_secs: u64,
    pub encode_timeout_secs: u64,
    pub analyze_timeout_secs: u64,
    // Preview
    pub preview_duration_secs: u64,
    pub preview_bitrate_kbps: u32,
    pub preview_sample_rate: u32,
    pub preview_start: PreviewStartPolicy,
    pub preview_url_mode: PreviewUrlMode,
    pub signed_url_ttl_secs: u64,
    // Waveform
    pub waveform_buckets: usize,
    pub waveform_sample_rate: u32,
    pub waveform_reduction: WaveformReduction,
    // Jobs
    pub scratch_dir: Option<String>,
    pub max_concurrent_jobs: usize,
    pub retrigger_concurrency: usize,
    pub retrigger_item_timeout_secs: u64,
    pub retrigger_scan_limit: i64,
    /// External trigger endpoint used by the maintenance scan instead of in-process dispatch
    pub trigger_url: Option<String>,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<PreviewServiceConfig>);

impl Config {
    fn as_service(&self) -> &PreviewServiceConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = PreviewServiceConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_service().validate()
    }

    pub fn settings(&self) -> &PreviewServiceConfig {
        self.as_service()
    }

    pub fn is_production(&self) -> bool {
        is_production_env(&self.as_service().base.environment)
    }

    pub fn server_port(&self) -> u16 {
        self.as_service().base.server_port
    }

    pub fn environment(&self) -> &str {
        &self.as_service().base.environment
    }

    pub fn log_format(&self) -> &str {
        &self.as_service().base.log_format
    }

    pub fn database_url(&self) -> &str {
        &self.as_service().database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_service().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_service().base.db_timeout_seconds
    }

    pub fn service_secret(&self) -> Option<&str> {
        self.as_service().service_secret.as_deref()
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.as_service().storage_backend
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.as_service().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.as_service().s3_endpoint.as_deref()
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.as_service().aws_region.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.as_service().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.as_service().local_storage_base_url.as_deref()
    }

    pub fn source_bucket(&self) -> &str {
        &self.as_service().source_bucket
    }

    pub fn preview_bucket(&self) -> &str {
        &self.as_service().preview_bucket
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.as_service().ffmpeg_path
    }

    pub fn ffprobe_path(&self) -> &str {
        &self.as_service().ffprobe_path
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.as_service().max_concurrent_jobs
    }

    pub fn retrigger_concurrency(&self) -> usize {
        self.as_service().retrigger_concurrency
    }

    pub fn retrigger_item_timeout_secs(&self) -> u64 {
        self.as_service().retrigger_item_timeout_secs
    }

    pub fn retrigger_scan_limit(&self) -> i64 {
        self.as_service().retrigger_scan_limit
    }

    pub fn trigger_url(&self) -> Option<&str> {
        self.as_service().trigger_url.as_deref()
    }
}

fn is_production_env(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

impl PreviewServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: parse_env("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            environment,
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "text".to_string())
                .to_lowercase(),
        };

        let storage_backend = match non_empty_env("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::S3,
        };

        let config = PreviewServiceConfig {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            service_secret: non_empty_env("SERVICE_SECRET").or_else(|| non_empty_env("WORKER_SECRET")),
            storage_backend,
            s3_region: non_empty_env("S3_REGION"),
            s3_endpoint: non_empty_env("S3_ENDPOINT"),
            aws_region: non_empty_env("AWS_REGION"),
            local_storage_path: non_empty_env("LOCAL_STORAGE_PATH"),
            local_storage_base_url: non_empty_env("LOCAL_STORAGE_BASE_URL"),
            source_bucket: env::var("SOURCE_BUCKET").unwrap_or_else(|_| SOURCE_BUCKET.to_string()),
            preview_bucket: env::var("PREVIEW_BUCKET")
                .unwrap_or_else(|_| PREVIEW_BUCKET.to_string()),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),
            probe_timeout_secs: parse_env("PROBE_TIMEOUT_SECS", PROBE_TIMEOUT_SECS),
            quantize_timeout_secs: parse_env("QUANTIZE_TIMEOUT_SECS", QUANTIZE_TIMEOUT_SECS),
            encode_timeout_secs: parse_env("ENCODE_TIMEOUT_SECS", ENCODE_TIMEOUT_SECS),
            analyze_timeout_secs: parse_env("ANALYZE_TIMEOUT_SECS", ANALYZE_TIMEOUT_SECS),
            // Zero or garbage falls back to the default duration.
            preview_duration_secs: Some(parse_env("PREVIEW_DURATION_SECONDS", PREVIEW_DURATION_SECS))
                .filter(|&d| d > 0)
                .unwrap_or(PREVIEW_DURATION_SECS),
            preview_bitrate_kbps: parse_env("PREVIEW_BITRATE_KBPS", PREVIEW_BITRATE_KBPS),
            preview_sample_rate: parse_env("PREVIEW_SAMPLE_RATE", PREVIEW_SAMPLE_RATE),
            preview_start: parse_env("PREVIEW_START", PreviewStartPolicy::default()),
            preview_url_mode: parse_env("PREVIEW_URL_MODE", PreviewUrlMode::default()),
            signed_url_ttl_secs: parse_env("SIGNED_URL_TTL_SECS", SIGNED_URL_TTL_SECS),
            waveform_buckets: parse_env("WAVEFORM_BUCKETS", WAVEFORM_BUCKETS),
            waveform_sample_rate: parse_env("WAVEFORM_SAMPLE_RATE", WAVEFORM_SAMPLE_RATE),
            waveform_reduction: parse_env("WAVEFORM_REDUCTION", WaveformReduction::default()),
            scratch_dir: non_empty_env("SCRATCH_DIR"),
            max_concurrent_jobs: parse_env("MAX_CONCURRENT_JOBS", MAX_CONCURRENT_JOBS),
            retrigger_concurrency: parse_env("RETRIGGER_CONCURRENCY", RETRIGGER_CONCURRENCY),
            retrigger_item_timeout_secs: parse_env(
                "RETRIGGER_ITEM_TIMEOUT_SECS",
                RETRIGGER_ITEM_TIMEOUT_SECS,
            ),
            retrigger_scan_limit: parse_env("RETRIGGER_SCAN_LIMIT", RETRIGGER_SCAN_LIMIT),
            trigger_url: non_empty_env("TRIGGER_URL"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.service_secret.as_deref() {
            Some(secret) if secret.len() < MIN_SERVICE_SECRET_LEN => {
                return Err(anyhow::anyhow!(
                    "SERVICE_SECRET must be at least {} characters long",
                    MIN_SERVICE_SECRET_LEN
                ));
            }
            None if is_production_env(&self.base.environment) => {
                return Err(anyhow::anyhow!("SERVICE_SECRET must be set in production"));
            }
            _ => {}
        }

        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.source_bucket.trim().is_empty() || self.preview_bucket.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "SOURCE_BUCKET and PREVIEW_BUCKET must not be empty"
            ));
        }

        if self.source_bucket == self.preview_bucket {
            return Err(anyhow::anyhow!(
                "SOURCE_BUCKET and PREVIEW_BUCKET must be different buckets"
            ));
        }

        if self.preview_duration_secs == 0
            || self.preview_duration_secs > MAX_PREVIEW_DURATION_SECS
        {
            return Err(anyhow::anyhow!(
                "PREVIEW_DURATION_SECONDS must be between 1 and {}",
                MAX_PREVIEW_DURATION_SECS
            ));
        }

        if self.waveform_buckets == 0 {
            return Err(anyhow::anyhow!("WAVEFORM_BUCKETS must be greater than zero"));
        }

        if !(8_000..=11_025).contains(&self.waveform_sample_rate) {
            return Err(anyhow::anyhow!(
                "WAVEFORM_SAMPLE_RATE must be between 8000 and 11025 Hz"
            ));
        }

        if self.preview_bitrate_kbps == 0 || self.preview_sample_rate == 0 {
            return Err(anyhow::anyhow!(
                "PREVIEW_BITRATE_KBPS and PREVIEW_SAMPLE_RATE must be greater than zero"
            ));
        }

        if self.max_concurrent_jobs == 0 || self.retrigger_concurrency == 0 {
            return Err(anyhow::anyhow!(
                "MAX_CONCURRENT_JOBS and RETRIGGER_CONCURRENCY must be greater than zero"
            ));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}

impl Default for PreviewServiceConfig {
    /// Development defaults: local storage, no service secret.
    fn default() -> Self {
        Self {
            base: BaseConfig {
                server_port: SERVER_PORT,
                db_max_connections: MAX_CONNECTIONS,
                db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
                environment: "development".to_string(),
                log_format: "text".to_string(),
            },
            database_url: "postgresql://localhost:5432/trackroom".to_string(),
            service_secret: None,
            storage_backend: StorageBackend::Local,
            s3_region: None,
            s3_endpoint: None,
            aws_region: None,
            local_storage_path: Some("./data/storage".to_string()),
            local_storage_base_url: Some(format!("http://localhost:{}/storage", SERVER_PORT)),
            source_bucket: SOURCE_BUCKET.to_string(),
            preview_bucket: PREVIEW_BUCKET.to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            probe_timeout_secs: PROBE_TIMEOUT_SECS,
            quantize_timeout_secs: QUANTIZE_TIMEOUT_SECS,
            encode_timeout_secs: ENCODE_TIMEOUT_SECS,
            analyze_timeout_secs: ANALYZE_TIMEOUT_SECS,
            preview_duration_secs: PREVIEW_DURATION_SECS,
            preview_bitrate_kbps: PREVIEW_BITRATE_KBPS,
            preview_sample_rate: PREVIEW_SAMPLE_RATE,
            preview_start: PreviewStartPolicy::default(),
            preview_url_mode: PreviewUrlMode::default(),
            signed_url_ttl_secs: SIGNED_URL_TTL_SECS,
            waveform_buckets: WAVEFORM_BUCKETS,
            waveform_sample_rate: WAVEFORM_SAMPLE_RATE,
            waveform_reduction: WaveformReduction::default(),
            scratch_dir: None,
            max_concurrent_jobs: MAX_CONCURRENT_JOBS,
            retrigger_concurrency: RETRIGGER_CONCURRENCY,
            retrigger_item_timeout_secs: RETRIGGER_ITEM_TIMEOUT_SECS,
            retrigger_scan_limit: RETRIGGER_SCAN_LIMIT,
            trigger_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PreviewServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.source_bucket, "audio-originals");
        assert_eq!(config.preview_bucket, "audio-previews");
        assert_eq!(config.preview_duration_secs, 30);
        assert_eq!(config.waveform_buckets, 400);
        assert_eq!(config.retrigger_concurrency, 8);
        assert_eq!(config.retrigger_item_timeout_secs, 12);
    }

    #[test]
    fn test_production_requires_service_secret() {
        let mut config = PreviewServiceConfig::default();
        config.base.environment = "production".to_string();
        assert!(config.validate().is_err());

        config.service_secret = Some("short".to_string());
        assert!(config.validate().is_err());

        config.service_secret = Some("a-long-enough-shared-secret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_same_source_and_preview_bucket() {
        let mut config = PreviewServiceConfig::default();
        config.preview_bucket = config.source_bucket.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_postgres_url() {
        let mut config = PreviewServiceConfig::default();
        config.database_url = "mysql://localhost/db".to_string();
        assert!(config.validate().is_err());
        config.database_url = "postgres://localhost/db".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_waveform_rate_out_of_range() {
        let mut config = PreviewServiceConfig::default();
        config.waveform_sample_rate = 44_100;
        assert!(config.validate().is_err());
        config.waveform_sample_rate = 11_025;
        assert!(config.validate().is_ok());
        config.waveform_buckets = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_preview_duration_over_cap() {
        let mut config = PreviewServiceConfig::default();
        config.preview_duration_secs = 120;
        assert!(config.validate().is_err());
        config.preview_duration_secs = 31;
        assert!(config.validate().is_err());
        config.preview_duration_secs = 0;
        assert!(config.validate().is_err());
        config.preview_duration_secs = MAX_PREVIEW_DURATION_SECS;
        assert!(config.validate().is_ok());
        config.preview_duration_secs = 12;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_s3_backend_requires_region() {
        let mut config = PreviewServiceConfig::default();
        config.storage_backend = StorageBackend::S3;
        assert!(config.validate().is_err());
        config.aws_region = Some("eu-west-1".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "representative".parse::<PreviewStartPolicy>().unwrap(),
            PreviewStartPolicy::Representative
        );
        assert_eq!(
            "START".parse::<PreviewStartPolicy>().unwrap(),
            PreviewStartPolicy::FromStart
        );
        assert_eq!("signed".parse::<PreviewUrlMode>().unwrap(), PreviewUrlMode::Signed);
        assert_eq!("rms".parse::<WaveformReduction>().unwrap(), WaveformReduction::Rms);
        assert!("loud".parse::<WaveformReduction>().is_err());
    }

    #[test]
    fn test_config_getters() {
        let config = Config(Box::new(PreviewServiceConfig::default()));
        assert_eq!(config.server_port(), 4000);
        assert_eq!(config.storage_backend(), StorageBackend::Local);
        assert!(!config.is_production());
        assert!(config.service_secret().is_none());
    }
}
