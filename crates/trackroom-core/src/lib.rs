//! Trackroom Core Library
//!
//! Domain models, error types and configuration shared by every Trackroom crate:
//! the storage trigger payload, the song media record update, the waveform summary
//! and the environment-driven service configuration.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{
    BaseConfig, Config, PreviewServiceConfig, MAX_PREVIEW_DURATION_SECS, PreviewStartPolicy, PreviewUrlMode,
    WaveformReduction,
};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    MissingMediaSong, ProcessingStatus, SongMediaFailure, SongMediaUpdate, StorageEvent,
    StorageEventKind, StorageObjectRecord, WaveformSummary,
};
pub use storage_types::StorageBackend;
