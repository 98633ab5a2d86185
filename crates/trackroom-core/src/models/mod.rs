//! Domain models for the preview pipeline.

pub mod event;
pub mod song;
pub mod waveform;

pub use event::{StorageEvent, StorageEventKind, StorageObjectRecord};
pub use song::{MissingMediaSong, ProcessingStatus, SongMediaFailure, SongMediaUpdate};
pub use waveform::WaveformSummary;
