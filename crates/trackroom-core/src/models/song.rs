//! Song media record: the fields the preview pipeline reads and writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::waveform::WaveformSummary;

/// Per-song pipeline outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Succeeded,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Succeeded => "succeeded",
            ProcessingStatus::Failed => "failed",
        }
    }

    /// Whether a record in this state may be moved to `next`.
    ///
    /// A succeeded record is never demoted. A failed record may be recovered by a
    /// later successful run, and re-running a succeeded record replaces its media.
    pub fn can_transition_to(&self, next: ProcessingStatus) -> bool {
        match (self, next) {
            (_, ProcessingStatus::Pending) => false,
            (ProcessingStatus::Succeeded, ProcessingStatus::Failed) => false,
            _ => true,
        }
    }
}

impl FromStr for ProcessingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProcessingStatus::Pending),
            "succeeded" => Ok(ProcessingStatus::Succeeded),
            "failed" => Ok(ProcessingStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid processing status: {}", s)),
        }
    }
}

impl Display for ProcessingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Success payload, written once at the end of a successful job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongMediaUpdate {
    pub song_id: Uuid,
    /// Canonical original object path (replaced if the source was quantized).
    pub audio_url: String,
    pub preview_url: String,
    pub waveform: WaveformSummary,
    pub original_bit_depth: Option<i32>,
    pub original_sample_rate: Option<i32>,
    pub original_size_bytes: i64,
    pub playback_size_bytes: i64,
    pub playback_bitrate_kbps: i32,
    pub updated_at: DateTime<Utc>,
}

/// Failure payload. `audio_url` is set when the canonical original was already
/// replaced before the failing step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongMediaFailure {
    pub song_id: Uuid,
    pub error: String,
    pub audio_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Song whose preview or waveform is missing but whose original is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MissingMediaSong {
    pub id: Uuid,
    pub audio_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_strings() {
        for status in [
            ProcessingStatus::Pending,
            ProcessingStatus::Succeeded,
            ProcessingStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<ProcessingStatus>().unwrap(), status);
        }
        assert!("done".parse::<ProcessingStatus>().is_err());
    }

    #[test]
    fn test_succeeded_is_never_demoted() {
        assert!(!ProcessingStatus::Succeeded.can_transition_to(ProcessingStatus::Failed));
        assert!(!ProcessingStatus::Succeeded.can_transition_to(ProcessingStatus::Pending));
        assert!(ProcessingStatus::Succeeded.can_transition_to(ProcessingStatus::Succeeded));
    }

    #[test]
    fn test_pending_reaches_both_terminal_states() {
        assert!(ProcessingStatus::Pending.can_transition_to(ProcessingStatus::Succeeded));
        assert!(ProcessingStatus::Pending.can_transition_to(ProcessingStatus::Failed));
        assert!(ProcessingStatus::Failed.can_transition_to(ProcessingStatus::Succeeded));
    }
}
