//! Trigger receiver: the pipeline's only entry point

use trackroom_core::StorageEvent;
use trackroom_storage::validate_location;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::pipeline::ProcessingJob;

/// Shortest first path segment accepted as a song identifier.
const MIN_SONG_ID_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
    /// Event for another bucket; acknowledged without side effects.
    Ignore { bucket: String },
    Start(ProcessingJob),
}

#[derive(Debug, Clone)]
pub struct TriggerReceiver {
    source_bucket: String,
}

impl TriggerReceiver {
    pub fn new(source_bucket: impl Into<String>) -> Self {
        Self {
            source_bucket: source_bucket.into(),
        }
    }

    pub fn source_bucket(&self) -> &str {
        &self.source_bucket
    }

    /// Validate an object-created event and derive the job it starts.
    pub fn accept(&self, event: &StorageEvent) -> Result<TriggerDecision, PipelineError> {
        let record = &event.record;
        if record.bucket_id != self.source_bucket {
            tracing::debug!(bucket = %record.bucket_id, "Ignoring event for other bucket");
            return Ok(TriggerDecision::Ignore {
                bucket: record.bucket_id.clone(),
            });
        }

        let name = record.name.trim();
        let (segment, rest) = name.split_once('/').ok_or_else(|| {
            PipelineError::Validation(format!("Object name '{}' has no song folder", name))
        })?;

        if segment.len() < MIN_SONG_ID_LEN {
            return Err(PipelineError::Validation(format!(
                "Song id segment '{}' is too short",
                segment
            )));
        }
        let song_id = Uuid::parse_str(segment).map_err(|_| {
            PipelineError::Validation(format!("Song id segment '{}' is not a UUID", segment))
        })?;

        if rest.is_empty() || rest.ends_with('/') {
            return Err(PipelineError::Validation(format!(
                "Object name '{}' has no file name",
                name
            )));
        }
        validate_location(&record.bucket_id, name)
            .map_err(|e| PipelineError::Validation(e.to_string()))?;

        Ok(TriggerDecision::Start(ProcessingJob {
            song_id,
            source_bucket: record.bucket_id.clone(),
            object_path: name.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SONG: &str = "3f2b8c1e-9a47-4d2e-8f0a-1b2c3d4e5f60";

    fn receiver() -> TriggerReceiver {
        TriggerReceiver::new("audio-originals")
    }

    #[test]
    fn test_other_bucket_is_ignored() {
        let event = StorageEvent::object_created("avatars", format!("{}/me.png", SONG));
        assert_eq!(
            receiver().accept(&event).unwrap(),
            TriggerDecision::Ignore {
                bucket: "avatars".to_string()
            }
        );
    }

    #[test]
    fn test_valid_event_starts_job() {
        let event = StorageEvent::object_created("audio-originals", format!("{}/take 1.wav", SONG));
        match receiver().accept(&event).unwrap() {
            TriggerDecision::Start(job) => {
                assert_eq!(job.song_id.to_string(), SONG);
                assert_eq!(job.source_bucket, "audio-originals");
                assert_eq!(job.object_path, format!("{}/take 1.wav", SONG));
            }
            other => panic!("Expected Start, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_names_are_validation_errors() {
        for name in [
            "take.wav".to_string(),
            "short/take.wav".to_string(),
            "not-a-uuid-but-long/take.wav".to_string(),
            format!("{}/", SONG),
            format!("{}/../../etc/passwd", SONG),
        ] {
            let event = StorageEvent::object_created("audio-originals", name.clone());
            let result = receiver().accept(&event);
            assert!(
                matches!(result, Err(PipelineError::Validation(_))),
                "{} should be rejected",
                name
            );
        }
    }
}
