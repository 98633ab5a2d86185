//! Storage "object created" notification payload.

use serde::{Deserialize, Serialize};

/// Table name emitted by the storage notification source.
pub const STORAGE_OBJECTS_TABLE: &str = "storage.objects";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StorageEventKind {
    Insert,
    Update,
}

/// Object row carried by a storage notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageObjectRecord {
    pub bucket_id: String,
    pub name: String,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Inbound trigger payload: `{type, table, record: {bucket_id, name, size, metadata}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageEvent {
    #[serde(rename = "type")]
    pub kind: StorageEventKind,
    #[serde(default)]
    pub table: String,
    pub record: StorageObjectRecord,
}

impl StorageEvent {
    /// Synthetic insert event for an object that already exists, used when
    /// re-triggering processing for songs with missing media.
    pub fn object_created(bucket_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: StorageEventKind::Insert,
            table: STORAGE_OBJECTS_TABLE.to_string(),
            record: StorageObjectRecord {
                bucket_id: bucket_id.into(),
                name: name.into(),
                size: Some(0),
                metadata: serde_json::json!({}),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_storage_payload() {
        let raw = r#"{
            "type": "INSERT",
            "table": "objects",
            "record": {
                "bucket_id": "audio-originals",
                "name": "3f2b1c9e-8d7a-4b6c-9e1f-2a3b4c5d6e7f/take-3.wav",
                "size": 1048576,
                "metadata": {"mimetype": "audio/wav"}
            }
        }"#;
        let event: StorageEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.kind, StorageEventKind::Insert);
        assert_eq!(event.record.bucket_id, "audio-originals");
        assert_eq!(event.record.size, Some(1048576));
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let raw = r#"{"type": "UPDATE", "record": {"bucket_id": "b", "name": "n"}}"#;
        let event: StorageEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.kind, StorageEventKind::Update);
        assert!(event.table.is_empty());
        assert_eq!(event.record.size, None);
        assert!(event.record.metadata.is_null());
    }

    #[test]
    fn test_object_created_shape() {
        let event = StorageEvent::object_created("audio-originals", "song/file.wav");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "INSERT");
        assert_eq!(json["table"], "storage.objects");
        assert_eq!(json["record"]["size"], 0);
        assert_eq!(json["record"]["metadata"], serde_json::json!({}));
    }
}
