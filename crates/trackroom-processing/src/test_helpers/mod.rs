//! Test helpers for pipeline tests
//!
//! In-memory object storage and song store, plus a scripted stand-in for ffprobe
//! and ffmpeg. No database, bucket or external binary is needed.

pub mod mock_song_store;
pub mod mock_storage;
pub mod scripted_tools;

pub use mock_song_store::{MockSongRecord, MockSongStore};
pub use mock_storage::{MockObjectStorage, StorageOp};
pub use scripted_tools::{probe_json, ScriptedToolRunner, ToolStep};

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::pipeline::PreviewPipeline;

/// Mocks wired into a pipeline, kept around for assertions.
pub struct TestPipeline {
    pub pipeline: Arc<PreviewPipeline>,
    pub storage: Arc<MockObjectStorage>,
    pub store: Arc<MockSongStore>,
    pub tools: Arc<ScriptedToolRunner>,
}

/// Build a pipeline over fresh mocks with default settings.
pub fn test_pipeline() -> TestPipeline {
    test_pipeline_with(PipelineConfig::default(), ScriptedToolRunner::new())
}

pub fn test_pipeline_with(config: PipelineConfig, tools: ScriptedToolRunner) -> TestPipeline {
    let storage = Arc::new(MockObjectStorage::new());
    let store = Arc::new(MockSongStore::new());
    let tools = Arc::new(tools);
    let pipeline = Arc::new(PreviewPipeline::new(
        config,
        storage.clone(),
        store.clone(),
        tools.clone(),
    ));
    TestPipeline {
        pipeline,
        storage,
        store,
        tools,
    }
}
