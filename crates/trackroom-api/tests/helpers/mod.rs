//! Shared setup for API integration tests.

#![allow(dead_code)]

use axum_test::TestServer;
use std::sync::Arc;
use trackroom_api::setup::routes::build_router;
use trackroom_api::state::AppState;
use trackroom_processing::test_helpers::{
    test_pipeline_with, MockObjectStorage, MockSongStore, ScriptedToolRunner,
};
use trackroom_processing::PipelineConfig;
use trackroom_worker::{InProcessEmitter, RetriggerConfig, RetriggerService};
use uuid::Uuid;

pub const TEST_SERVICE_SECRET: &str = "test-service-secret-0123";
pub const SOURCE_BUCKET: &str = "audio-originals";
pub const PREVIEW_BUCKET: &str = "audio-previews";

pub struct TestApp {
    pub client: TestServer,
    pub storage: Arc<MockObjectStorage>,
    pub store: Arc<MockSongStore>,
    pub tools: Arc<ScriptedToolRunner>,
}

impl TestApp {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", TEST_SERVICE_SECRET)
    }

    /// Store an original and its song row; returns the object name.
    pub fn seed_song(&self, song_id: Uuid, file: &str) -> String {
        let path = format!("{}/{}", song_id, file);
        self.storage
            .put(SOURCE_BUCKET, &path, b"RIFF original master bytes".to_vec());
        self.store.insert_song(song_id, Some(&path));
        path
    }
}

pub fn setup_test_app() -> TestApp {
    setup_test_app_with(ScriptedToolRunner::new())
}

pub fn setup_test_app_with(tools: ScriptedToolRunner) -> TestApp {
    let tp = test_pipeline_with(PipelineConfig::default(), tools);

    let emitter = Arc::new(InProcessEmitter::new(tp.pipeline.clone()));
    let retrigger = Arc::new(RetriggerService::new(
        tp.store.clone(),
        emitter,
        RetriggerConfig::default(),
    ));

    let state = Arc::new(AppState {
        pipeline: tp.pipeline.clone(),
        store: tp.store.clone(),
        retrigger,
        service_secret: Some(TEST_SERVICE_SECRET.to_string()),
    });

    let client = TestServer::new(build_router(state)).expect("Failed to create test server");

    TestApp {
        client,
        storage: tp.storage,
        store: tp.store,
        tools: tp.tools,
    }
}
