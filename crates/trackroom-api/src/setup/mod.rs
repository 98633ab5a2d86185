//! Application setup and initialization

pub mod routes;
pub mod server;

use anyhow::{Context, Result};
use std::sync::Arc;
use trackroom_core::Config;
use trackroom_db::{create_pool, SongMediaStore, SongRepository};
use trackroom_infra::LogFormat;
use trackroom_processing::{PipelineConfig, PreviewPipeline, ProcessToolRunner};
use trackroom_storage::create_storage;
use trackroom_worker::{
    HttpTriggerEmitter, InProcessEmitter, RetriggerConfig, RetriggerService, TriggerEmitter,
};

use crate::state::AppState;

/// Build state and router from configuration: telemetry, database pool, storage,
/// pipeline and maintenance service.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    let log_format = config.log_format().parse::<LogFormat>().unwrap_or_default();
    trackroom_infra::init_telemetry("trackroom-api", log_format)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment(),
        storage_backend = %config.storage_backend(),
        "Configuration loaded and validated"
    );

    let pool = create_pool(&config)
        .await
        .context("Failed to connect to database")?;
    let store: Arc<dyn SongMediaStore> = Arc::new(SongRepository::new(pool));

    let storage = create_storage(&config)
        .await
        .context("Failed to initialize object storage")?;

    let pipeline = Arc::new(PreviewPipeline::new(
        PipelineConfig::from(&config),
        storage,
        store.clone(),
        Arc::new(ProcessToolRunner::new()),
    ));

    let retrigger_config = RetriggerConfig::from(&config);
    let emitter: Arc<dyn TriggerEmitter> = match config.trigger_url() {
        Some(url) => {
            tracing::info!(trigger_url = %url, "Re-trigger events go to external endpoint");
            Arc::new(HttpTriggerEmitter::new(
                url,
                config.service_secret().map(String::from),
                retrigger_config.item_timeout,
            )?)
        }
        None => Arc::new(InProcessEmitter::new(pipeline.clone())),
    };
    let retrigger = Arc::new(RetriggerService::new(
        store.clone(),
        emitter,
        retrigger_config,
    ));

    let state = Arc::new(AppState {
        pipeline,
        store,
        retrigger,
        service_secret: config.service_secret().map(String::from),
    });

    let router = routes::build_router(state.clone());
    Ok((state, router))
}
