//! Shared application state

use std::sync::Arc;
use trackroom_db::SongMediaStore;
use trackroom_processing::PreviewPipeline;
use trackroom_worker::RetriggerService;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PreviewPipeline>,
    pub store: Arc<dyn SongMediaStore>,
    pub retrigger: Arc<RetriggerService>,
    /// Bearer credential for the hook and admin routes. `None` disables the check.
    pub service_secret: Option<String>,
}
