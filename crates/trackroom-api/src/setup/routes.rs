//! Route table and middleware stack

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use trackroom_infra::request_id_middleware;

use crate::auth::require_service_token;
use crate::handlers::{admin, health, hooks};
use crate::state::AppState;

/// Trigger payloads are small JSON documents.
const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/hooks/storage", post(hooks::storage_hook))
        .route("/admin/retrofix", post(admin::retrofix))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_service_token,
        ));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
        .with_state(state)
}
