//! HTTP route definitions.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::http::handlers::{submit_async, submit_sync, task_detail, task_status};
use crate::http::{admin, monitoring};
use crate::state::AppState;
use crate::websocket::status_ws;

/// Create the main router.
///
/// ## Route Structure
///
/// ```text
/// /api/asr
///   POST   /api/asr/async        - Submit audio, return task id
///   POST   /api/asr/sync         - Submit audio, wait for the result
///   GET    /api/asr/status/{id}  - Task status
///
/// /api
///   GET    /api/task/{id}        - Full task record
///   GET    /api/statistics       - Windowed waiting time and load
///   GET    /api/history          - Finished tasks, paginated
///   GET    /api/config           - Runtime settings
///   PUT    /api/config           - Update runtime settings
///   GET    /api/workers          - Per-worker counters
///   POST   /api/cleanup          - Run a retention pass now
///
/// /health    - Detailed health check
/// /livez     - Liveness check
/// /ws/status - Queue status stream
/// ```
pub fn create_router(state: Arc<AppState>) -> Router {
    let max_upload_bytes = state
        .service
        .config()
        .server
        .max_upload_mb
        .saturating_mul(1024 * 1024);

    let asr_routes = Router::new()
        .route("/async", post(submit_async))
        .route("/sync", post(submit_sync))
        .route("/status/{id}", get(task_status))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route("/task/{id}", get(task_detail))
        .route("/statistics", get(admin::statistics))
        .route("/history", get(admin::history))
        .route("/config", get(admin::get_config).put(admin::update_config))
        .route("/workers", get(admin::workers))
        .route("/cleanup", post(admin::cleanup))
        .with_state(state.clone());

    let monitoring_routes = Router::new()
        .route("/health", get(monitoring::health_check))
        .with_state(state.clone());

    // Liveness check has no state dependency
    let liveness_route = Router::new().route("/livez", get(monitoring::liveness_check));

    let ws_route = Router::new()
        .route("/ws/status", get(status_ws))
        .with_state(state);

    let api_routes = Router::new().nest("/asr", asr_routes).merge(admin_routes);

    Router::new()
        .nest("/api", api_routes)
        .merge(monitoring_routes)
        .merge(liveness_route)
        .merge(ws_route)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
