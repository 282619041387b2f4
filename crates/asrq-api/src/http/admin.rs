//! Queue administration endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use asrq_config::MAX_WINDOW_MINUTES;
use asrq_queue::{CleanupReport, HistoryFilter, HistoryPage, WorkerStats};

use crate::error::ApiError;
use crate::state::AppState;

/// Averages for one statistics window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowStatistics {
    pub avg_waiting_time: f64,
    pub avg_load_percent: f64,
}

/// Statistics keyed by window, e.g. `last_5_min`.
pub type StatisticsResponse = BTreeMap<String, WindowStatistics>;

/// GET /api/statistics
pub async fn statistics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatisticsResponse>, ApiError> {
    let stats = state.service.statistics().await?;
    let response = stats
        .into_iter()
        .map(|s| {
            (
                format!("last_{}_min", s.window_minutes),
                WindowStatistics {
                    avg_waiting_time: s.avg_waiting_time,
                    avg_load_percent: s.avg_load_percent,
                },
            )
        })
        .collect();
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    /// `completed`, `failed` or `all`.
    pub status: Option<String>,
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    20
}

/// GET /api/history
pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryPage>, ApiError> {
    let filter = HistoryFilter::parse(params.status.as_deref())?;
    let page = state
        .service
        .queue()
        .get_history_tasks(params.page, params.page_size, filter)
        .await?;
    Ok(Json(page))
}

/// Settings adjustable while the server runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub max_queue_size: usize,
}

/// GET /api/config
pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<RuntimeConfig> {
    Json(RuntimeConfig {
        max_queue_size: state.max_queue_size(),
    })
}

/// PUT /api/config
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(update): Json<RuntimeConfig>,
) -> Result<Json<RuntimeConfig>, ApiError> {
    if update.max_queue_size == 0 {
        return Err(ApiError::BadRequest(
            "max_queue_size must be at least 1".to_string(),
        ));
    }

    state.set_max_queue_size(update.max_queue_size);
    info!("max_queue_size set to {}", update.max_queue_size);
    Ok(Json(update))
}

/// GET /api/workers
pub async fn workers(State(state): State<Arc<AppState>>) -> Json<Vec<WorkerStats>> {
    Json(state.service.worker_stats())
}

#[derive(Debug, Deserialize)]
pub struct CleanupParams {
    /// Age threshold; the configured retention age when absent.
    pub minutes: Option<u64>,
}

/// Run one retention pass now.
///
/// POST /api/cleanup
pub async fn cleanup(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CleanupParams>,
) -> Result<Json<CleanupReport>, ApiError> {
    let minutes = params
        .minutes
        .unwrap_or(state.service.config().retention.max_age_minutes);
    if minutes > MAX_WINDOW_MINUTES {
        return Err(ApiError::BadRequest(format!(
            "minutes cannot exceed {}",
            MAX_WINDOW_MINUTES
        )));
    }
    let report = state.service.queue().cleanup_old_audio_data(minutes).await?;
    Ok(Json(report))
}
