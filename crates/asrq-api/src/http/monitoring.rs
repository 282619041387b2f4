//! Health check handlers.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Service is healthy.
    Healthy,
    /// Service is degraded but functional.
    Degraded,
    /// Service is unhealthy.
    Unhealthy,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub queue_size: usize,
    pub workers: usize,
    pub components: Vec<ComponentHealth>,
}

/// Component health status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentHealth {
    fn healthy(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Healthy,
            message: None,
        }
    }
}

/// Worst status among the components.
fn overall_status(components: &[ComponentHealth]) -> HealthStatus {
    if components.iter().any(|c| c.status == HealthStatus::Unhealthy) {
        HealthStatus::Unhealthy
    } else if components.iter().any(|c| c.status == HealthStatus::Degraded) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let queue = state.service.queue();

    let database = match queue.get_recent_tasks(1).await {
        Ok(_) => ComponentHealth::healthy("database"),
        Err(e) => ComponentHealth {
            name: "database".to_string(),
            status: HealthStatus::Unhealthy,
            message: Some(e.to_string()),
        },
    };

    let worker_count = state.service.worker_count();
    let workers = if worker_count > 0 {
        ComponentHealth::healthy("workers")
    } else {
        ComponentHealth {
            name: "workers".to_string(),
            status: HealthStatus::Degraded,
            message: Some("no execution devices configured".to_string()),
        }
    };

    let components = vec![database, workers];

    Json(HealthResponse {
        status: overall_status(&components),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime().as_secs(),
        queue_size: queue.size().await,
        workers: worker_count,
        components,
    })
}

/// Liveness check (Kubernetes).
pub async fn liveness_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive"
    }))
}
