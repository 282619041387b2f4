//! Transcription job handlers.
//!
//! The request body is the raw audio; priority and file extension travel in
//! the query string.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use asrq_queue::{QueueError, Task, TaskId, TaskStatus};

use crate::error::ApiError;
use crate::state::AppState;

/// Smallest accepted priority value.
pub const MIN_PRIORITY: i64 = 1;
/// Largest accepted priority value.
pub const MAX_PRIORITY: i64 = 100;

/// Query parameters of a submission.
#[derive(Debug, Deserialize)]
pub struct SubmitParams {
    #[serde(default = "default_priority")]
    pub priority: i64,

    /// Payload file extension, e.g. `wav` or `mp3`.
    #[serde(default = "default_ext")]
    pub ext: String,
}

fn default_priority() -> i64 {
    10
}

fn default_ext() -> String {
    "wav".to_string()
}

/// Response of the non-blocking submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub task_id: TaskId,
    pub status_url: String,
}

/// Terminal outcome returned by the blocking submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskResultResponse {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub result: Option<String>,
}

/// Status-only view of a task.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    pub task_id: TaskId,
    pub status: TaskStatus,
}

/// Save the payload and admit the task, or reject it when the queue is full.
async fn enqueue(state: &AppState, params: &SubmitParams, body: Bytes) -> Result<Task, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("Request body is empty".to_string()));
    }
    if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&params.priority) {
        return Err(ApiError::BadRequest(format!(
            "Priority must be between {} and {}",
            MIN_PRIORITY, MAX_PRIORITY
        )));
    }

    let capacity = state.max_queue_size();
    let queue = state.service.queue();
    if queue.size().await >= capacity {
        return Err(ApiError::QueueFull { capacity });
    }

    let payloads = state.service.payloads();
    let payload_ref = payloads.save(&body, &params.ext).await?;

    match queue.try_push(payload_ref.clone(), params.priority, capacity).await {
        Ok(task) => {
            info!(
                "Accepted task {} ({} bytes, priority {})",
                task.id,
                body.len(),
                task.priority
            );
            Ok(task)
        }
        Err(e) => {
            if let Err(remove_err) = payloads.remove(&payload_ref).await {
                warn!("Failed to remove rejected payload {}: {}", payload_ref, remove_err);
            }
            Err(e.into())
        }
    }
}

/// Submit a job and return immediately.
///
/// POST /api/asr/async
pub async fn submit_async(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SubmitParams>,
    body: Bytes,
) -> Result<Json<SubmitResponse>, ApiError> {
    let task = enqueue(&state, &params, body).await?;
    Ok(Json(SubmitResponse {
        status_url: format!("/api/asr/status/{}", task.id),
        task_id: task.id,
    }))
}

/// Submit a job and hold the request until it finishes.
///
/// POST /api/asr/sync
pub async fn submit_sync(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SubmitParams>,
    body: Bytes,
) -> Result<Json<TaskResultResponse>, ApiError> {
    let task = enqueue(&state, &params, body).await?;
    let queue = state.service.queue();

    loop {
        tokio::time::sleep(state.sync_poll_interval()).await;

        let current = queue
            .get_task(&task.id)
            .await?
            .ok_or_else(|| QueueError::TaskNotFound(task.id.clone()))?;

        if current.is_terminal() {
            return Ok(Json(TaskResultResponse {
                task_id: current.id,
                status: current.status,
                result: current.result,
            }));
        }
    }
}

/// GET /api/asr/status/{id}
pub async fn task_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskStatusResponse>, ApiError> {
    let task = state
        .service
        .queue()
        .get_task(&id)
        .await?
        .ok_or(QueueError::TaskNotFound(id))?;

    Ok(Json(TaskStatusResponse {
        task_id: task.id,
        status: task.status,
    }))
}

/// Full task record including the result text.
///
/// GET /api/task/{id}
pub async fn task_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let task = state
        .service
        .queue()
        .get_task(&id)
        .await?
        .ok_or(QueueError::TaskNotFound(id))?;
    Ok(Json(task))
}
