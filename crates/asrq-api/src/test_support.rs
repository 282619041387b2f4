//! Shared fixtures for handler tests.

use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use asrq_config::Config;
use asrq_queue::{
    ExecutionRequest, Executor, FilePayloadStore, QueueError, QueueService, SqliteTaskStore,
};

/// Returns the payload text in upper case.
pub struct UpperExecutor;

#[async_trait]
impl Executor for UpperExecutor {
    fn name(&self) -> &str {
        "upper"
    }

    async fn execute(&self, request: &ExecutionRequest) -> Result<String, QueueError> {
        let bytes = tokio::fs::read(&request.payload)
            .await
            .map_err(|e| QueueError::ExecutionFailed(e.to_string()))?;
        Ok(String::from_utf8_lossy(&bytes).to_uppercase())
    }
}

/// A service over an in-memory store. Workers are not started.
pub async fn test_service() -> (Arc<QueueService>, TempDir) {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.queue.data_dir = dir.path().to_path_buf();
    config.workers.devices = vec!["cpu".to_string()];
    config.workers.poll_interval_ms = 20;
    config.retention.enabled = false;
    config.status.broadcast_interval_ms = 50;

    let store = Arc::new(SqliteTaskStore::in_memory().await.unwrap());
    let payloads = Arc::new(FilePayloadStore::new(dir.path().join("audio")).await.unwrap());
    let service = QueueService::with_components(config, store, payloads, Arc::new(UpperExecutor))
        .await
        .unwrap();

    (Arc::new(service), dir)
}
