//! Process-wide queue context.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use asrq_config::Config;

use crate::error::QueueError;
use crate::executor::{CommandExecutor, Executor};
use crate::payload::{FilePayloadStore, PayloadStore};
use crate::queue::TaskQueue;
use crate::retention::RetentionScheduler;
use crate::stats::QueueStatistics;
use crate::store::{SqliteTaskStore, TaskStore};
use crate::worker::{WorkerPool, WorkerStats};

/// Owns the queue, the worker pool and the retention loop.
///
/// Built once at startup and shared by reference with the request layer.
pub struct QueueService {
    config: Config,
    queue: Arc<TaskQueue>,
    pool: WorkerPool,
    token: CancellationToken,
    retention: Mutex<Option<JoinHandle<()>>>,
}

impl QueueService {
    /// Open the database and payload directory named by `config`.
    pub async fn open(config: &Config) -> Result<Self, QueueError> {
        let db_path = config.queue.db_path();
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| QueueError::Database(format!("{}: {}", parent.display(), e)))?;
        }

        let store = Arc::new(SqliteTaskStore::open(&db_path).await?);
        let payloads = Arc::new(FilePayloadStore::new(config.queue.payload_dir()).await?);
        let executor = Arc::new(CommandExecutor::from_config(&config.executor));

        info!(
            "Queue database {}, payloads in {}, executor {}",
            db_path.display(),
            payloads.root().display(),
            executor.name()
        );

        Self::with_components(config.clone(), store, payloads, executor).await
    }

    /// Assemble a service from explicit parts.
    pub async fn with_components(
        config: Config,
        store: Arc<dyn TaskStore>,
        payloads: Arc<dyn PayloadStore>,
        executor: Arc<dyn Executor>,
    ) -> Result<Self, QueueError> {
        let queue = Arc::new(TaskQueue::open(store, payloads, config.queue.priority_order).await?);
        let token = CancellationToken::new();
        let pool = WorkerPool::new(queue.clone(), executor, &config.workers, token.clone());

        Ok(Self {
            config,
            queue,
            pool,
            token,
            retention: Mutex::new(None),
        })
    }

    /// Start workers and the retention loop.
    pub async fn start(&self) {
        self.pool.start().await;

        let mut retention = self.retention.lock().await;
        if retention.is_none() {
            *retention =
                RetentionScheduler::spawn(self.queue.clone(), &self.config.retention, self.token.clone());
        }
    }

    /// Stop taking work and join every background task.
    pub async fn shutdown(&self) {
        info!("Shutting down queue service");
        self.token.cancel();
        self.pool.shutdown().await;

        if let Some(handle) = self.retention.lock().await.take() {
            if let Err(e) = handle.await {
                error!("Retention task ended abnormally: {}", e);
            }
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    pub fn payloads(&self) -> &Arc<dyn PayloadStore> {
        self.queue.payloads()
    }

    pub fn worker_count(&self) -> usize {
        self.pool.size()
    }

    pub fn worker_stats(&self) -> Vec<WorkerStats> {
        self.pool.stats()
    }

    /// Statistics for each configured window.
    pub async fn statistics(&self) -> Result<Vec<QueueStatistics>, QueueError> {
        let mut stats = Vec::with_capacity(self.config.status.statistics_windows.len());
        for window in &self.config.status.statistics_windows {
            stats.push(
                self.queue
                    .calculate_statistics(*window, self.worker_count())
                    .await?,
            );
        }
        Ok(stats)
    }
}
