//! Worker units that drain the queue.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use asrq_config::WorkersConfig;

use crate::error::QueueError;
use crate::executor::{ExecutionRequest, Executor};
use crate::queue::TaskQueue;
use crate::task::{Task, TaskStatus};

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;

/// Counters of a single worker.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStats {
    pub id: u32,
    pub device: String,
    pub busy: bool,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
}

/// A single worker bound to one execution device.
pub struct Worker {
    id: u32,
    device: String,
    queue: Arc<TaskQueue>,
    executor: Arc<dyn Executor>,
    poll_interval: Duration,
    busy: AtomicBool,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
}

impl Worker {
    /// Create a new worker.
    pub fn new(
        id: u32,
        device: impl Into<String>,
        queue: Arc<TaskQueue>,
        executor: Arc<dyn Executor>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            id,
            device: device.into(),
            queue,
            executor,
            poll_interval,
            busy: AtomicBool::new(false),
            tasks_completed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
        }
    }

    /// Get worker ID.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Check if worker is executing a task.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Get completed task count.
    pub fn tasks_completed(&self) -> u64 {
        self.tasks_completed.load(Ordering::SeqCst)
    }

    /// Get failed task count.
    pub fn tasks_failed(&self) -> u64 {
        self.tasks_failed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            id: self.id,
            device: self.device.clone(),
            busy: self.is_busy(),
            tasks_completed: self.tasks_completed(),
            tasks_failed: self.tasks_failed(),
        }
    }

    /// Pull and execute tasks until `token` is cancelled.
    ///
    /// Cancellation is observed between tasks only; a task already popped
    /// always reaches a terminal state.
    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        info!("Worker {} started on device {}", self.id, self.device);

        loop {
            if token.is_cancelled() {
                break;
            }

            let available = tokio::select! {
                _ = token.cancelled() => break,
                available = self.queue.wait_for_task(self.poll_interval) => available,
            };
            if !available {
                continue;
            }

            match self.queue.pop().await {
                Ok(Some(task)) => {
                    if let Err(e) = self.process(task).await {
                        error!("Worker {} could not record task outcome: {}", self.id, e);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Worker {} failed to pop a task: {}", self.id, e);
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }

        info!("Worker {} stopped", self.id);
    }

    /// Execute a popped task and record its terminal status.
    pub async fn process(&self, task: Task) -> Result<Task, QueueError> {
        self.busy.store(true, Ordering::SeqCst);
        debug!("Worker {} processing task {}", self.id, task.id);

        let outcome = self.execute(&task).await;

        let (status, result) = match outcome {
            Ok(text) => {
                debug!("Worker {} completed task {}", self.id, task.id);
                (TaskStatus::Completed, text)
            }
            Err(message) => {
                warn!("Worker {} failed task {}: {}", self.id, task.id, message);
                (TaskStatus::Failed, message)
            }
        };

        let updated = self
            .queue
            .update_task_status(&task.id, status, Some(result))
            .await;
        // Only outcomes that reached the store are counted
        if updated.is_ok() {
            let counter = match status {
                TaskStatus::Completed => &self.tasks_completed,
                _ => &self.tasks_failed,
            };
            counter.fetch_add(1, Ordering::SeqCst);
        }
        self.busy.store(false, Ordering::SeqCst);
        updated
    }

    async fn execute(&self, task: &Task) -> Result<String, String> {
        let payloads = self.queue.payloads();
        let Some(payload_ref) = task.payload_ref.as_deref() else {
            return Err("payload missing: reference was cleared".to_string());
        };

        let payload = payloads.resolve(payload_ref);
        if !payloads.exists(payload_ref).await {
            return Err(format!("payload missing: {}", payload.display()));
        }

        let request = ExecutionRequest {
            task_id: task.id.clone(),
            payload,
            device: self.device.clone(),
        };

        // Spawned so a panicking executor still yields a terminal status.
        let executor = self.executor.clone();
        match tokio::spawn(async move { executor.execute(&request).await }).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(format!("executor panicked: {}", e)),
        }
    }
}

/// One worker per configured device, sharing a queue and an executor.
pub struct WorkerPool {
    workers: Vec<Arc<Worker>>,
    token: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a new worker pool. Cancelling `token` also stops the pool.
    pub fn new(
        queue: Arc<TaskQueue>,
        executor: Arc<dyn Executor>,
        config: &WorkersConfig,
        token: CancellationToken,
    ) -> Self {
        let poll_interval = Duration::from_millis(config.poll_interval_ms);
        let workers = config
            .devices
            .iter()
            .enumerate()
            .map(|(i, device)| {
                Arc::new(Worker::new(
                    i as u32,
                    device.clone(),
                    queue.clone(),
                    executor.clone(),
                    poll_interval,
                ))
            })
            .collect();

        Self {
            workers,
            token: token.child_token(),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn every worker. Calling it again while running does nothing.
    pub async fn start(&self) {
        let mut handles = self.handles.lock().await;
        if !handles.is_empty() {
            return;
        }

        for worker in &self.workers {
            handles.push(tokio::spawn(worker.clone().run(self.token.clone())));
        }
        info!("Worker pool started with {} workers", self.workers.len());
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn workers(&self) -> &[Arc<Worker>] {
        &self.workers
    }

    pub fn stats(&self) -> Vec<WorkerStats> {
        self.workers.iter().map(|w| w.stats()).collect()
    }

    /// Total tasks finished by all workers.
    pub fn total_processed(&self) -> u64 {
        self.workers
            .iter()
            .map(|w| w.tasks_completed() + w.tasks_failed())
            .sum()
    }

    /// Stop pulling new work and wait for in-flight tasks to finish.
    pub async fn shutdown(&self) {
        self.token.cancel();

        let handles: Vec<JoinHandle<()>> = self.handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Worker task ended abnormally: {}", e);
            }
        }
        info!("Worker pool stopped");
    }
}
