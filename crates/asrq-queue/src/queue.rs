//! Persistent priority queue facade.

use std::sync::Arc;
use std::time::Duration;

use asrq_config::PriorityOrder;
use chrono::{DateTime, Duration as ChronoDuration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::QueueError;
use crate::heap::TaskHeap;
use crate::payload::PayloadStore;
use crate::signal::AvailabilitySignal;
use crate::snapshot::{PendingTaskView, QueueSnapshot, TaskView};
use crate::stats::QueueStatistics;
use crate::store::{seconds_between, TaskStore};
use crate::task::{HistoryFilter, HistoryPage, Task, TaskStatus};

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

/// Largest page a history query returns.
pub const MAX_HISTORY_PAGE_SIZE: u64 = 500;

/// Outcome of one retention pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub removed_files: usize,
    pub cleared_records: usize,
    pub errors: usize,
}

/// The instant `minutes` before now, or `None` when it is not representable.
fn minutes_ago(minutes: u64) -> Option<DateTime<Utc>> {
    let minutes = i64::try_from(minutes).ok()?;
    let delta = ChronoDuration::try_minutes(minutes)?;
    Utc::now().checked_sub_signed(delta)
}

struct QueueState {
    heap: TaskHeap,
    last_created_at: Option<DateTime<Utc>>,
}

impl QueueState {
    /// Microsecond timestamp strictly after every previously issued one.
    fn next_created_at(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now().trunc_subsecs(6);
        if let Some(last) = self.last_created_at {
            if now <= last {
                now = last + ChronoDuration::microseconds(1);
            }
        }
        self.last_created_at = Some(now);
        now
    }
}

/// Priority task queue backed by a durable store.
///
/// The heap holds every pending task plus any task recovered in the
/// processing state. One lock guards the heap and is held across the paired
/// store write, never across a wait or an execution.
pub struct TaskQueue {
    store: Arc<dyn TaskStore>,
    payloads: Arc<dyn PayloadStore>,
    state: Mutex<QueueState>,
    signal: AvailabilitySignal,
}

impl TaskQueue {
    /// Open the queue and re-queue every unfinished task found in the store.
    pub async fn open(
        store: Arc<dyn TaskStore>,
        payloads: Arc<dyn PayloadStore>,
        order: PriorityOrder,
    ) -> Result<Self, QueueError> {
        let backlog = store.load_backlog().await?;
        let last_created_at = store.latest_created_at().await?;

        let mut heap = TaskHeap::new(order);
        let count = backlog.len();
        for entry in backlog {
            heap.push(entry);
        }

        let signal = AvailabilitySignal::new();
        if !heap.is_empty() {
            signal.raise();
        }

        info!("Task queue opened, {} unfinished tasks recovered", count);

        Ok(Self {
            store,
            payloads,
            state: Mutex::new(QueueState {
                heap,
                last_created_at,
            }),
            signal,
        })
    }

    /// Payload storage shared with the workers.
    pub fn payloads(&self) -> &Arc<dyn PayloadStore> {
        &self.payloads
    }

    /// Enqueue a task without an admission check.
    pub async fn push(&self, payload_ref: impl Into<String>, priority: i64) -> Result<Task, QueueError> {
        let mut state = self.state.lock().await;
        self.push_locked(&mut state, payload_ref.into(), priority).await
    }

    /// Enqueue a task unless `capacity` tasks are already queued.
    pub async fn try_push(
        &self,
        payload_ref: impl Into<String>,
        priority: i64,
        capacity: usize,
    ) -> Result<Task, QueueError> {
        let mut state = self.state.lock().await;
        if state.heap.len() >= capacity {
            return Err(QueueError::QueueFull { capacity });
        }
        self.push_locked(&mut state, payload_ref.into(), priority).await
    }

    async fn push_locked(
        &self,
        state: &mut QueueState,
        payload_ref: String,
        priority: i64,
    ) -> Result<Task, QueueError> {
        let created_at = state.next_created_at();
        let task = Task::new(payload_ref, priority, created_at);

        self.store.insert(&task).await?;
        state.heap.push(task.queue_entry());
        self.signal.raise();

        debug!("Task {} queued with priority {}", task.id, priority);
        Ok(task)
    }

    /// Take the most urgent task and mark it processing.
    ///
    /// The availability signal is lowered once the heap is left empty. If the
    /// store write fails the entry goes back and the signal is raised again.
    pub async fn pop(&self) -> Result<Option<Task>, QueueError> {
        let mut state = self.state.lock().await;

        loop {
            let Some(entry) = state.heap.pop() else {
                self.signal.lower();
                return Ok(None);
            };

            let now = Utc::now();
            let waiting_time = seconds_between(entry.created_at, now);

            match self.store.mark_processing(&entry.id, waiting_time, now).await {
                Ok(Some(task)) => {
                    if state.heap.is_empty() {
                        self.signal.lower();
                    }
                    return Ok(Some(task));
                }
                Ok(None) => {
                    warn!("Dropping queue entry {} with no unfinished record", entry.id);
                }
                Err(e) => {
                    state.heap.push(entry);
                    self.signal.raise();
                    return Err(e);
                }
            }
        }
    }

    /// Wait up to `timeout` for the availability signal.
    pub async fn wait_for_task(&self, timeout: Duration) -> bool {
        self.signal.wait(timeout).await
    }

    pub async fn get_task(&self, id: &str) -> Result<Option<Task>, QueueError> {
        self.store.get(id).await
    }

    /// Record a terminal status and the processing time of the interval it closes.
    pub async fn update_task_status(
        &self,
        id: &str,
        status: TaskStatus,
        result: Option<String>,
    ) -> Result<Task, QueueError> {
        if !status.is_terminal() {
            return Err(QueueError::Custom(format!(
                "Task status can only be set to completed or failed, got {}",
                status
            )));
        }

        let mut state = self.state.lock().await;
        let processing_time = self
            .store
            .finish(id, status, result, Utc::now())
            .await?
            .ok_or_else(|| QueueError::TaskNotFound(id.to_string()))?;
        state.heap.remove(id);
        drop(state);

        debug!("Task {} {} after {:.2}s", id, status, processing_time);

        self.store
            .get(id)
            .await?
            .ok_or_else(|| QueueError::TaskNotFound(id.to_string()))
    }

    /// Number of queued tasks.
    pub async fn size(&self) -> usize {
        self.state.lock().await.heap.len()
    }

    pub async fn calculate_statistics(
        &self,
        window_minutes: u64,
        worker_count: usize,
    ) -> Result<QueueStatistics, QueueError> {
        // A window reaching past the epoch covers every recorded task
        let since = minutes_ago(window_minutes).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let totals = self.store.window_totals(since).await?;
        Ok(QueueStatistics::from_totals(&totals, window_minutes, worker_count))
    }

    /// Delete payloads of finished tasks created more than `minutes` ago.
    ///
    /// Records keep every other field. A payload that fails to delete keeps
    /// its reference so the next pass retries it.
    pub async fn cleanup_old_audio_data(&self, minutes: u64) -> Result<CleanupReport, QueueError> {
        let mut report = CleanupReport::default();
        let Some(before) = minutes_ago(minutes) else {
            debug!("Retention cutoff of {} minutes predates any task, nothing to clean", minutes);
            return Ok(report);
        };
        let expired = self.store.expired_payloads(before).await?;

        for (id, payload_ref) in expired {
            match self.payloads.remove(&payload_ref).await {
                Ok(removed) => {
                    if removed {
                        report.removed_files += 1;
                    }
                }
                Err(e) => {
                    warn!("Failed to remove payload of task {}: {}", id, e);
                    report.errors += 1;
                    continue;
                }
            }

            if self.store.clear_payload(&id).await? {
                report.cleared_records += 1;
            }
        }

        if report.cleared_records > 0 || report.errors > 0 {
            info!(
                "Retention cleanup: {} files removed, {} records cleared, {} errors",
                report.removed_files, report.cleared_records, report.errors
            );
        }

        Ok(report)
    }

    /// Most recently finished tasks.
    pub async fn get_recent_tasks(&self, limit: usize) -> Result<Vec<Task>, QueueError> {
        self.store.recent(limit).await
    }

    pub async fn get_processing_tasks(&self) -> Result<Vec<Task>, QueueError> {
        self.store.processing().await
    }

    /// One page of finished tasks, newest first. Pages start at 1.
    pub async fn get_history_tasks(
        &self,
        page: u64,
        page_size: u64,
        filter: HistoryFilter,
    ) -> Result<HistoryPage, QueueError> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_HISTORY_PAGE_SIZE);
        let offset = (page - 1).saturating_mul(page_size);

        let (tasks, total) = self.store.history(filter, page_size, offset).await?;
        Ok(HistoryPage::new(tasks, total, page, page_size))
    }

    /// Status snapshot; the pending part is read under a single lock acquisition.
    pub async fn snapshot(&self, recent_limit: usize) -> Result<QueueSnapshot, QueueError> {
        let pending_tasks: Vec<PendingTaskView> = {
            let state = self.state.lock().await;
            state
                .heap
                .ordered()
                .into_iter()
                .map(|e| PendingTaskView {
                    id: e.id,
                    priority: e.priority,
                })
                .collect()
        };

        let processing_tasks = self.store.processing().await?;
        let recent_tasks = self.store.recent(recent_limit).await?;

        Ok(QueueSnapshot {
            queue_size: pending_tasks.len(),
            pending_tasks,
            processing_tasks: processing_tasks.iter().map(TaskView::from).collect(),
            recent_tasks: recent_tasks.iter().map(TaskView::from).collect(),
        })
    }
}
