//! Application state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::broadcast;

use asrq_queue::{QueueError, QueueService};

/// Snapshots buffered per status subscriber before it starts lagging.
const STATUS_CHANNEL_CAPACITY: usize = 16;

/// Application state shared across handlers.
pub struct AppState {
    pub service: Arc<QueueService>,
    max_queue_size: RwLock<usize>,
    sync_poll_interval: Duration,
    status_tx: broadcast::Sender<String>,
    start_time: Instant,
}

impl AppState {
    pub fn new(service: Arc<QueueService>) -> Self {
        let max_queue_size = service.config().queue.max_queue_size;
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);

        Self {
            service,
            max_queue_size: RwLock::new(max_queue_size),
            sync_poll_interval: Duration::from_millis(500),
            status_tx,
            start_time: Instant::now(),
        }
    }

    /// Override how often the blocking endpoint re-reads task status.
    pub fn with_sync_poll_interval(mut self, interval: Duration) -> Self {
        self.sync_poll_interval = interval;
        self
    }

    pub fn sync_poll_interval(&self) -> Duration {
        self.sync_poll_interval
    }

    /// Current admission limit.
    pub fn max_queue_size(&self) -> usize {
        *self.max_queue_size.read()
    }

    pub fn set_max_queue_size(&self, size: usize) {
        *self.max_queue_size.write() = size;
    }

    /// Get uptime.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Serialized queue snapshot as pushed to status subscribers.
    pub async fn snapshot_json(&self) -> Result<String, QueueError> {
        let recent_limit = self.service.config().status.recent_limit;
        let snapshot = self.service.queue().snapshot(recent_limit).await?;
        serde_json::to_string(&snapshot).map_err(|e| QueueError::Serialization(e.to_string()))
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<String> {
        self.status_tx.subscribe()
    }

    pub fn status_subscribers(&self) -> usize {
        self.status_tx.receiver_count()
    }

    /// Publish a snapshot, returning how many subscribers received it.
    pub fn publish_status(&self, json: String) -> usize {
        self.status_tx.send(json).unwrap_or(0)
    }
}
