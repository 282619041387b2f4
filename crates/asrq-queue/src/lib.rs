//! # asrq Queue
//!
//! Persistent priority queue and worker dispatch for transcription jobs.
//!
//! ## Features
//!
//! - Priority ordering with FIFO tie-break
//! - Task state persistence (SQLite), recovered on restart
//! - Level-triggered wake-up for idle workers
//! - One worker unit per configured device
//! - Per-task waiting/processing timings and windowed load statistics
//! - Retention cleanup of audio payloads

pub mod error;
pub mod executor;
pub mod heap;
pub mod payload;
pub mod queue;
pub mod retention;
mod schema;
pub mod service;
pub mod signal;
pub mod snapshot;
pub mod stats;
pub mod store;
pub mod task;
pub mod worker;

pub use error::QueueError;
pub use executor::{CommandExecutor, ExecutionRequest, Executor};
pub use heap::TaskHeap;
pub use payload::{FilePayloadStore, PayloadStore};
pub use queue::{CleanupReport, TaskQueue, MAX_HISTORY_PAGE_SIZE};
pub use retention::RetentionScheduler;
pub use service::QueueService;
pub use signal::AvailabilitySignal;
pub use snapshot::{PendingTaskView, QueueSnapshot, TaskView};
pub use stats::{QueueStatistics, WindowTotals};
pub use store::{SqliteTaskStore, TaskStore};
pub use task::{HistoryFilter, HistoryPage, QueueEntry, Task, TaskId, TaskStatus};
pub use worker::{Worker, WorkerPool, WorkerStats};
