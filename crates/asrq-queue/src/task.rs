//! Task definition and status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::QueueError;

/// Task identifier (UUID v4, hyphenated).
pub type TaskId = String;

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting in queue.
    #[default]
    Pending,
    /// Popped by a worker.
    Processing,
    /// Finished with a transcript.
    Completed,
    /// Finished with an error description.
    Failed,
}

impl TaskStatus {
    /// Persisted name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Completed and Failed admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(QueueError::Custom(format!("Unknown task status: {}", other))),
        }
    }
}

/// A transcription task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID.
    pub id: TaskId,
    /// Reference to the audio input; cleared by retention cleanup.
    pub payload_ref: Option<String>,
    /// Task priority.
    pub priority: i64,
    /// Current status.
    pub status: TaskStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last status transition.
    pub updated_at: Option<DateTime<Utc>>,
    /// Transcript or error description.
    pub result: Option<String>,
    /// Seconds between creation and being popped.
    pub waiting_time: Option<f64>,
    /// Seconds spent in the most recent processing interval.
    pub processing_time: Option<f64>,
}

impl Task {
    /// Create a new pending task.
    pub fn new(payload_ref: impl Into<String>, priority: i64, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            payload_ref: Some(payload_ref.into()),
            priority,
            status: TaskStatus::Pending,
            created_at,
            updated_at: None,
            result: None,
            waiting_time: None,
            processing_time: None,
        }
    }

    /// Check if task reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Ordering key of this task in the queue.
    pub fn queue_entry(&self) -> QueueEntry {
        QueueEntry {
            id: self.id.clone(),
            priority: self.priority,
            created_at: self.created_at,
        }
    }
}

/// The part of a task the in-memory heap needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: TaskId,
    pub priority: i64,
    pub created_at: DateTime<Utc>,
}

/// Which finished tasks a history query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryFilter {
    Completed,
    Failed,
    /// Both completed and failed tasks.
    #[default]
    All,
}

impl HistoryFilter {
    /// Statuses matched by this filter.
    pub fn statuses(&self) -> &'static [TaskStatus] {
        match self {
            HistoryFilter::Completed => &[TaskStatus::Completed],
            HistoryFilter::Failed => &[TaskStatus::Failed],
            HistoryFilter::All => &[TaskStatus::Completed, TaskStatus::Failed],
        }
    }

    /// Parse an optional query value; absent means [`HistoryFilter::All`].
    pub fn parse(value: Option<&str>) -> Result<Self, QueueError> {
        match value.map(str::trim) {
            None | Some("") | Some("all") => Ok(HistoryFilter::All),
            Some("completed") => Ok(HistoryFilter::Completed),
            Some("failed") => Ok(HistoryFilter::Failed),
            Some(other) => Err(QueueError::Custom(format!(
                "Unknown history filter '{}', expected completed, failed or all",
                other
            ))),
        }
    }
}

/// One page of finished tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPage {
    pub tasks: Vec<Task>,
    pub total_count: u64,
    pub total_pages: u64,
    pub current_page: u64,
    pub page_size: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl HistoryPage {
    /// Assemble page metadata around a slice of results.
    pub fn new(tasks: Vec<Task>, total_count: u64, page: u64, page_size: u64) -> Self {
        let total_pages = total_count.div_ceil(page_size.max(1));
        Self {
            tasks,
            total_count,
            total_pages,
            current_page: page,
            page_size,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}
