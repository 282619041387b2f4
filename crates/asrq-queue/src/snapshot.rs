//! Point-in-time queue status for observers.

use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskStatus};

/// A queued task as shown to operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTaskView {
    pub id: String,
    pub priority: i64,
}

/// A processing or finished task without its full result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    pub id: String,
    pub priority: i64,
    pub status: TaskStatus,
    pub waiting_time: Option<f64>,
    pub processing_time: Option<f64>,
    pub result_display: String,
}

impl From<&Task> for TaskView {
    fn from(task: &Task) -> Self {
        let result_display = match (task.status, task.result.is_some()) {
            (TaskStatus::Processing, _) => "processing...",
            (TaskStatus::Completed, true) => "view details",
            (TaskStatus::Failed, true) => "failed, view details",
            _ => "N/A",
        };

        Self {
            id: task.id.clone(),
            priority: task.priority,
            status: task.status,
            waiting_time: task.waiting_time,
            processing_time: task.processing_time,
            result_display: result_display.to_string(),
        }
    }
}

/// Queue status pushed to status subscribers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub queue_size: usize,
    /// Queued tasks in service order.
    pub pending_tasks: Vec<PendingTaskView>,
    pub processing_tasks: Vec<TaskView>,
    pub recent_tasks: Vec<TaskView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_task_view_hides_result() {
        let mut task = Task::new("a.wav", 3, Utc::now());
        task.status = TaskStatus::Completed;
        task.result = Some("a very long transcript".to_string());

        let view = TaskView::from(&task);
        assert_eq!(view.result_display, "view details");
        assert_eq!(view.priority, 3);

        task.status = TaskStatus::Failed;
        assert_eq!(TaskView::from(&task).result_display, "failed, view details");

        task.status = TaskStatus::Processing;
        task.result = None;
        assert_eq!(TaskView::from(&task).result_display, "processing...");

        task.status = TaskStatus::Completed;
        assert_eq!(TaskView::from(&task).result_display, "N/A");
    }

    #[test]
    fn test_snapshot_serializes() {
        let snapshot = QueueSnapshot {
            queue_size: 1,
            pending_tasks: vec![PendingTaskView {
                id: "t".to_string(),
                priority: 1,
            }],
            ..Default::default()
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["queue_size"], 1);
        assert_eq!(json["pending_tasks"][0]["id"], "t");
        assert!(json["recent_tasks"].as_array().unwrap().is_empty());
    }
}
