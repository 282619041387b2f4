//! Queue errors.

use thiserror::Error;

/// Queue error types.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Task not found.
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Admission rejected because the backlog is at capacity.
    #[error("Queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Payload storage error.
    #[error("Payload error: {0}")]
    Payload(String),

    /// Task execution failed.
    #[error("Task execution failed: {0}")]
    ExecutionFailed(String),

    /// Encoding a response or snapshot failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error.
    #[error("{0}")]
    Custom(String),
}

impl From<tokio_rusqlite::Error> for QueueError {
    fn from(e: tokio_rusqlite::Error) -> Self {
        QueueError::Database(e.to_string())
    }
}

impl From<rusqlite::Error> for QueueError {
    fn from(e: rusqlite::Error) -> Self {
        QueueError::Database(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_full_display() {
        let err = QueueError::QueueFull { capacity: 10 };
        assert_eq!(err.to_string(), "Queue is full (capacity 10)");
    }

    #[test]
    fn test_task_not_found_display() {
        let err = QueueError::TaskNotFound("abc".to_string());
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let err = QueueError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, QueueError::Database(_)));
    }
}
