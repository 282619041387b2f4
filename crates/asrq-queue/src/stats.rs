//! Windowed queue statistics.

use serde::{Deserialize, Serialize};

/// Raw aggregates over the terminal tasks of one window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowTotals {
    pub finished: u64,
    pub avg_waiting_time: Option<f64>,
    pub total_processing_time: Option<f64>,
}

/// Statistics for one trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStatistics {
    pub window_minutes: u64,
    pub finished_tasks: u64,
    /// Mean waiting time in seconds.
    pub avg_waiting_time: f64,
    /// Share of worker-seconds spent processing. Not capped at 100.
    pub avg_load_percent: f64,
}

impl QueueStatistics {
    pub fn from_totals(totals: &WindowTotals, window_minutes: u64, worker_count: usize) -> Self {
        let avg_waiting_time = totals.avg_waiting_time.unwrap_or(0.0);
        let capacity = window_minutes as f64 * 60.0 * worker_count as f64;
        let avg_load_percent = if capacity > 0.0 {
            100.0 * totals.total_processing_time.unwrap_or(0.0) / capacity
        } else {
            0.0
        };

        Self {
            window_minutes,
            finished_tasks: totals.finished,
            avg_waiting_time: round2(avg_waiting_time),
            avg_load_percent: round2(avg_load_percent),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
