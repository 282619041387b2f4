//! Queue, worker, executor and retention configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{default_data_dir, default_true};
use crate::loader::ConfigLoader;

/// Which end of the priority range is served first.
///
/// Ties on priority are always served in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityOrder {
    /// Smaller numbers are more urgent.
    #[default]
    LowestFirst,
    /// Larger numbers are more urgent.
    HighestFirst,
}

/// Persistent queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Base directory for the database, payloads and logs.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// SQLite database path (defaults to `<data_dir>/asrq_queue.db`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,

    /// Directory holding uploaded audio (defaults to `<data_dir>/audio_files`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_dir: Option<PathBuf>,

    /// Admission limit on queued tasks.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Priority direction.
    #[serde(default)]
    pub priority_order: PriorityOrder,
}

fn default_max_queue_size() -> usize {
    10
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_path: None,
            payload_dir: None,
            max_queue_size: default_max_queue_size(),
            priority_order: PriorityOrder::default(),
        }
    }
}

impl QueueConfig {
    /// Data directory with `~` expanded.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(ConfigLoader::expand_path(&self.data_dir.to_string_lossy()))
    }

    /// Resolved database path.
    pub fn db_path(&self) -> PathBuf {
        match &self.db_path {
            Some(p) => PathBuf::from(ConfigLoader::expand_path(&p.to_string_lossy())),
            None => self.data_dir().join("asrq_queue.db"),
        }
    }

    /// Resolved payload directory.
    pub fn payload_dir(&self) -> PathBuf {
        match &self.payload_dir {
            Some(p) => PathBuf::from(ConfigLoader::expand_path(&p.to_string_lossy())),
            None => self.data_dir().join("audio_files"),
        }
    }

    /// Log directory.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkersConfig {
    /// One worker unit is started per device label.
    #[serde(default = "default_devices")]
    pub devices: Vec<String>,

    /// Upper bound on how long an idle worker waits before re-checking its stop flag.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_devices() -> Vec<String> {
    vec!["cpu".to_string()]
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            devices: default_devices(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// External transcription command.
///
/// `{input}`, `{device}` and `{task_id}` in `args` are substituted per task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_args")]
    pub args: Vec<String>,

    #[serde(default = "default_executor_timeout")]
    pub timeout_seconds: u64,
}

fn default_program() -> String {
    "whisper-cli".to_string()
}

fn default_args() -> Vec<String> {
    vec![
        "--device".to_string(),
        "{device}".to_string(),
        "{input}".to_string(),
    ]
}

fn default_executor_timeout() -> u64 {
    3600
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            timeout_seconds: default_executor_timeout(),
        }
    }
}

/// Payload retention configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between cleanup passes.
    #[serde(default = "default_retention_interval")]
    pub interval_seconds: u64,

    /// Payloads of finished tasks older than this are removed.
    #[serde(default = "default_max_age_minutes")]
    pub max_age_minutes: u64,
}

fn default_retention_interval() -> u64 {
    3600
}

fn default_max_age_minutes() -> u64 {
    30
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_seconds: default_retention_interval(),
            max_age_minutes: default_max_age_minutes(),
        }
    }
}

/// Status broadcast and statistics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default = "default_broadcast_interval_ms")]
    pub broadcast_interval_ms: u64,

    /// Number of finished tasks included in each snapshot.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,

    /// Trailing windows (minutes) reported by the statistics endpoint.
    #[serde(default = "default_statistics_windows")]
    pub statistics_windows: Vec<u64>,
}

fn default_broadcast_interval_ms() -> u64 {
    1000
}

fn default_recent_limit() -> usize {
    10
}

fn default_statistics_windows() -> Vec<u64> {
    vec![5, 15, 45]
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            broadcast_interval_ms: default_broadcast_interval_ms(),
            recent_limit: default_recent_limit(),
            statistics_windows: default_statistics_windows(),
        }
    }
}
