//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod schema_queue;

pub use schema_queue::*;

/// Shared default helper used by submodules.
pub(crate) fn default_true() -> bool {
    true
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub workers: WorkersConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub status: StatusConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted upload, in megabytes.
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl ServerConfig {
    /// Socket address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_upload_mb() -> usize {
    512
}

/// Default data directory (`~/.asrq`).
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".asrq"))
        .unwrap_or_else(|| PathBuf::from(".asrq"))
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
