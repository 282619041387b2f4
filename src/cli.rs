//! CLI definitions for asrq.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// asrq CLI.
#[derive(Parser)]
#[command(name = "asrq")]
#[command(about = "Persistent priority queue and worker pool for transcription jobs")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true, env = "ASRQ_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the server in foreground (default)
    Run {
        /// Override the configured host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show one task record
    Task {
        /// Task ID
        task_id: String,
    },

    /// Show windowed waiting time and load
    Stats,

    /// List finished tasks, newest first
    History {
        #[arg(long, default_value_t = 1)]
        page: u64,

        #[arg(long, default_value_t = 20)]
        page_size: u64,

        /// completed, failed or all
        #[arg(long)]
        status: Option<String>,
    },

    /// Delete payloads of finished tasks older than the given age
    Cleanup {
        /// Age in minutes (default: retention.max_age_minutes)
        #[arg(long)]
        minutes: Option<u64>,
    },
}
