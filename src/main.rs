//! asrq - transcription job queue
//!
//! Main entry point for the asrq CLI and server.

mod cli;
mod cmd_admin;
mod server;

use std::path::Path;

use clap::Parser;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use asrq_config::ConfigLoader;

use crate::cli::{Cli, Commands};

/// Initialize tracing with console and file output.
///
/// Log files are written to `log_dir` with daily rotation.
fn init_tracing(log_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("asrq")
        .filename_suffix("log")
        .max_log_files(30)
        .build(log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Dropping the guard stops the background writer
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (config, from_file) = ConfigLoader::load_or_default(&cli.config)?;
    init_tracing(&config.queue.log_dir())?;

    if from_file {
        info!("Loaded configuration from {}", cli.config.display());
    } else {
        warn!("{} not found, using default configuration", cli.config.display());
    }

    match cli.command {
        None => server::run_server(config, None, None).await,
        Some(Commands::Run { host, port }) => server::run_server(config, host, port).await,
        Some(Commands::Task { task_id }) => cmd_admin::show_task(&config, &task_id).await,
        Some(Commands::Stats) => cmd_admin::show_statistics(&config).await,
        Some(Commands::History {
            page,
            page_size,
            status,
        }) => cmd_admin::show_history(&config, page, page_size, status.as_deref()).await,
        Some(Commands::Cleanup { minutes }) => cmd_admin::run_cleanup(&config, minutes).await,
    }
}
