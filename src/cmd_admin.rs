//! Offline commands against the queue database.

use std::sync::Arc;

use serde::Serialize;

use asrq_config::{Config, MAX_WINDOW_MINUTES};
use asrq_queue::{FilePayloadStore, HistoryFilter, SqliteTaskStore, TaskQueue};

async fn open_queue(config: &Config) -> Result<TaskQueue, Box<dyn std::error::Error>> {
    let db_path = config.queue.db_path();
    if !db_path.exists() {
        return Err(format!("no queue database at {}", db_path.display()).into());
    }

    let store = Arc::new(SqliteTaskStore::open(&db_path).await?);
    let payloads = Arc::new(FilePayloadStore::new(config.queue.payload_dir()).await?);
    Ok(TaskQueue::open(store, payloads, config.queue.priority_order).await?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) async fn show_task(config: &Config, task_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let queue = open_queue(config).await?;
    match queue.get_task(task_id).await? {
        Some(task) => print_json(&task),
        None => Err(format!("task not found: {}", task_id).into()),
    }
}

pub(crate) async fn show_statistics(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let queue = open_queue(config).await?;
    let workers = config.workers.devices.len();

    let mut stats = Vec::with_capacity(config.status.statistics_windows.len());
    for window in &config.status.statistics_windows {
        stats.push(queue.calculate_statistics(*window, workers).await?);
    }
    print_json(&stats)
}

pub(crate) async fn show_history(
    config: &Config,
    page: u64,
    page_size: u64,
    status: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter = HistoryFilter::parse(status)?;
    let queue = open_queue(config).await?;
    print_json(&queue.get_history_tasks(page, page_size, filter).await?)
}

pub(crate) async fn run_cleanup(
    config: &Config,
    minutes: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let minutes = minutes.unwrap_or(config.retention.max_age_minutes);
    if minutes > MAX_WINDOW_MINUTES {
        return Err(format!("minutes cannot exceed {}", MAX_WINDOW_MINUTES).into());
    }
    let queue = open_queue(config).await?;
    print_json(&queue.cleanup_old_audio_data(minutes).await?)
}
