//! Durable task store.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::error::QueueError;
use crate::schema::init_schema;
use crate::stats::WindowTotals;
use crate::task::{HistoryFilter, QueueEntry, Task, TaskStatus};

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

/// Task store trait for persistence.
///
/// Every mutation is durable when the returned future resolves, so callers
/// update their in-memory view only after the write has landed.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new task record.
    async fn insert(&self, task: &Task) -> Result<(), QueueError>;

    /// Load a task by ID.
    async fn get(&self, id: &str) -> Result<Option<Task>, QueueError>;

    /// Mark a queued task as processing and record its waiting time.
    ///
    /// Returns the updated record, read in the same transaction, or `None`
    /// when no pending or processing record has this ID.
    async fn mark_processing(
        &self,
        id: &str,
        waiting_time: f64,
        at: DateTime<Utc>,
    ) -> Result<Option<Task>, QueueError>;

    /// Write a status transition together with the processing time of the
    /// interval it closes. Returns the recorded processing time, or `None`
    /// when the task does not exist.
    async fn finish(
        &self,
        id: &str,
        status: TaskStatus,
        result: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Option<f64>, QueueError>;

    /// All pending and processing tasks, oldest first.
    async fn load_backlog(&self) -> Result<Vec<QueueEntry>, QueueError>;

    /// Latest creation time ever recorded.
    async fn latest_created_at(&self) -> Result<Option<DateTime<Utc>>, QueueError>;

    /// Aggregates over terminal tasks updated at or after `since`.
    async fn window_totals(&self, since: DateTime<Utc>) -> Result<WindowTotals, QueueError>;

    /// `(id, payload_ref)` of terminal tasks created before `before` that still hold a payload.
    async fn expired_payloads(
        &self,
        before: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, QueueError>;

    /// Clear the payload reference of a terminal task.
    async fn clear_payload(&self, id: &str) -> Result<bool, QueueError>;

    /// Most recently finished tasks.
    async fn recent(&self, limit: usize) -> Result<Vec<Task>, QueueError>;

    /// Tasks currently marked processing.
    async fn processing(&self) -> Result<Vec<Task>, QueueError>;

    /// One page of finished tasks, newest first, with the total match count.
    async fn history(
        &self,
        filter: HistoryFilter,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<Task>, u64), QueueError>;
}

/// SQLite-based task store.
pub struct SqliteTaskStore {
    conn: Connection,
}

impl SqliteTaskStore {
    /// Create a new in-memory database.
    pub async fn in_memory() -> Result<Self, QueueError> {
        let conn = Connection::open_in_memory().await?;
        conn.call(|conn| Ok(init_schema(conn)?)).await?;
        Ok(Self { conn })
    }

    /// Open (or create) a file-backed database in WAL mode.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, QueueError> {
        let path = path.as_ref().to_path_buf();
        debug!("Opening task database at {}", path.display());
        let conn = Connection::open(path).await?;

        conn.call(|conn| {
            conn.busy_timeout(Duration::from_secs(5))?;
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
            init_schema(conn)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }
}

const TASK_COLUMNS: &str = "id, payload_ref, priority, status, created_at, updated_at, result, waiting_time, processing_time";

/// Persisted timestamp form. Fixed width so lexical order matches time order.
pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc))
}

fn ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(&raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        parse_ts(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let status: String = row.get(3)?;
    let status = status
        .parse::<TaskStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    Ok(Task {
        id: row.get(0)?,
        payload_ref: row.get(1)?,
        priority: row.get(2)?,
        status,
        created_at: ts_column(row, 4)?,
        updated_at: optional_ts_column(row, 5)?,
        result: row.get(6)?,
        waiting_time: row.get(7)?,
        processing_time: row.get(8)?,
    })
}

/// Seconds between two instants, with microsecond resolution.
pub(crate) fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    delta
        .num_microseconds()
        .map(|us| us as f64 / 1_000_000.0)
        .unwrap_or_else(|| delta.num_milliseconds() as f64 / 1_000.0)
}

/// Bind pair for `status IN (?, ?)`; single-status filters repeat the value.
fn filter_bounds(filter: HistoryFilter) -> (&'static str, &'static str) {
    let statuses = filter.statuses();
    let first = statuses[0].as_str();
    let last = statuses[statuses.len() - 1].as_str();
    (first, last)
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn insert(&self, task: &Task) -> Result<(), QueueError> {
        let task = task.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO tasks (id, payload_ref, priority, status, created_at, updated_at, result, waiting_time, processing_time)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        task.id,
                        task.payload_ref,
                        task.priority,
                        task.status.as_str(),
                        format_ts(task.created_at),
                        task.updated_at.map(format_ts),
                        task.result,
                        task.waiting_time,
                        task.processing_time,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Task>, QueueError> {
        let id = id.to_string();
        let task = self
            .conn
            .call(move |conn| {
                let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
                let task = conn.query_row(&sql, [&id], task_from_row).optional()?;
                Ok(task)
            })
            .await?;
        Ok(task)
    }

    async fn mark_processing(
        &self,
        id: &str,
        waiting_time: f64,
        at: DateTime<Utc>,
    ) -> Result<Option<Task>, QueueError> {
        let id = id.to_string();
        let task = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let changed = tx.execute(
                    "UPDATE tasks SET status = 'processing', updated_at = ?1, waiting_time = ?2
                     WHERE id = ?3 AND status IN ('pending', 'processing')",
                    params![format_ts(at), waiting_time, id],
                )?;

                let task = if changed > 0 {
                    let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
                    tx.query_row(&sql, [&id], task_from_row).optional()?
                } else {
                    None
                };

                tx.commit()?;
                Ok(task)
            })
            .await?;
        Ok(task)
    }

    async fn finish(
        &self,
        id: &str,
        status: TaskStatus,
        result: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Option<f64>, QueueError> {
        let id = id.to_string();
        let processing_time = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let base = tx
                    .query_row(
                        "SELECT created_at, updated_at FROM tasks WHERE id = ?1",
                        [&id],
                        |row| {
                            let created = ts_column(row, 0)?;
                            let updated = optional_ts_column(row, 1)?;
                            Ok(updated.unwrap_or(created))
                        },
                    )
                    .optional()?;

                let Some(base) = base else {
                    return Ok(None);
                };

                let processing_time = seconds_between(base, at);
                tx.execute(
                    "UPDATE tasks SET status = ?1, result = ?2, updated_at = ?3, processing_time = ?4
                     WHERE id = ?5",
                    params![status.as_str(), result, format_ts(at), processing_time, id],
                )?;

                tx.commit()?;
                Ok(Some(processing_time))
            })
            .await?;
        Ok(processing_time)
    }

    async fn load_backlog(&self) -> Result<Vec<QueueEntry>, QueueError> {
        let entries = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, priority, created_at FROM tasks
                     WHERE status IN ('pending', 'processing')
                     ORDER BY created_at ASC",
                )?;
                let entries = stmt
                    .query_map([], |row| {
                        Ok(QueueEntry {
                            id: row.get(0)?,
                            priority: row.get(1)?,
                            created_at: ts_column(row, 2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await?;
        Ok(entries)
    }

    async fn latest_created_at(&self) -> Result<Option<DateTime<Utc>>, QueueError> {
        let latest = self
            .conn
            .call(|conn| {
                let latest = conn.query_row("SELECT MAX(created_at) FROM tasks", [], |row| {
                    optional_ts_column(row, 0)
                })?;
                Ok(latest)
            })
            .await?;
        Ok(latest)
    }

    async fn window_totals(&self, since: DateTime<Utc>) -> Result<WindowTotals, QueueError> {
        let since = format_ts(since);
        let totals = self
            .conn
            .call(move |conn| {
                let totals = conn.query_row(
                    "SELECT COUNT(*), AVG(waiting_time), SUM(processing_time) FROM tasks
                     WHERE status IN ('completed', 'failed') AND updated_at >= ?1",
                    [&since],
                    |row| {
                        let finished: i64 = row.get(0)?;
                        Ok(WindowTotals {
                            finished: finished.max(0) as u64,
                            avg_waiting_time: row.get(1)?,
                            total_processing_time: row.get(2)?,
                        })
                    },
                )?;
                Ok(totals)
            })
            .await?;
        Ok(totals)
    }

    async fn expired_payloads(
        &self,
        before: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, QueueError> {
        let before = format_ts(before);
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, payload_ref FROM tasks
                     WHERE status IN ('completed', 'failed')
                       AND created_at < ?1
                       AND payload_ref IS NOT NULL",
                )?;
                let rows = stmt
                    .query_map([&before], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    async fn clear_payload(&self, id: &str) -> Result<bool, QueueError> {
        let id = id.to_string();
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE tasks SET payload_ref = NULL
                     WHERE id = ?1 AND status IN ('completed', 'failed')",
                    [&id],
                )?;
                Ok(changed)
            })
            .await?;
        Ok(changed > 0)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Task>, QueueError> {
        let limit = limit as i64;
        let tasks = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {} FROM tasks WHERE status IN ('completed', 'failed')
                     ORDER BY updated_at DESC LIMIT ?1",
                    TASK_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let tasks = stmt
                    .query_map([limit], task_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(tasks)
            })
            .await?;
        Ok(tasks)
    }

    async fn processing(&self) -> Result<Vec<Task>, QueueError> {
        let tasks = self
            .conn
            .call(|conn| {
                let sql = format!(
                    "SELECT {} FROM tasks WHERE status = 'processing' ORDER BY updated_at ASC",
                    TASK_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let tasks = stmt
                    .query_map([], task_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(tasks)
            })
            .await?;
        Ok(tasks)
    }

    async fn history(
        &self,
        filter: HistoryFilter,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<Task>, u64), QueueError> {
        let (first, last) = filter_bounds(filter);
        let limit = limit.min(i64::MAX as u64) as i64;
        let offset = offset.min(i64::MAX as u64) as i64;

        let page = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let total: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM tasks WHERE status IN (?1, ?2)",
                    params![first, last],
                    |row| row.get(0),
                )?;

                let sql = format!(
                    "SELECT {} FROM tasks WHERE status IN (?1, ?2)
                     ORDER BY updated_at DESC LIMIT ?3 OFFSET ?4",
                    TASK_COLUMNS
                );
                let tasks = {
                    let mut stmt = tx.prepare(&sql)?;
                    stmt.query_map(params![first, last, limit, offset], task_from_row)?
                        .collect::<Result<Vec<_>, _>>()?
                };

                tx.commit()?;
                Ok((tasks, total.max(0) as u64))
            })
            .await?;
        Ok(page)
    }
}
