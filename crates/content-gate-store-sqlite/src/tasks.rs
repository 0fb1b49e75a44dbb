// content-gate-store-sqlite/src/tasks.rs
// ============================================================================
// Module: SQLite Publish Task Store
// Description: PublishTaskStore over the `publish_tasks` table.
// Purpose: Persist the publish queue with race-free claims and settles.
// Dependencies: content-gate-core, rusqlite, serde_json
// ============================================================================

//! ## Overview
//! A claim is `UPDATE ... SET status = 'processing' WHERE status = 'pending'`
//! and only the caller that changed the row owns the task. Settles match on
//! `status = 'processing'` and the claim timestamp, so a worker whose lease
//! expired cannot settle the task after it was recovered or re-claimed.
//! Delivered channels are stored as a JSON array.

// ============================================================================
// SECTION: Imports
// ============================================================================

use content_gate_core::ChannelName;
use content_gate_core::ContentId;
use content_gate_core::ContentType;
use content_gate_core::NewPublishTask;
use content_gate_core::PublishTask;
use content_gate_core::PublishTaskStore;
use content_gate_core::StoreError;
use content_gate_core::TaskFilter;
use content_gate_core::TaskId;
use content_gate_core::TaskResolution;
use content_gate_core::TaskStatus;
use content_gate_core::Timestamp;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;

use crate::store::SqliteStore;
use crate::store::db_error;
use crate::store::opt_timestamp;
use crate::store::sql_limit;
use crate::store::stored_u32;

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Column list shared by every task query.
const COLUMNS: &str = "task_id, content_type, content_id, status, retry_count, error_message, created_at, \
                       processed_at, next_attempt_at, claimed_at, delivered_channels";

/// Raw task row prior to validation.
#[allow(clippy::missing_docs_in_private_items, reason = "Fields mirror the table columns.")]
struct TaskRow {
    task_id: i64,
    content_type: String,
    content_id: String,
    status: String,
    retry_count: i64,
    error_message: Option<String>,
    created_at: i64,
    processed_at: Option<i64>,
    next_attempt_at: i64,
    claimed_at: Option<i64>,
    delivered_channels: String,
}

impl TaskRow {
    /// Reads a row selected with [`COLUMNS`].
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            task_id: row.get(0)?,
            content_type: row.get(1)?,
            content_id: row.get(2)?,
            status: row.get(3)?,
            retry_count: row.get(4)?,
            error_message: row.get(5)?,
            created_at: row.get(6)?,
            processed_at: row.get(7)?,
            next_attempt_at: row.get(8)?,
            claimed_at: row.get(9)?,
            delivered_channels: row.get(10)?,
        })
    }

    /// Validates the row into a domain task.
    fn into_task(self) -> Result<PublishTask, StoreError> {
        let content_type = ContentType::parse(&self.content_type)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown content type: {}", self.content_type)))?;
        let status = TaskStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown task status: {}", self.status)))?;
        let delivered_channels: Vec<ChannelName> = serde_json::from_str(&self.delivered_channels)
            .map_err(|err| StoreError::Corrupt(format!("delivered_channels: {err}")))?;
        Ok(PublishTask {
            task_id: TaskId::new(self.task_id),
            content_type,
            content_id: ContentId::new(self.content_id),
            status,
            retry_count: stored_u32("retry_count", self.retry_count)?,
            error_message: self.error_message,
            created_at: Timestamp::from_unix_millis(self.created_at),
            processed_at: opt_timestamp(self.processed_at),
            next_attempt_at: Timestamp::from_unix_millis(self.next_attempt_at),
            claimed_at: opt_timestamp(self.claimed_at),
            delivered_channels,
        })
    }
}

/// Loads a task on an open connection.
fn load_task(connection: &Connection, task_id: TaskId) -> Result<Option<PublishTask>, StoreError> {
    let sql = format!("SELECT {COLUMNS} FROM publish_tasks WHERE task_id = ?1");
    let row = connection
        .query_row(&sql, params![task_id.get()], TaskRow::read)
        .optional()
        .map_err(|err| db_error(&err))?;
    row.map(TaskRow::into_task).transpose()
}

/// Encodes delivered channels for storage.
fn encode_channels(channels: &[ChannelName]) -> Result<String, StoreError> {
    serde_json::to_string(channels).map_err(|err| StoreError::Invalid(err.to_string()))
}

// ============================================================================
// SECTION: PublishTaskStore
// ============================================================================

impl PublishTaskStore for SqliteStore {
    fn enqueue(&self, task: &NewPublishTask, now: Timestamp) -> Result<PublishTask, StoreError> {
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO publish_tasks (content_type, content_id, status, retry_count, created_at, \
                 next_attempt_at, delivered_channels)
                 VALUES (?1, ?2, ?3, 0, ?4, ?4, '[]')",
                params![
                    task.content_type.as_str(),
                    task.content_id.as_str(),
                    TaskStatus::Pending.as_str(),
                    now.as_unix_millis(),
                ],
            )
            .map_err(|err| db_error(&err))?;
        let task_id = TaskId::new(connection.last_insert_rowid());
        load_task(&connection, task_id)?
            .ok_or_else(|| StoreError::Corrupt(format!("task {task_id} missing after insert")))
    }

    fn get(&self, task_id: TaskId) -> Result<Option<PublishTask>, StoreError> {
        let connection = self.lock()?;
        load_task(&connection, task_id)
    }

    fn list(&self, filter: &TaskFilter) -> Result<Vec<PublishTask>, StoreError> {
        let connection = self.lock()?;
        let sql = format!(
            "SELECT {COLUMNS} FROM publish_tasks
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY created_at DESC, task_id DESC
             LIMIT ?2"
        );
        let mut statement = connection.prepare(&sql).map_err(|err| db_error(&err))?;
        let rows = statement
            .query_map(params![filter.status.map(TaskStatus::as_str), sql_limit(filter.limit)], TaskRow::read)
            .map_err(|err| db_error(&err))?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row.map_err(|err| db_error(&err))?.into_task()?);
        }
        Ok(tasks)
    }

    fn due_tasks(&self, limit: usize, now: Timestamp) -> Result<Vec<TaskId>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare(
                "SELECT task_id FROM publish_tasks
                 WHERE status = ?1 AND next_attempt_at <= ?2
                 ORDER BY created_at ASC, task_id ASC
                 LIMIT ?3",
            )
            .map_err(|err| db_error(&err))?;
        let rows = statement
            .query_map(
                params![TaskStatus::Pending.as_str(), now.as_unix_millis(), sql_limit(limit)],
                |row| row.get::<_, i64>(0),
            )
            .map_err(|err| db_error(&err))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(TaskId::new(row.map_err(|err| db_error(&err))?));
        }
        Ok(ids)
    }

    fn claim(&self, task_id: TaskId, now: Timestamp) -> Result<Option<PublishTask>, StoreError> {
        let connection = self.lock()?;
        let changed = connection
            .execute(
                "UPDATE publish_tasks SET status = ?2, claimed_at = ?3 WHERE task_id = ?1 AND status = ?4",
                params![
                    task_id.get(),
                    TaskStatus::Processing.as_str(),
                    now.as_unix_millis(),
                    TaskStatus::Pending.as_str(),
                ],
            )
            .map_err(|err| db_error(&err))?;
        if changed != 1 {
            return Ok(None);
        }
        load_task(&connection, task_id)
    }

    fn settle(
        &self,
        task_id: TaskId,
        claimed_at: Timestamp,
        resolution: &TaskResolution,
        now: Timestamp,
    ) -> Result<bool, StoreError> {
        let (delivered, error_message, retry_increment, next_attempt_at) = match resolution {
            TaskResolution::Completed {
                delivered_channels,
                error_message,
            } => (delivered_channels, error_message.clone(), 0_i64, None),
            TaskResolution::Retry {
                delivered_channels,
                error_message,
                next_attempt_at,
            } => (delivered_channels, Some(error_message.clone()), 1, Some(next_attempt_at.as_unix_millis())),
            TaskResolution::Failed {
                delivered_channels,
                error_message,
            } => (delivered_channels, Some(error_message.clone()), 1, None),
        };
        let delivered = encode_channels(delivered)?;
        let connection = self.lock()?;
        let changed = connection
            .execute(
                "UPDATE publish_tasks
                 SET status = ?2,
                     processed_at = ?3,
                     claimed_at = NULL,
                     delivered_channels = ?4,
                     error_message = ?5,
                     retry_count = retry_count + ?6,
                     next_attempt_at = COALESCE(?7, next_attempt_at)
                 WHERE task_id = ?1 AND status = ?8 AND claimed_at = ?9",
                params![
                    task_id.get(),
                    resolution.status().as_str(),
                    now.as_unix_millis(),
                    delivered,
                    error_message,
                    retry_increment,
                    next_attempt_at,
                    TaskStatus::Processing.as_str(),
                    claimed_at.as_unix_millis(),
                ],
            )
            .map_err(|err| db_error(&err))?;
        Ok(changed == 1)
    }

    fn stale_claims(&self, claimed_before: Timestamp) -> Result<Vec<PublishTask>, StoreError> {
        let connection = self.lock()?;
        let sql = format!(
            "SELECT {COLUMNS} FROM publish_tasks
             WHERE status = ?1 AND claimed_at IS NOT NULL AND claimed_at < ?2
             ORDER BY claimed_at ASC, task_id ASC"
        );
        let mut statement = connection.prepare(&sql).map_err(|err| db_error(&err))?;
        let rows = statement
            .query_map(params![TaskStatus::Processing.as_str(), claimed_before.as_unix_millis()], TaskRow::read)
            .map_err(|err| db_error(&err))?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row.map_err(|err| db_error(&err))?.into_task()?);
        }
        Ok(tasks)
    }
}
