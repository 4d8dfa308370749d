//! SQLite-backed [`PlannerStore`].
//!
//! One file at `~/.config/dayflow/dayflow.db`, opened per call. All
//! timestamps are stored as RFC3339 strings; statuses as uppercase text.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::block::{BlockStatus, TimeBlock};
use crate::error::StoreError;
use crate::store::{data_dir, PlannerStore};
use crate::task::Task;
use crate::timeutil::WallTime;
use crate::transition::TransitionAction;
use crate::workspace::UnpluggedWindow;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

// === Helper functions ===

/// Format block status for database storage
fn format_status(status: BlockStatus) -> &'static str {
    match status {
        BlockStatus::Will => "WILL",
        BlockStatus::Now => "NOW",
        BlockStatus::Done => "DONE",
        BlockStatus::Pending => "PENDING",
        BlockStatus::Unplugged => "UNPLUGGED",
    }
}

/// Parse block status from database string
fn parse_status(status: &str) -> Result<BlockStatus, StoreError> {
    match status {
        "WILL" => Ok(BlockStatus::Will),
        "NOW" => Ok(BlockStatus::Now),
        "DONE" => Ok(BlockStatus::Done),
        "PENDING" => Ok(BlockStatus::Pending),
        "UNPLUGGED" => Ok(BlockStatus::Unplugged),
        other => Err(StoreError::CorruptRecord(format!(
            "unknown block status '{other}'"
        ))),
    }
}

/// Parse an RFC3339 timestamp stored by this module
fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRecord(format!("invalid timestamp '{raw}': {e}")))
}

fn parse_wall_time(raw: &str) -> Result<WallTime, StoreError> {
    WallTime::parse(raw)
        .ok_or_else(|| StoreError::CorruptRecord(format!("invalid HH:mm time '{raw}'")))
}

/// Raw block row, timestamps and status still as text.
struct BlockRow {
    id: String,
    task_id: Option<String>,
    workspace_id: String,
    title: String,
    start_raw: String,
    end_raw: String,
    status_raw: String,
    review_memo: Option<String>,
    urgent: bool,
    split_index: Option<u32>,
}

impl BlockRow {
    fn read(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            task_id: row.get(1)?,
            workspace_id: row.get(2)?,
            title: row.get(3)?,
            start_raw: row.get(4)?,
            end_raw: row.get(5)?,
            status_raw: row.get(6)?,
            review_memo: row.get(7)?,
            urgent: row.get(8)?,
            split_index: row.get(9)?,
        })
    }

    fn into_block(self) -> Result<TimeBlock, StoreError> {
        Ok(TimeBlock {
            id: self.id,
            task_id: self.task_id,
            workspace_id: self.workspace_id,
            title: self.title,
            start_time: parse_datetime(&self.start_raw)?,
            end_time: parse_datetime(&self.end_raw)?,
            status: parse_status(&self.status_raw)?,
            review_memo: self.review_memo,
            urgent: self.urgent,
            split_index: self.split_index,
        })
    }
}

/// Raw task row, timestamps still as text.
struct TaskRow {
    id: String,
    workspace_id: String,
    title: String,
    memo: Option<String>,
    urgent: bool,
    estimated_minutes: u32,
    created_raw: String,
    updated_raw: String,
}

impl TaskRow {
    fn read(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            workspace_id: row.get(1)?,
            title: row.get(2)?,
            memo: row.get(3)?,
            urgent: row.get(4)?,
            estimated_minutes: row.get(5)?,
            created_raw: row.get(6)?,
            updated_raw: row.get(7)?,
        })
    }

    fn into_task(self) -> Result<Task, StoreError> {
        Ok(Task {
            id: self.id,
            workspace_id: self.workspace_id,
            title: self.title,
            memo: self.memo,
            urgent: self.urgent,
            estimated_minutes: self.estimated_minutes,
            created_at: parse_datetime(&self.created_raw)?,
            updated_at: parse_datetime(&self.updated_raw)?,
        })
    }
}

/// SQLite database for planner storage.
#[derive(Debug, Clone)]
pub struct PlannerDb {
    db_path: PathBuf,
}

impl PlannerDb {
    /// Open (and initialize) the database at `~/.config/dayflow/dayflow.db`.
    pub fn open() -> Result<Self, StoreError> {
        let path = data_dir()?.join("dayflow.db");
        Self::open_at(path)
    }

    /// Open (and initialize) a database at an explicit path.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = path.as_ref().to_path_buf();
        let conn = Connection::open(&db_path).map_err(|source| StoreError::OpenFailed {
            path: db_path.clone(),
            source,
        })?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { db_path })
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        Connection::open(&self.db_path).map_err(|source| StoreError::OpenFailed {
            path: self.db_path.clone(),
            source,
        })
    }

    fn upsert_block(conn: &Connection, block: &TimeBlock) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO blocks
               (id, task_id, workspace_id, title, start_time, end_time,
                status, review_memo, urgent, split_index)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
               task_id = excluded.task_id,
               title = excluded.title,
               start_time = excluded.start_time,
               end_time = excluded.end_time,
               status = excluded.status,
               review_memo = excluded.review_memo,
               urgent = excluded.urgent,
               split_index = excluded.split_index",
            params![
                block.id,
                block.task_id,
                block.workspace_id,
                block.title,
                block.start_time.to_rfc3339(),
                block.end_time.to_rfc3339(),
                format_status(block.status),
                block.review_memo,
                block.urgent,
                block.split_index,
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl PlannerStore for PlannerDb {
    async fn load_ledger(
        &self,
        workspace_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<TimeBlock>, StoreError> {
        let conn = self.connect()?;
        let day_start = WallTime::new(0, 0)
            .map(|t| t.on_date(date))
            .ok_or_else(|| StoreError::CorruptRecord("invalid date".to_string()))?;
        let day_end = day_start + chrono::Duration::days(1);

        let mut stmt = conn.prepare(
            "SELECT id, task_id, workspace_id, title, start_time, end_time,
                    status, review_memo, urgent, split_index
             FROM blocks
             WHERE workspace_id = ?1 AND start_time >= ?2 AND start_time < ?3
             ORDER BY start_time",
        )?;
        let rows = stmt.query_map(
            params![workspace_id, day_start.to_rfc3339(), day_end.to_rfc3339()],
            BlockRow::read,
        )?;

        let mut blocks = Vec::new();
        for row in rows {
            blocks.push(row?.into_block()?);
        }
        Ok(blocks)
    }

    async fn load_inbox(&self, workspace_id: &str) -> Result<Vec<Task>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, workspace_id, title, memo, urgent, estimated_minutes,
                    created_at, updated_at
             FROM tasks
             WHERE workspace_id = ?1 AND in_inbox = 1
             ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![workspace_id], TaskRow::read)?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?.into_task()?);
        }
        Ok(tasks)
    }

    async fn load_unplugged_windows(
        &self,
        workspace_id: &str,
    ) -> Result<Vec<UnpluggedWindow>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT label, start_time, end_time FROM unplugged_windows
             WHERE workspace_id = ?1
             ORDER BY start_time",
        )?;
        let rows = stmt.query_map(params![workspace_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut windows = Vec::new();
        for row in rows {
            let (label, start_raw, end_raw) = row?;
            let window = UnpluggedWindow::new(
                label,
                parse_wall_time(&start_raw)?,
                parse_wall_time(&end_raw)?,
            )
            .map_err(|e| StoreError::CorruptRecord(e.to_string()))?;
            windows.push(window);
        }
        Ok(windows)
    }

    async fn get_task(&self, task_id: &str) -> Result<Option<Task>, StoreError> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT id, workspace_id, title, memo, urgent, estimated_minutes,
                        created_at, updated_at
                 FROM tasks WHERE id = ?1",
                params![task_id],
                TaskRow::read,
            )
            .optional()?;

        row.map(TaskRow::into_task).transpose()
    }

    async fn create_task(&self, task: &Task) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO tasks
               (id, workspace_id, title, memo, urgent, estimated_minutes,
                in_inbox, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
               title = excluded.title,
               memo = excluded.memo,
               urgent = excluded.urgent,
               estimated_minutes = excluded.estimated_minutes,
               updated_at = excluded.updated_at",
            params![
                task.id,
                task.workspace_id,
                task.title,
                task.memo,
                task.urgent,
                task.estimated_minutes,
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute("DELETE FROM blocks WHERE task_id = ?1", params![task_id])?;
        conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
        Ok(())
    }

    async fn save_unplugged_windows(
        &self,
        workspace_id: &str,
        windows: &[UnpluggedWindow],
    ) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "DELETE FROM unplugged_windows WHERE workspace_id = ?1",
            params![workspace_id],
        )?;
        for window in windows {
            conn.execute(
                "INSERT INTO unplugged_windows (workspace_id, label, start_time, end_time)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    workspace_id,
                    window.label,
                    window.start.to_string(),
                    window.end.to_string(),
                ],
            )?;
        }
        Ok(())
    }

    async fn persist_move_to_timeline(
        &self,
        task_id: &str,
        blocks: &[TimeBlock],
    ) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE tasks SET in_inbox = 0 WHERE id = ?1",
            params![task_id],
        )?;
        for block in blocks {
            Self::upsert_block(&conn, block)?;
        }
        Ok(())
    }

    async fn persist_move_to_inbox(&self, block_id: &str) -> Result<(), StoreError> {
        let conn = self.connect()?;
        let task_id: Option<String> = conn
            .query_row(
                "SELECT task_id FROM blocks WHERE id = ?1",
                params![block_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        conn.execute("DELETE FROM blocks WHERE id = ?1", params![block_id])?;

        if let Some(task_id) = task_id {
            let remaining: i64 = conn.query_row(
                "SELECT COUNT(*) FROM blocks WHERE task_id = ?1",
                params![task_id],
                |row| row.get(0),
            )?;
            if remaining == 0 {
                conn.execute(
                    "UPDATE tasks SET in_inbox = 1 WHERE id = ?1",
                    params![task_id],
                )?;
            }
        }
        Ok(())
    }

    async fn persist_reorder(
        &self,
        _workspace_id: &str,
        _date: NaiveDate,
        _ordered_block_ids: &[String],
        retimed: &[TimeBlock],
    ) -> Result<(), StoreError> {
        let conn = self.connect()?;
        for block in retimed {
            Self::upsert_block(&conn, block)?;
        }
        Ok(())
    }

    async fn persist_transition(
        &self,
        block_id: &str,
        action: &TransitionAction,
        review_memo: Option<&str>,
        updated: &[TimeBlock],
    ) -> Result<(), StoreError> {
        let conn = self.connect()?;
        for block in updated {
            Self::upsert_block(&conn, block)?;
        }
        conn.execute(
            "INSERT INTO transitions (block_id, action, review_memo, applied_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                block_id,
                action.to_string(),
                review_memo,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn persist_status_change(
        &self,
        block_id: &str,
        status: BlockStatus,
    ) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE blocks SET status = ?1 WHERE id = ?2",
            params![format_status(status), block_id],
        )?;
        Ok(())
    }
}
