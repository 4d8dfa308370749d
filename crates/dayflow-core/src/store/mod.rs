//! Persistence boundary.
//!
//! The engine only ever talks to storage through [`PlannerStore`]. Writes
//! carry the authoritative post-mutation blocks computed by the engine, so
//! implementations persist state rather than re-deriving it. Every write is
//! idempotent per call: replaying the same call leaves the store unchanged.
//! Failures surface as [`StoreError`]; the engine never retries on its own.

mod memory;
mod planner_db;

pub use memory::MemoryStore;
pub use planner_db::PlannerDb;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::block::{BlockStatus, TimeBlock};
use crate::error::StoreError;
use crate::task::Task;
use crate::transition::TransitionAction;
use crate::workspace::UnpluggedWindow;

/// Returns `~/.config/dayflow[-dev]/` based on DAYFLOW_ENV.
///
/// Set DAYFLOW_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn data_dir() -> Result<PathBuf, StoreError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("DAYFLOW_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("dayflow-dev")
    } else {
        base_dir.join("dayflow")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Narrow persistence contract consumed by the planner.
#[async_trait]
pub trait PlannerStore: Send + Sync {
    // ── Reads ────────────────────────────────────────────────────────

    /// Blocks of one workspace-day, ordered by start time.
    async fn load_ledger(
        &self,
        workspace_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<TimeBlock>, StoreError>;

    /// Unscheduled tasks of a workspace.
    async fn load_inbox(&self, workspace_id: &str) -> Result<Vec<Task>, StoreError>;

    async fn load_unplugged_windows(
        &self,
        workspace_id: &str,
    ) -> Result<Vec<UnpluggedWindow>, StoreError>;

    async fn get_task(&self, task_id: &str) -> Result<Option<Task>, StoreError>;

    // ── Writes ───────────────────────────────────────────────────────

    /// Create an inbox task.
    async fn create_task(&self, task: &Task) -> Result<(), StoreError>;

    /// Delete a task, cascading to all of its blocks.
    async fn delete_task(&self, task_id: &str) -> Result<(), StoreError>;

    async fn save_unplugged_windows(
        &self,
        workspace_id: &str,
        windows: &[UnpluggedWindow],
    ) -> Result<(), StoreError>;

    /// A task left the inbox; its scheduled blocks land on the timeline.
    async fn persist_move_to_timeline(
        &self,
        task_id: &str,
        blocks: &[TimeBlock],
    ) -> Result<(), StoreError>;

    /// A block was removed from the timeline. When it was the task's last
    /// block, the task returns to the inbox.
    async fn persist_move_to_inbox(&self, block_id: &str) -> Result<(), StoreError>;

    /// Persist the accepted order and the re-derived block times.
    async fn persist_reorder(
        &self,
        workspace_id: &str,
        date: NaiveDate,
        ordered_block_ids: &[String],
        retimed: &[TimeBlock],
    ) -> Result<(), StoreError>;

    /// Persist a disposition: the action for the audit trail plus every
    /// block the transition touched.
    async fn persist_transition(
        &self,
        block_id: &str,
        action: &TransitionAction,
        review_memo: Option<&str>,
        updated: &[TimeBlock],
    ) -> Result<(), StoreError>;

    /// Persist a monitor status flip (promotion or overrun flag).
    async fn persist_status_change(
        &self,
        block_id: &str,
        status: BlockStatus,
    ) -> Result<(), StoreError>;
}
