//! In-memory store for tests and throwaway sessions.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::block::{BlockStatus, TimeBlock};
use crate::error::StoreError;
use crate::store::PlannerStore;
use crate::task::Task;
use crate::transition::TransitionAction;
use crate::workspace::UnpluggedWindow;

#[derive(Debug, Default)]
struct MemoryInner {
    tasks: HashMap<String, Task>,
    inbox: HashSet<String>,
    blocks: Vec<TimeBlock>,
    windows: HashMap<String, Vec<UnpluggedWindow>>,
}

/// HashMap-backed [`PlannerStore`].
///
/// `fail_next_write` arms a one-shot write failure so callers can exercise
/// the reload-on-persistence-failure path deterministically.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    fail_next_write: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next write call fail with [`StoreError::WriteRejected`].
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(StoreError::WriteRejected(
                "simulated write failure".to_string(),
            ));
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Upsert semantics, matching the SQLite store: a transition may carry
    /// a residual block the store has never seen.
    fn apply_updates(inner: &mut MemoryInner, updated: &[TimeBlock]) {
        for update in updated {
            if let Some(existing) = inner.blocks.iter_mut().find(|b| b.id == update.id) {
                *existing = update.clone();
            } else {
                inner.blocks.push(update.clone());
            }
        }
    }
}

#[async_trait]
impl PlannerStore for MemoryStore {
    async fn load_ledger(
        &self,
        workspace_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<TimeBlock>, StoreError> {
        let inner = self.lock();
        let mut blocks: Vec<TimeBlock> = inner
            .blocks
            .iter()
            .filter(|b| b.workspace_id == workspace_id && b.start_time.date_naive() == date)
            .cloned()
            .collect();
        blocks.sort_by_key(|b| b.start_time);
        Ok(blocks)
    }

    async fn load_inbox(&self, workspace_id: &str) -> Result<Vec<Task>, StoreError> {
        let inner = self.lock();
        let mut tasks: Vec<Task> = inner
            .inbox
            .iter()
            .filter_map(|id| inner.tasks.get(id))
            .filter(|t| t.workspace_id == workspace_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }

    async fn load_unplugged_windows(
        &self,
        workspace_id: &str,
    ) -> Result<Vec<UnpluggedWindow>, StoreError> {
        Ok(self
            .lock()
            .windows
            .get(workspace_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_task(&self, task_id: &str) -> Result<Option<Task>, StoreError> {
        Ok(self.lock().tasks.get(task_id).cloned())
    }

    async fn create_task(&self, task: &Task) -> Result<(), StoreError> {
        self.check_write()?;
        let mut inner = self.lock();
        inner.tasks.insert(task.id.clone(), task.clone());
        inner.inbox.insert(task.id.clone());
        Ok(())
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), StoreError> {
        self.check_write()?;
        let mut inner = self.lock();
        inner.tasks.remove(task_id);
        inner.inbox.remove(task_id);
        inner
            .blocks
            .retain(|b| b.task_id.as_deref() != Some(task_id));
        Ok(())
    }

    async fn save_unplugged_windows(
        &self,
        workspace_id: &str,
        windows: &[UnpluggedWindow],
    ) -> Result<(), StoreError> {
        self.check_write()?;
        self.lock()
            .windows
            .insert(workspace_id.to_string(), windows.to_vec());
        Ok(())
    }

    async fn persist_move_to_timeline(
        &self,
        task_id: &str,
        blocks: &[TimeBlock],
    ) -> Result<(), StoreError> {
        self.check_write()?;
        let mut inner = self.lock();
        inner.inbox.remove(task_id);
        for block in blocks {
            if !inner.blocks.iter().any(|b| b.id == block.id) {
                inner.blocks.push(block.clone());
            }
        }
        Ok(())
    }

    async fn persist_move_to_inbox(&self, block_id: &str) -> Result<(), StoreError> {
        self.check_write()?;
        let mut inner = self.lock();
        let Some(position) = inner.blocks.iter().position(|b| b.id == block_id) else {
            return Ok(());
        };
        let removed = inner.blocks.remove(position);
        if let Some(task_id) = removed.task_id {
            let has_more = inner
                .blocks
                .iter()
                .any(|b| b.task_id.as_deref() == Some(task_id.as_str()));
            if !has_more && inner.tasks.contains_key(&task_id) {
                inner.inbox.insert(task_id);
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
        self.check_write()?;
        let mut inner = self.lock();
        Self::apply_updates(&mut inner, retimed);
        Ok(())
    }

    async fn persist_transition(
        &self,
        _block_id: &str,
        _action: &TransitionAction,
        _review_memo: Option<&str>,
        updated: &[TimeBlock],
    ) -> Result<(), StoreError> {
        self.check_write()?;
        let mut inner = self.lock();
        Self::apply_updates(&mut inner, updated);
        Ok(())
    }

    async fn persist_status_change(
        &self,
        block_id: &str,
        status: BlockStatus,
    ) -> Result<(), StoreError> {
        self.check_write()?;
        let mut inner = self.lock();
        if let Some(block) = inner.blocks.iter_mut().find(|b| b.id == block_id) {
            block.status = status;
        }
        Ok(())
    }
}
