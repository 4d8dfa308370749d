//! The block ledger: the ordered block sequence for one workspace-day.
//!
//! The ledger owns every structural mutation -- insert, remove, reorder,
//! split, shift -- and guards the timeline invariants:
//!
//! 1. at most one block is `NOW`
//! 2. `WILL`/`NOW` blocks are ordered by start time and never overlap
//! 3. a `DONE` block's end time never changes
//! 4. blocks of a split task stay adjacent in the sequence, with ascending
//!    split indices
//!
//! Unplugged windows are not stored here: they are derived projections
//! (see `Scheduler::project_unplugged`) merged in at render time only.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::block::{BlockStatus, TimeBlock};
use crate::error::{EngineError, Result};

/// Outcome of `remove_to_inbox`.
#[derive(Debug, Clone)]
pub struct RemovedToInbox {
    pub block: TimeBlock,
    /// True when the owning task has no blocks left on the timeline.
    pub task_fully_returned: bool,
}

/// Outcome of `split_at`.
#[derive(Debug, Clone, Copy)]
pub struct SplitOutcome {
    pub prefix_index: usize,
    pub residual_index: usize,
}

/// Ordered sequence of task blocks for one workspace-day.
#[derive(Debug, Clone)]
pub struct BlockLedger {
    workspace_id: String,
    date: NaiveDate,
    blocks: Vec<TimeBlock>,
}

impl BlockLedger {
    pub fn new(workspace_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            date,
            blocks: Vec::new(),
        }
    }

    /// Rebuild a ledger from persisted blocks, restoring start-time order.
    pub fn from_blocks(
        workspace_id: impl Into<String>,
        date: NaiveDate,
        mut blocks: Vec<TimeBlock>,
    ) -> Self {
        blocks.sort_by_key(|b| b.start_time);
        blocks.retain(|b| b.status != BlockStatus::Unplugged);
        Self {
            workspace_id: workspace_id.into(),
            date,
            blocks,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn blocks(&self) -> &[TimeBlock] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, block_id: &str) -> Option<&TimeBlock> {
        self.blocks.iter().find(|b| b.id == block_id)
    }

    fn index_of(&self, block_id: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == block_id)
    }

    pub fn now_block(&self) -> Option<&TimeBlock> {
        self.blocks.iter().find(|b| b.status == BlockStatus::Now)
    }

    pub fn pending_block(&self) -> Option<&TimeBlock> {
        self.blocks
            .iter()
            .find(|b| b.status == BlockStatus::Pending)
    }

    /// Blocks owned by a task, in sequence order.
    pub fn blocks_of_task(&self, task_id: &str) -> Vec<&TimeBlock> {
        self.blocks
            .iter()
            .filter(|b| b.task_id.as_deref() == Some(task_id))
            .collect()
    }

    /// Earliest point a newly scheduled block may start: the end of the
    /// last `WILL`/`NOW` block, or `now` when nothing is ahead of it.
    pub fn scheduling_cursor(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.blocks
            .iter()
            .filter(|b| matches!(b.status, BlockStatus::Will | BlockStatus::Now))
            .map(|b| b.end_time)
            .max()
            .map_or(now, |end| end.max(now))
    }

    /// Merge derived unplugged projections into the sequence for display.
    pub fn render_with(&self, unplugged: &[TimeBlock]) -> Vec<TimeBlock> {
        let mut view: Vec<TimeBlock> = self.blocks.clone();
        view.extend(unplugged.iter().cloned());
        view.sort_by_key(|b| b.start_time);
        view
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Insert scheduled blocks at the position matching their start time.
    pub fn insert(&mut self, new_blocks: Vec<TimeBlock>) -> Result<()> {
        for block in &new_blocks {
            if block.end_time <= block.start_time {
                return Err(EngineError::InvalidDuration(format!(
                    "block '{}' must end after it starts",
                    block.id
                )));
            }
            if block.status == BlockStatus::Unplugged {
                return Err(EngineError::InvalidSchedule(
                    "unplugged blocks are derived and cannot be inserted".to_string(),
                ));
            }
            let collision = self
                .blocks
                .iter()
                .filter(|b| matches!(b.status, BlockStatus::Will | BlockStatus::Now))
                .find(|b| b.overlaps(block));
            if let Some(existing) = collision {
                return Err(EngineError::InvalidSchedule(format!(
                    "block '{}' overlaps scheduled block '{}'",
                    block.id, existing.id
                )));
            }
        }

        for block in new_blocks {
            let at = self
                .blocks
                .iter()
                .position(|b| b.start_time > block.start_time)
                .unwrap_or(self.blocks.len());
            self.blocks.insert(at, block);
        }
        Ok(())
    }

    /// Remove a block so its task can return to the inbox.
    ///
    /// Completed blocks are history and stay put. The task counts as fully
    /// returned only when this was its last block on the timeline.
    pub fn remove_to_inbox(&mut self, block_id: &str) -> Result<RemovedToInbox> {
        let index = self
            .index_of(block_id)
            .ok_or_else(|| EngineError::UnknownBlock(block_id.to_string()))?;
        if self.blocks[index].status == BlockStatus::Done {
            return Err(EngineError::InvalidState {
                block_id: block_id.to_string(),
                status: BlockStatus::Done,
            });
        }

        let block = self.blocks.remove(index);
        let task_fully_returned = match &block.task_id {
            Some(task_id) => self.blocks_of_task(task_id).is_empty(),
            None => true,
        };
        Ok(RemovedToInbox {
            block,
            task_fully_returned,
        })
    }

    /// Apply a full reordering of the movable (non-`DONE`) blocks.
    ///
    /// Sequence positions only; timestamps are untouched. The caller is
    /// expected to re-derive timestamps for the new order afterwards.
    pub fn reorder(&mut self, new_order: &[String], now: DateTime<Utc>) -> Result<()> {
        let movable_ids: Vec<&str> = self
            .blocks
            .iter()
            .filter(|b| b.status.is_movable())
            .map(|b| b.id.as_str())
            .collect();

        if new_order.len() != movable_ids.len() {
            return Err(EngineError::InvalidReorder(format!(
                "expected {} blocks, got {}",
                movable_ids.len(),
                new_order.len()
            )));
        }
        for id in new_order {
            match self.get(id) {
                None => return Err(EngineError::UnknownBlock(id.clone())),
                Some(b) if !b.status.is_movable() => {
                    return Err(EngineError::InvalidReorder(format!(
                        "block '{}' is {:?} and cannot be moved",
                        id, b.status
                    )));
                }
                Some(_) => {}
            }
        }
        let mut seen = std::collections::HashSet::new();
        for id in new_order {
            if !seen.insert(id.as_str()) {
                return Err(EngineError::InvalidReorder(format!(
                    "block '{id}' appears twice"
                )));
            }
        }

        // A block whose start has already passed cannot be queued ahead of
        // the current block.
        if let Some(now_block) = self.now_block() {
            if let Some(now_pos) = new_order.iter().position(|id| *id == now_block.id) {
                for id in &new_order[..now_pos] {
                    if let Some(b) = self.get(id) {
                        if b.start_time < now {
                            return Err(EngineError::InvalidReorder(format!(
                                "block '{}' already started and cannot precede the current block",
                                b.id
                            )));
                        }
                    }
                }
            }
        }

        // Completed blocks keep their positions; movable slots are filled
        // from the requested order.
        let mut replacements: Vec<TimeBlock> = Vec::with_capacity(new_order.len());
        for id in new_order {
            if let Some(index) = self.index_of(id) {
                replacements.push(self.blocks[index].clone());
            }
        }
        let mut queue = replacements.into_iter();
        let mut result = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            if block.status.is_movable() {
                if let Some(next) = queue.next() {
                    result.push(next);
                }
            } else {
                result.push(block.clone());
            }
        }

        if let Some(message) = split_adjacency_violation(&result) {
            return Err(EngineError::InvalidReorder(message));
        }

        self.blocks = result;
        Ok(())
    }

    /// Split an active block: a completed prefix of `elapsed_minutes` and a
    /// residual continuation carrying the remaining duration.
    pub fn split_at(
        &mut self,
        block_id: &str,
        elapsed_minutes: u32,
        residual_status: BlockStatus,
    ) -> Result<SplitOutcome> {
        let index = self
            .index_of(block_id)
            .ok_or_else(|| EngineError::UnknownBlock(block_id.to_string()))?;
        let block = &self.blocks[index];
        match block.status {
            BlockStatus::Done => {
                return Err(EngineError::AlreadyResolved {
                    block_id: block_id.to_string(),
                })
            }
            status if !status.is_actionable() => {
                return Err(EngineError::InvalidState {
                    block_id: block_id.to_string(),
                    status,
                })
            }
            _ => {}
        }
        if !matches!(residual_status, BlockStatus::Pending | BlockStatus::Will) {
            return Err(EngineError::InvalidSchedule(format!(
                "residual block cannot be created as {residual_status:?}"
            )));
        }

        let scheduled = self.blocks[index].duration_minutes();
        let elapsed = elapsed_minutes as i64;
        if elapsed < 1 {
            return Err(EngineError::InvalidDuration(
                "split point must be at least one minute in".to_string(),
            ));
        }
        if elapsed >= scheduled {
            return Err(EngineError::InvalidDuration(format!(
                "split point ({elapsed}m) must fall inside the block ({scheduled}m)"
            )));
        }

        let prefix_index = self.blocks[index].split_index.unwrap_or(0);
        let residual_split_index = prefix_index + 1;
        let task_id = self.blocks[index].task_id.clone();

        // Later segments of the same task slide one index down.
        if let Some(task_id) = &task_id {
            for b in &mut self.blocks {
                if b.task_id.as_deref() == Some(task_id) && b.id != block_id {
                    if let Some(i) = b.split_index {
                        if i >= residual_split_index {
                            b.split_index = Some(i + 1);
                        }
                    }
                }
            }
        }

        let prefix = &mut self.blocks[index];
        prefix.split_index = Some(prefix_index);
        prefix.end_time = prefix.start_time + Duration::minutes(elapsed);
        prefix.status = BlockStatus::Done;

        let residual = TimeBlock {
            id: uuid::Uuid::new_v4().to_string(),
            task_id,
            workspace_id: prefix.workspace_id.clone(),
            title: prefix.title.clone(),
            start_time: prefix.end_time,
            end_time: prefix.end_time + Duration::minutes(scheduled - elapsed),
            status: residual_status,
            review_memo: None,
            urgent: prefix.urgent,
            split_index: Some(residual_split_index),
        };
        self.blocks.insert(index + 1, residual);

        Ok(SplitOutcome {
            prefix_index: index,
            residual_index: index + 1,
        })
    }

    /// Shift a block and every subsequent `WILL` block forward.
    /// Returns the ids of all shifted blocks, acted block first.
    pub fn shift_from(&mut self, block_id: &str, minutes: u32) -> Result<Vec<String>> {
        let index = self
            .index_of(block_id)
            .ok_or_else(|| EngineError::UnknownBlock(block_id.to_string()))?;
        let delta = Duration::minutes(minutes as i64);
        let mut shifted = Vec::new();
        for (i, block) in self.blocks.iter_mut().enumerate() {
            if i == index || (i > index && block.status == BlockStatus::Will) {
                block.start_time += delta;
                block.end_time += delta;
                shifted.push(block.id.clone());
            }
        }
        Ok(shifted)
    }

    /// Mark an actionable block done with an explicit end time.
    pub fn complete(
        &mut self,
        block_id: &str,
        end_time: DateTime<Utc>,
        review_memo: Option<String>,
    ) -> Result<()> {
        let index = self
            .index_of(block_id)
            .ok_or_else(|| EngineError::UnknownBlock(block_id.to_string()))?;
        let block = &mut self.blocks[index];
        match block.status {
            BlockStatus::Done => {
                return Err(EngineError::AlreadyResolved {
                    block_id: block_id.to_string(),
                })
            }
            status if !status.is_actionable() => {
                return Err(EngineError::InvalidState {
                    block_id: block_id.to_string(),
                    status,
                })
            }
            _ => {}
        }
        if end_time <= block.start_time {
            return Err(EngineError::InvalidDuration(format!(
                "completion time must fall after the block start ({})",
                block.start_time
            )));
        }
        block.end_time = end_time;
        block.status = BlockStatus::Done;
        if review_memo.is_some() {
            block.review_memo = review_memo;
        }
        Ok(())
    }

    /// Demote an actionable block back to `WILL` (delay disposition).
    pub fn demote_to_will(&mut self, block_id: &str) -> Result<()> {
        let index = self
            .index_of(block_id)
            .ok_or_else(|| EngineError::UnknownBlock(block_id.to_string()))?;
        let block = &mut self.blocks[index];
        match block.status {
            BlockStatus::Done => Err(EngineError::AlreadyResolved {
                block_id: block_id.to_string(),
            }),
            status if !status.is_actionable() => Err(EngineError::InvalidState {
                block_id: block_id.to_string(),
                status,
            }),
            _ => {
                block.status = BlockStatus::Will;
                Ok(())
            }
        }
    }

    /// Flag the current block as overrun once its end has passed.
    pub fn flag_overrun(&mut self, now: DateTime<Utc>) -> Option<String> {
        let block = self
            .blocks
            .iter_mut()
            .find(|b| b.status == BlockStatus::Now && b.end_time <= now)?;
        block.status = BlockStatus::Pending;
        Some(block.id.clone())
    }

    /// Promote the earliest due `WILL` block, unless a current or pending
    /// block stands in the way.
    pub fn promote_due(&mut self, now: DateTime<Utc>) -> Option<String> {
        if self.now_block().is_some() || self.pending_block().is_some() {
            return None;
        }
        let due = self
            .blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.status == BlockStatus::Will && b.start_time <= now)
            .min_by_key(|(_, b)| b.start_time)
            .map(|(i, _)| i)?;
        self.blocks[due].status = BlockStatus::Now;
        Some(self.blocks[due].id.clone())
    }

    /// Apply re-derived timestamps to `WILL` blocks, matched by id.
    /// Used after a reorder, when the scheduler has re-packed the sequence.
    pub fn apply_times(&mut self, retimed: &[TimeBlock]) {
        for update in retimed {
            if let Some(block) = self
                .blocks
                .iter_mut()
                .find(|b| b.id == update.id && b.status == BlockStatus::Will)
            {
                block.start_time = update.start_time;
                block.end_time = update.end_time;
            }
        }
    }

    /// Drop every block of a task (task deletion cascade).
    /// Returns the removed block ids.
    pub fn remove_task_blocks(&mut self, task_id: &str) -> Vec<String> {
        let removed: Vec<String> = self
            .blocks
            .iter()
            .filter(|b| b.task_id.as_deref() == Some(task_id))
            .map(|b| b.id.clone())
            .collect();
        self.blocks
            .retain(|b| b.task_id.as_deref() != Some(task_id));
        removed
    }

    /// Verify the ledger invariants. Tests call this after every mutation.
    pub fn check_invariants(&self) -> Result<(), String> {
        let now_count = self
            .blocks
            .iter()
            .filter(|b| b.status == BlockStatus::Now)
            .count();
        if now_count > 1 {
            return Err(format!("{now_count} blocks are NOW; at most one allowed"));
        }

        for block in &self.blocks {
            if block.end_time <= block.start_time {
                return Err(format!("block '{}' has an empty span", block.id));
            }
            if block.status == BlockStatus::Unplugged {
                return Err(format!(
                    "derived unplugged block '{}' stored in ledger",
                    block.id
                ));
            }
        }

        // Sequence position may lag behind re-derived times right after a
        // reorder; the temporal invariant is on the times themselves.
        let mut active: Vec<&TimeBlock> = self
            .blocks
            .iter()
            .filter(|b| matches!(b.status, BlockStatus::Will | BlockStatus::Now))
            .collect();
        active.sort_by_key(|b| b.start_time);
        for pair in active.windows(2) {
            if pair[0].end_time > pair[1].start_time {
                return Err(format!(
                    "blocks '{}' and '{}' overlap",
                    pair[0].id, pair[1].id
                ));
            }
        }

        if let Some(message) = split_adjacency_violation(&self.blocks) {
            return Err(message);
        }
        for task_blocks in self.split_tasks() {
            let mut last_start: Option<DateTime<Utc>> = None;
            let mut last_index: Option<u32> = None;
            for b in task_blocks {
                if let Some(prev) = last_start {
                    if b.start_time < prev {
                        return Err(format!(
                            "split blocks of task {:?} not in start order",
                            b.task_id
                        ));
                    }
                }
                if let (Some(prev), Some(current)) = (last_index, b.split_index) {
                    if current <= prev {
                        return Err(format!(
                            "split indices of task {:?} not ascending",
                            b.task_id
                        ));
                    }
                }
                last_start = Some(b.start_time);
                last_index = b.split_index;
            }
        }

        Ok(())
    }

    fn split_tasks(&self) -> Vec<Vec<&TimeBlock>> {
        let mut by_task: std::collections::HashMap<&str, Vec<&TimeBlock>> =
            std::collections::HashMap::new();
        for b in &self.blocks {
            if let Some(task_id) = b.task_id.as_deref() {
                by_task.entry(task_id).or_default().push(b);
            }
        }
        by_task.into_values().filter(|v| v.len() > 1).collect()
    }
}

/// Blocks of a multi-block task must sit next to each other in sequence.
fn split_adjacency_violation(blocks: &[TimeBlock]) -> Option<String> {
    let mut last_seen: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for (i, block) in blocks.iter().enumerate() {
        let Some(task_id) = block.task_id.as_deref() else {
            continue;
        };
        if let Some(&prev) = last_seen.get(task_id) {
            if i != prev + 1 {
                return Some(format!(
                    "blocks of task '{task_id}' must stay adjacent in the sequence"
                ));
            }
        }
        last_seen.insert(task_id, i);
    }
    None
}
