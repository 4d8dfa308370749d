//! Planner command facade.
//!
//! Wires the scheduler, the ledger, the transition machine, and the
//! promotion monitor over a persistence collaborator. All mutations are
//! serialized through one async mutex: a mutation completes (including its
//! persistence call) before the next command or monitor tick runs.
//!
//! Commands mutate the in-memory ledger first, then persist. The returned
//! state is authoritative; the store is only a durability boundary. A
//! persistence failure triggers a full ledger reload -- never a partial
//! rollback -- and is surfaced to the caller untouched.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::block::{BlockStatus, TimeBlock};
use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::events::Event;
use crate::ledger::BlockLedger;
use crate::monitor;
use crate::scheduler::Scheduler;
use crate::store::PlannerStore;
use crate::task::Task;
use crate::timeutil::minutes_between;
use crate::transition::{self, TransitionAction};
use crate::workspace::UnpluggedWindow;

/// Authoritative post-mutation state returned by every command.
#[derive(Debug, Clone)]
pub struct PlannerUpdate {
    /// Ledger blocks in sequence order (unplugged projections excluded).
    pub blocks: Vec<TimeBlock>,
    pub events: Vec<Event>,
}

struct PlannerState {
    ledger: BlockLedger,
    windows: Vec<UnpluggedWindow>,
}

/// The engine entry point for one workspace-day.
pub struct Planner {
    store: Arc<dyn PlannerStore>,
    clock: Arc<dyn Clock>,
    scheduler: Scheduler,
    workspace_id: String,
    state: Mutex<PlannerState>,
}

impl Planner {
    /// Load the ledger and exclusion windows for today's workspace-day.
    pub async fn open(
        store: Arc<dyn PlannerStore>,
        clock: Arc<dyn Clock>,
        workspace_id: impl Into<String>,
    ) -> Result<Self> {
        let workspace_id = workspace_id.into();
        let date = clock.today();
        let blocks = store.load_ledger(&workspace_id, date).await?;
        let windows = store.load_unplugged_windows(&workspace_id).await?;
        Ok(Self {
            store,
            clock,
            scheduler: Scheduler::new(),
            workspace_id: workspace_id.clone(),
            state: Mutex::new(PlannerState {
                ledger: BlockLedger::from_blocks(workspace_id, date, blocks),
                windows,
            }),
        })
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Current ledger blocks, sequence order.
    pub async fn ledger(&self) -> Vec<TimeBlock> {
        self.state.lock().await.ledger.blocks().to_vec()
    }

    /// Ledger blocks merged with the day's unplugged projections, for
    /// rendering.
    pub async fn timeline_view(&self) -> Vec<TimeBlock> {
        let state = self.state.lock().await;
        let unplugged = self.scheduler.project_unplugged(
            &self.workspace_id,
            &state.windows,
            state.ledger.date(),
        );
        state.ledger.render_with(&unplugged)
    }

    pub async fn inbox(&self) -> Result<Vec<Task>> {
        Ok(self.store.load_inbox(&self.workspace_id).await?)
    }

    pub async fn unplugged_windows(&self) -> Vec<UnpluggedWindow> {
        self.state.lock().await.windows.clone()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Create an inbox task.
    pub async fn create_task(
        &self,
        title: impl Into<String>,
        estimated_minutes: u32,
        memo: Option<String>,
        urgent: bool,
    ) -> Result<Task> {
        let mut task = Task::new(&self.workspace_id, title, estimated_minutes)?;
        if let Some(memo) = memo {
            task = task.with_memo(memo);
        }
        task = task.with_urgent(urgent);
        self.store.create_task(&task).await?;
        debug!(task_id = %task.id, "task created");
        Ok(task)
    }

    /// Delete a task, cascading to its blocks.
    pub async fn delete_task(&self, task_id: &str) -> Result<PlannerUpdate> {
        let mut state = self.state.lock().await;
        state.ledger.remove_task_blocks(task_id);
        if let Err(error) = self.store.delete_task(task_id).await {
            return self.reload_after_failure(&mut state, error.into()).await;
        }
        Ok(PlannerUpdate {
            blocks: state.ledger.blocks().to_vec(),
            events: Vec::new(),
        })
    }

    /// Schedule an inbox task onto the timeline after the current cursor.
    pub async fn move_to_timeline(&self, task_id: &str) -> Result<PlannerUpdate> {
        let task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| EngineError::UnknownTask(task_id.to_string()))?;

        let mut state = self.state.lock().await;
        let now = self.clock.now();
        let cursor = state.ledger.scheduling_cursor(now);
        let blocks = self.scheduler.schedule(&task, cursor, &state.windows);
        state.ledger.insert(blocks.clone())?;

        if let Err(error) = self.store.persist_move_to_timeline(task_id, &blocks).await {
            return self.reload_after_failure(&mut state, error.into()).await;
        }

        debug!(task_id, count = blocks.len(), "task moved to timeline");
        Ok(PlannerUpdate {
            blocks: state.ledger.blocks().to_vec(),
            events: vec![Event::TaskScheduled {
                task_id: task_id.to_string(),
                block_ids: blocks.into_iter().map(|b| b.id).collect(),
                at: now,
            }],
        })
    }

    /// Remove a block from the timeline; the task returns to the inbox
    /// once its last block is gone.
    pub async fn move_to_inbox(&self, block_id: &str) -> Result<PlannerUpdate> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        let removed = state.ledger.remove_to_inbox(block_id)?;

        if let Err(error) = self.store.persist_move_to_inbox(block_id).await {
            return self.reload_after_failure(&mut state, error.into()).await;
        }

        let task_id = removed.block.task_id.clone().unwrap_or_default();
        Ok(PlannerUpdate {
            blocks: state.ledger.blocks().to_vec(),
            events: vec![Event::BlockReturnedToInbox {
                block_id: block_id.to_string(),
                task_id,
                task_fully_returned: removed.task_fully_returned,
                at: now,
            }],
        })
    }

    /// Apply a new sequence order, then re-derive `WILL` block times to
    /// match it.
    pub async fn reorder(&self, ordered_block_ids: &[String]) -> Result<PlannerUpdate> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        state.ledger.reorder(ordered_block_ids, now)?;

        let cursor = retime_cursor(&state.ledger, now);
        let retimed =
            self.scheduler
                .retime_sequence(state.ledger.blocks(), cursor, &state.windows);
        state.ledger.apply_times(&retimed);

        if let Err(error) = self
            .store
            .persist_reorder(
                &self.workspace_id,
                state.ledger.date(),
                ordered_block_ids,
                &retimed,
            )
            .await
        {
            return self.reload_after_failure(&mut state, error.into()).await;
        }

        Ok(PlannerUpdate {
            blocks: state.ledger.blocks().to_vec(),
            events: vec![Event::OrderChanged {
                ordered_block_ids: ordered_block_ids.to_vec(),
                at: now,
            }],
        })
    }

    /// Dispose of the current (`NOW`/`PENDING`) block.
    pub async fn transition(
        &self,
        block_id: &str,
        action: TransitionAction,
        review_memo: Option<String>,
    ) -> Result<PlannerUpdate> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        let outcome =
            transition::apply(&mut state.ledger, block_id, action, review_memo.clone(), now)?;

        let updated = touched_blocks(&state.ledger, &outcome.events, block_id);
        if let Err(error) = self
            .store
            .persist_transition(block_id, &action, review_memo.as_deref(), &updated)
            .await
        {
            return self.reload_after_failure(&mut state, error.into()).await;
        }

        debug!(block_id, %action, "transition applied");
        Ok(PlannerUpdate {
            blocks: state.ledger.blocks().to_vec(),
            events: outcome.events,
        })
    }

    /// Interrupt the current block: the elapsed part completes, the rest
    /// continues as a `PENDING` residual awaiting disposition.
    pub async fn interrupt(&self, block_id: &str) -> Result<PlannerUpdate> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();

        let block = state
            .ledger
            .get(block_id)
            .ok_or_else(|| EngineError::UnknownBlock(block_id.to_string()))?;
        if block.status != BlockStatus::Now {
            return Err(EngineError::InvalidState {
                block_id: block_id.to_string(),
                status: block.status,
            });
        }
        let elapsed = minutes_between(block.start_time, now);
        if elapsed < 1 {
            return Err(EngineError::InvalidDuration(
                "a block cannot be interrupted during its first minute".to_string(),
            ));
        }

        let outcome =
            state
                .ledger
                .split_at(block_id, elapsed as u32, BlockStatus::Pending)?;
        let prefix = state.ledger.blocks()[outcome.prefix_index].clone();
        let residual = state.ledger.blocks()[outcome.residual_index].clone();

        if let Err(error) = self
            .store
            .persist_transition(
                block_id,
                &TransitionAction::CompleteNow,
                None,
                &[prefix, residual.clone()],
            )
            .await
        {
            return self.reload_after_failure(&mut state, error.into()).await;
        }

        Ok(PlannerUpdate {
            blocks: state.ledger.blocks().to_vec(),
            events: vec![Event::BlockSplit {
                block_id: block_id.to_string(),
                residual_block_id: residual.id,
                elapsed_minutes: elapsed as u32,
                at: now,
            }],
        })
    }

    /// Run one monitor tick, waiting for any in-flight mutation.
    pub async fn tick(&self) -> Result<PlannerUpdate> {
        let mut state = self.state.lock().await;
        self.tick_locked(&mut state).await
    }

    /// Run one monitor tick unless a mutation is in flight, in which case
    /// the tick is dropped (`Ok(None)`).
    pub async fn try_tick(&self) -> Result<Option<PlannerUpdate>> {
        match self.state.try_lock() {
            Ok(mut state) => self.tick_locked(&mut state).await.map(Some),
            Err(_) => Ok(None),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    async fn tick_locked(&self, state: &mut PlannerState) -> Result<PlannerUpdate> {
        let now = self.clock.now();
        let events = monitor::tick(&mut state.ledger, now);

        for event in &events {
            let result = match event {
                Event::BlockPromoted { block_id, .. } => {
                    self.store
                        .persist_status_change(block_id, BlockStatus::Now)
                        .await
                }
                Event::BlockOverrun { block_id, .. } => {
                    self.store
                        .persist_status_change(block_id, BlockStatus::Pending)
                        .await
                }
                _ => Ok(()),
            };
            if let Err(error) = result {
                return self.reload_after_failure(state, error.into()).await;
            }
        }

        Ok(PlannerUpdate {
            blocks: state.ledger.blocks().to_vec(),
            events,
        })
    }

    /// Reload the full ledger from the store after a failed write, then
    /// surface the original error.
    async fn reload_after_failure(
        &self,
        state: &mut PlannerState,
        error: EngineError,
    ) -> Result<PlannerUpdate> {
        warn!(%error, "persistence failed; reloading ledger");
        match self.reload_state(state).await {
            Ok(()) => Err(error),
            Err(reload_error) => {
                warn!(%reload_error, "ledger reload after failure also failed");
                Err(error)
            }
        }
    }

    async fn reload_state(&self, state: &mut PlannerState) -> Result<()> {
        let date = state.ledger.date();
        let blocks = self.store.load_ledger(&self.workspace_id, date).await?;
        let windows = self.store.load_unplugged_windows(&self.workspace_id).await?;
        state.ledger = BlockLedger::from_blocks(self.workspace_id.clone(), date, blocks);
        state.windows = windows;
        Ok(())
    }

    /// Replace the workspace's unplugged windows.
    pub async fn set_unplugged_windows(
        &self,
        windows: Vec<UnpluggedWindow>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        self.store
            .save_unplugged_windows(&self.workspace_id, &windows)
            .await?;
        state.windows = windows;
        Ok(())
    }
}

/// Earliest instant re-timed `WILL` blocks may start: after the current
/// and pending blocks, never in the past.
fn retime_cursor(ledger: &BlockLedger, now: DateTime<Utc>) -> DateTime<Utc> {
    ledger
        .blocks()
        .iter()
        .filter(|b| matches!(b.status, BlockStatus::Now | BlockStatus::Pending))
        .map(|b| b.end_time)
        .max()
        .map_or(now, |end| end.max(now))
}

/// Blocks a transition touched: the acted block, anything it shifted, and
/// the block promoted in its wake.
fn touched_blocks(ledger: &BlockLedger, events: &[Event], acted: &str) -> Vec<TimeBlock> {
    let mut ids: HashSet<&str> = HashSet::new();
    ids.insert(acted);
    for event in events {
        match event {
            Event::BlockPromoted { block_id, .. } => {
                ids.insert(block_id);
            }
            Event::BlockDelayed {
                shifted_block_ids, ..
            } => {
                for id in shifted_block_ids {
                    ids.insert(id);
                }
            }
            _ => {}
        }
    }
    ledger
        .blocks()
        .iter()
        .filter(|b| ids.contains(b.id.as_str()))
        .cloned()
        .collect()
}
