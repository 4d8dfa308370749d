//! Transition actions over the current block.
//!
//! A closed action type gives exhaustiveness checking over the disposition
//! table: `WILL -> NOW -> {DONE, PENDING}`; `PENDING -> {DONE, WILL}`.
//! Every action targets a `NOW` or `PENDING` block; anything else fails
//! with a typed error. Double-submitting a disposition is safe -- the
//! second call reports `AlreadyResolved` and leaves the ledger untouched.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::block::BlockStatus;
use crate::error::{EngineError, Result};
use crate::events::Event;
use crate::ledger::BlockLedger;

/// User-issued disposition of the current block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TransitionAction {
    /// Mark done at the originally scheduled end time.
    CompleteOnTime,
    /// Mark done right now; any unused remainder is discarded.
    CompleteNow,
    /// Mark done `minutes` ago.
    CompleteAgo { minutes: u32 },
    /// Push the block (and everything scheduled after it) forward.
    Delay { minutes: u32 },
}

impl fmt::Display for TransitionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionAction::CompleteOnTime => write!(f, "complete_on_time"),
            TransitionAction::CompleteNow => write!(f, "complete_now"),
            TransitionAction::CompleteAgo { minutes } => write!(f, "complete_ago({minutes}m)"),
            TransitionAction::Delay { minutes } => write!(f, "delay({minutes}m)"),
        }
    }
}

/// Result of applying a transition.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    /// Block the action was applied to.
    pub block_id: String,
    /// Block promoted to `NOW` as a side effect, if any.
    pub promoted: Option<String>,
    pub events: Vec<Event>,
}

/// Apply a transition action to the ledger.
///
/// Completions also promote the next due `WILL` block, unless a current
/// block already exists.
pub fn apply(
    ledger: &mut BlockLedger,
    block_id: &str,
    action: TransitionAction,
    review_memo: Option<String>,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome> {
    let block = ledger
        .get(block_id)
        .ok_or_else(|| EngineError::UnknownBlock(block_id.to_string()))?;
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

    let scheduled_end = block.end_time;
    let mut events = Vec::new();

    match action {
        TransitionAction::CompleteOnTime => {
            ledger.complete(block_id, scheduled_end, review_memo)?;
            events.push(Event::BlockCompleted {
                block_id: block_id.to_string(),
                end_time: scheduled_end,
                at: now,
            });
        }
        TransitionAction::CompleteNow => {
            ledger.complete(block_id, now, review_memo)?;
            events.push(Event::BlockCompleted {
                block_id: block_id.to_string(),
                end_time: now,
                at: now,
            });
        }
        TransitionAction::CompleteAgo { minutes } => {
            let end = now - Duration::minutes(minutes as i64);
            ledger.complete(block_id, end, review_memo)?;
            events.push(Event::BlockCompleted {
                block_id: block_id.to_string(),
                end_time: end,
                at: now,
            });
        }
        TransitionAction::Delay { minutes } => {
            if minutes == 0 {
                return Err(EngineError::InvalidDuration(
                    "delay must be at least one minute".to_string(),
                ));
            }
            ledger.demote_to_will(block_id)?;
            let shifted = ledger.shift_from(block_id, minutes)?;
            events.push(Event::BlockDelayed {
                block_id: block_id.to_string(),
                minutes,
                shifted_block_ids: shifted.into_iter().skip(1).collect(),
                at: now,
            });
        }
    }

    let promoted = match action {
        TransitionAction::Delay { .. } => None,
        _ => {
            let promoted = ledger.promote_due(now);
            if let Some(id) = &promoted {
                events.push(Event::BlockPromoted {
                    block_id: id.clone(),
                    at: now,
                });
            }
            promoted
        }
    };

    Ok(TransitionOutcome {
        block_id: block_id.to_string(),
        promoted,
        events,
    })
}
