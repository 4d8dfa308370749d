//! Promotion monitor.
//!
//! A periodic tick against wall-clock time that only flips block status:
//! - a `NOW` block whose end has passed is flagged `PENDING` and surfaced
//!   for mandatory disposition; it is never auto-completed
//! - when nothing is current and nothing is pending, the earliest due
//!   `WILL` block is promoted to `NOW`
//!
//! The monitor never creates or deletes blocks. Tick resolution only
//! affects how quickly promotions become visible, never correctness.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::events::Event;
use crate::ledger::BlockLedger;
use crate::planner::Planner;

/// Apply one monitor tick to a ledger.
///
/// Returns the emitted events; empty when nothing was due. A freshly
/// flagged `PENDING` block suppresses promotion until it is resolved.
pub fn tick(ledger: &mut BlockLedger, now: DateTime<Utc>) -> Vec<Event> {
    let mut events = Vec::new();

    if let Some(block_id) = ledger.flag_overrun(now) {
        events.push(Event::BlockOverrun { block_id, at: now });
    }

    if let Some(block_id) = ledger.promote_due(now) {
        events.push(Event::BlockPromoted { block_id, at: now });
    }

    events
}

/// Drive a planner's monitor on a fixed interval until the task is aborted.
///
/// Ticks are skippable by design: a mutation still in flight makes the
/// planner report the tick as dropped, and a missed interval slot is
/// skipped rather than queued.
pub async fn run(planner: Arc<Planner>, period: std::time::Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        match planner.try_tick().await {
            Ok(Some(update)) => {
                for event in &update.events {
                    tracing::info!(?event, "monitor tick");
                }
            }
            Ok(None) => {
                tracing::debug!("monitor tick dropped; mutation in flight");
            }
            Err(error) => {
                tracing::warn!(%error, "monitor tick failed");
            }
        }
    }
}
