//! Timeline layout commands.

use std::time::Duration;

use clap::Subcommand;
use dayflow_core::monitor;

use super::{open_planner, CliError};

#[derive(Subcommand)]
pub enum TimelineAction {
    /// Show today's timeline, unplugged windows included
    Show,
    /// Lay an inbox task out onto the timeline
    Plan {
        /// Task ID
        task_id: String,
    },
    /// Return a block to the inbox
    Inbox {
        /// Block ID
        block_id: String,
    },
    /// Apply a new sequence order over the movable blocks
    Reorder {
        /// Block IDs in the new order
        block_ids: Vec<String>,
    },
    /// Run the promotion monitor until interrupted
    Watch,
}

pub async fn run(action: TimelineAction) -> Result<(), CliError> {
    let (planner, config) = open_planner().await?;

    match action {
        TimelineAction::Show => {
            let view = planner.timeline_view().await;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        TimelineAction::Plan { task_id } => {
            let update = planner.move_to_timeline(&task_id).await?;
            println!("{}", serde_json::to_string_pretty(&update.blocks)?);
        }
        TimelineAction::Inbox { block_id } => {
            let update = planner.move_to_inbox(&block_id).await?;
            println!("{}", serde_json::to_string_pretty(&update.blocks)?);
        }
        TimelineAction::Reorder { block_ids } => {
            let update = planner.reorder(&block_ids).await?;
            println!("{}", serde_json::to_string_pretty(&update.blocks)?);
        }
        TimelineAction::Watch => {
            println!("watching timeline (ctrl-c to stop)");
            monitor::run(planner, Duration::from_secs(config.monitor.tick_seconds)).await;
        }
    }
    Ok(())
}
