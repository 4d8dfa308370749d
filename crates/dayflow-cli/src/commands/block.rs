//! Dispositions of the current block.

use clap::Subcommand;
use dayflow_core::TransitionAction;

use super::{open_planner, CliError};

#[derive(Subcommand)]
pub enum BlockAction {
    /// Complete a block at its originally scheduled end time
    Complete {
        /// Block ID
        block_id: String,
        /// Review memo
        #[arg(long)]
        memo: Option<String>,
    },
    /// Complete a block at the present moment; the unused remainder is
    /// discarded
    CompleteNow {
        /// Block ID
        block_id: String,
        /// Review memo
        #[arg(long)]
        memo: Option<String>,
    },
    /// Complete a block some minutes in the past
    CompleteAgo {
        /// Block ID
        block_id: String,
        /// How many minutes ago the work actually ended
        minutes: u32,
        /// Review memo
        #[arg(long)]
        memo: Option<String>,
    },
    /// Push a block (and everything scheduled after it) forward
    Delay {
        /// Block ID
        block_id: String,
        /// Minutes to delay by
        minutes: u32,
    },
    /// Interrupt the current block, splitting off the remainder
    Interrupt {
        /// Block ID
        block_id: String,
    },
    /// Run one promotion monitor tick
    Tick,
}

pub async fn run(action: BlockAction) -> Result<(), CliError> {
    let (planner, _config) = open_planner().await?;

    let update = match action {
        BlockAction::Complete { block_id, memo } => {
            planner
                .transition(&block_id, TransitionAction::CompleteOnTime, memo)
                .await?
        }
        BlockAction::CompleteNow { block_id, memo } => {
            planner
                .transition(&block_id, TransitionAction::CompleteNow, memo)
                .await?
        }
        BlockAction::CompleteAgo {
            block_id,
            minutes,
            memo,
        } => {
            planner
                .transition(&block_id, TransitionAction::CompleteAgo { minutes }, memo)
                .await?
        }
        BlockAction::Delay { block_id, minutes } => {
            planner
                .transition(&block_id, TransitionAction::Delay { minutes }, None)
                .await?
        }
        BlockAction::Interrupt { block_id } => planner.interrupt(&block_id).await?,
        BlockAction::Tick => planner.tick().await?,
    };

    for event in &update.events {
        println!("{}", serde_json::to_string(event)?);
    }
    println!("{}", serde_json::to_string_pretty(&update.blocks)?);
    Ok(())
}
