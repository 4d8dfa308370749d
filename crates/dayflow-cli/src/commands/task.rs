//! Inbox task commands.

use clap::Subcommand;

use super::{open_planner, CliError};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new inbox task
    Create {
        /// Task title
        title: String,
        /// Estimated duration in minutes
        #[arg(long, default_value = "25")]
        minutes: u32,
        /// Planning memo
        #[arg(long)]
        memo: Option<String>,
        /// Mark the task urgent
        #[arg(long)]
        urgent: bool,
    },
    /// List inbox tasks
    List,
    /// Delete a task, removing its blocks from the timeline
    Delete {
        /// Task ID
        id: String,
    },
}

pub async fn run(action: TaskAction) -> Result<(), CliError> {
    let (planner, _config) = open_planner().await?;

    match action {
        TaskAction::Create {
            title,
            minutes,
            memo,
            urgent,
        } => {
            let task = planner.create_task(title, minutes, memo, urgent).await?;
            println!("Task created: {}", task.id);
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::List => {
            let inbox = planner.inbox().await?;
            println!("{}", serde_json::to_string_pretty(&inbox)?);
        }
        TaskAction::Delete { id } => {
            planner.delete_task(&id).await?;
            println!("Task deleted: {id}");
        }
    }
    Ok(())
}
