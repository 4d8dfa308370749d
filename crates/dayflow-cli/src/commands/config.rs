//! Configuration commands.

use clap::Subcommand;
use dayflow_core::{Config, WallTime};

use super::CliError;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the current configuration
    Show,
    /// Set the workspace display name
    SetName {
        /// New workspace name
        name: String,
    },
    /// Set the advisory core time window
    SetCoreTime {
        /// Window start ("HH:mm")
        start: String,
        /// Window end ("HH:mm")
        end: String,
    },
    /// Clear the core time window
    ClearCoreTime,
    /// Set the promotion monitor tick interval in seconds
    SetTick {
        /// Seconds between ticks
        seconds: u64,
    },
    /// Add an unplugged window
    UnpluggedAdd {
        /// Window label
        label: String,
        /// Window start ("HH:mm")
        start: String,
        /// Window end ("HH:mm")
        end: String,
    },
    /// Remove unplugged windows by label
    UnpluggedRemove {
        /// Label of the window(s) to remove
        label: String,
    },
}

fn wall(value: &str) -> Result<WallTime, CliError> {
    WallTime::parse(value).ok_or_else(|| format!("invalid HH:mm time: '{value}'").into())
}

pub async fn run(action: ConfigAction) -> Result<(), CliError> {
    let mut config = Config::load()?;

    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(());
        }
        ConfigAction::SetName { name } => config.workspace.name = name,
        ConfigAction::SetCoreTime { start, end } => {
            config.set_core_time(wall(&start)?, wall(&end)?)?;
        }
        ConfigAction::ClearCoreTime => config.workspace.core_time = None,
        ConfigAction::SetTick { seconds } => {
            if seconds == 0 {
                return Err("tick interval must be at least one second".into());
            }
            config.monitor.tick_seconds = seconds;
        }
        ConfigAction::UnpluggedAdd { label, start, end } => {
            config.add_unplugged(label, wall(&start)?, wall(&end)?)?;
        }
        ConfigAction::UnpluggedRemove { label } => {
            if config.remove_unplugged(&label) == 0 {
                return Err(format!("no unplugged window labeled '{label}'").into());
            }
        }
    }

    config.save()?;
    println!("ok");
    Ok(())
}
