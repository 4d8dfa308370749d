//! CLI command modules.

pub mod block;
pub mod config;
pub mod task;
pub mod timeline;

use std::sync::Arc;

use dayflow_core::{Config, Planner, PlannerDb, PlannerStore, SystemClock};

pub type CliError = Box<dyn std::error::Error>;

/// Open the planner over the on-disk store.
///
/// The config file owns the unplugged windows; they are pushed into the
/// store on every invocation so the engine always sees the current set.
pub async fn open_planner() -> Result<(Arc<Planner>, Config), CliError> {
    let config = Config::load()?;
    let workspace = config.to_workspace();
    let store = Arc::new(PlannerDb::open()?);
    store
        .save_unplugged_windows(&workspace.id, &workspace.unplugged_windows)
        .await?;
    let planner = Planner::open(store, Arc::new(SystemClock), workspace.id).await?;
    Ok((Arc::new(planner), config))
}
