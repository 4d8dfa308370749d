use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Every ledger mutation produces one or more events.
/// The shell renders them; tests assert on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A task was laid out onto the timeline as one or more blocks.
    TaskScheduled {
        task_id: String,
        block_ids: Vec<String>,
        at: DateTime<Utc>,
    },
    /// A WILL block whose start arrived became the current block.
    BlockPromoted {
        block_id: String,
        at: DateTime<Utc>,
    },
    /// The current block ran past its end and awaits disposition.
    BlockOverrun {
        block_id: String,
        at: DateTime<Utc>,
    },
    BlockCompleted {
        block_id: String,
        end_time: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// A block was pushed forward, cascading into later WILL blocks.
    BlockDelayed {
        block_id: String,
        minutes: u32,
        shifted_block_ids: Vec<String>,
        at: DateTime<Utc>,
    },
    /// An active block was split into a completed prefix and a residual.
    BlockSplit {
        block_id: String,
        residual_block_id: String,
        elapsed_minutes: u32,
        at: DateTime<Utc>,
    },
    BlockReturnedToInbox {
        block_id: String,
        task_id: String,
        task_fully_returned: bool,
        at: DateTime<Utc>,
    },
    OrderChanged {
        ordered_block_ids: Vec<String>,
        at: DateTime<Utc>,
    },
}
