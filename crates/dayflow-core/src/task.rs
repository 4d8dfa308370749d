//! Task types.
//!
//! A task is a unit of work with an estimated duration. It never owns time
//! itself -- scheduling a task materializes one or more time blocks on the
//! timeline, and an interrupted task may end up owning several.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// A unit of work waiting in the inbox or scheduled onto the timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: String,
    /// Workspace this task belongs to
    pub workspace_id: String,
    /// Task title
    pub title: String,
    /// Optional planning memo
    pub memo: Option<String>,
    /// Urgency flag, denormalized onto blocks for display
    pub urgent: bool,
    /// Estimated duration in minutes; always positive
    pub estimated_minutes: u32,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new task.
    ///
    /// Rejects a zero estimate -- a task with no duration can never be laid
    /// out as a block.
    pub fn new(
        workspace_id: impl Into<String>,
        title: impl Into<String>,
        estimated_minutes: u32,
    ) -> Result<Self> {
        if estimated_minutes == 0 {
            return Err(EngineError::InvalidDuration(
                "estimated duration must be at least one minute".to_string(),
            ));
        }
        let now = Utc::now();
        Ok(Task {
            id: uuid::Uuid::new_v4().to_string(),
            workspace_id: workspace_id.into(),
            title: title.into(),
            memo: None,
            urgent: false,
            estimated_minutes,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_urgent(mut self, urgent: bool) -> Self {
        self.urgent = urgent;
        self
    }
}
