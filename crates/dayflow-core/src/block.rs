//! Time block types.
//!
//! A block is a concrete scheduled interval on the daily timeline. Task
//! blocks move through `WILL -> NOW -> DONE/PENDING`; unplugged blocks are
//! read-only projections of workspace exclusion windows and never change
//! status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::Task;
use crate::timeutil::Interval;

/// Status of a time block. At most one block per workspace-day is `Now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BlockStatus {
    /// Scheduled in the future
    Will,
    /// Currently active
    Now,
    /// Completed (terminal)
    Done,
    /// Was `Now`, ran past its end or was interrupted; awaiting disposition
    Pending,
    /// Non-task placeholder projected from an unplugged window
    Unplugged,
}

impl BlockStatus {
    /// Statuses a user transition may act on.
    pub fn is_actionable(self) -> bool {
        matches!(self, BlockStatus::Now | BlockStatus::Pending)
    }

    /// Statuses that participate in reordering.
    pub fn is_movable(self) -> bool {
        matches!(
            self,
            BlockStatus::Will | BlockStatus::Now | BlockStatus::Pending
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BlockStatus::Done)
    }
}

/// A concrete scheduled interval owned by the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeBlock {
    /// Unique identifier
    pub id: String,
    /// Owning task; `None` only for unplugged blocks
    pub task_id: Option<String>,
    /// Workspace this block belongs to
    pub workspace_id: String,
    /// Title, denormalized from the task
    pub title: String,
    /// Start instant; always strictly before `end_time`
    pub start_time: DateTime<Utc>,
    /// End instant
    pub end_time: DateTime<Utc>,
    /// Current status
    pub status: BlockStatus,
    /// Optional review memo attached on completion
    pub review_memo: Option<String>,
    /// Urgency flag, denormalized from the task
    pub urgent: bool,
    /// Ascending index within a split task; rendering continuity only
    pub split_index: Option<u32>,
}

impl TimeBlock {
    /// Create a `Will` block for a task over the given span.
    pub fn for_task(task: &Task, span: Interval) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: Some(task.id.clone()),
            workspace_id: task.workspace_id.clone(),
            title: task.title.clone(),
            start_time: span.start,
            end_time: span.end,
            status: BlockStatus::Will,
            review_memo: None,
            urgent: task.urgent,
            split_index: None,
        }
    }

    /// Create an unplugged placeholder block.
    pub fn unplugged(workspace_id: impl Into<String>, label: impl Into<String>, span: Interval) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: None,
            workspace_id: workspace_id.into(),
            title: label.into(),
            start_time: span.start,
            end_time: span.end,
            status: BlockStatus::Unplugged,
            review_memo: None,
            urgent: false,
            split_index: None,
        }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start_time,
            end: self.end_time,
        }
    }

    pub fn overlaps(&self, other: &TimeBlock) -> bool {
        self.start_time < other.end_time && self.end_time > other.start_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn span(start: DateTime<Utc>, minutes: i64) -> Interval {
        Interval::new(start, start + Duration::minutes(minutes)).unwrap()
    }

    #[test]
    fn status_predicates() {
        assert!(BlockStatus::Now.is_actionable());
        assert!(BlockStatus::Pending.is_actionable());
        assert!(!BlockStatus::Will.is_actionable());
        assert!(!BlockStatus::Done.is_actionable());
        assert!(!BlockStatus::Unplugged.is_actionable());

        assert!(BlockStatus::Will.is_movable());
        assert!(!BlockStatus::Done.is_movable());
        assert!(!BlockStatus::Unplugged.is_movable());

        assert!(BlockStatus::Done.is_terminal());
        assert!(!BlockStatus::Pending.is_terminal());
    }

    #[test]
    fn block_inherits_task_fields() {
        let task = Task::new("ws-1", "Deep work", 50)
            .unwrap()
            .with_urgent(true);
        let block = TimeBlock::for_task(&task, span(Utc::now(), 50));

        assert_eq!(block.task_id.as_deref(), Some(task.id.as_str()));
        assert_eq!(block.title, "Deep work");
        assert!(block.urgent);
        assert_eq!(block.status, BlockStatus::Will);
        assert_eq!(block.duration_minutes(), 50);
    }

    #[test]
    fn unplugged_block_has_no_task() {
        let block = TimeBlock::unplugged("ws-1", "Lunch", span(Utc::now(), 60));
        assert!(block.task_id.is_none());
        assert_eq!(block.status, BlockStatus::Unplugged);
    }

    #[test]
    fn overlap_detection() {
        let start = Utc::now();
        let task = Task::new("ws-1", "A", 30).unwrap();
        let first = TimeBlock::for_task(&task, span(start, 30));
        let second = TimeBlock::for_task(&task, span(start + Duration::minutes(15), 30));
        let third = TimeBlock::for_task(&task, span(start + Duration::minutes(30), 30));

        assert!(first.overlaps(&second));
        assert!(!first.overlaps(&third));
    }

    #[test]
    fn status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&BlockStatus::Pending).unwrap(),
            "\"PENDING\""
        );
        let decoded: BlockStatus = serde_json::from_str("\"WILL\"").unwrap();
        assert_eq!(decoded, BlockStatus::Will);
    }
}
