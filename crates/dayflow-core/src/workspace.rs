//! Workspace types: unplugged windows and the advisory core time.

use serde::{Deserialize, Serialize};

use chrono::NaiveDate;

use crate::error::ConfigError;
use crate::timeutil::{Interval, WallTime};

/// A recurring daily exclusion window the scheduler must route around.
///
/// Windows are same-day only: `end` must be strictly after `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpluggedWindow {
    pub label: String,
    pub start: WallTime,
    pub end: WallTime,
}

impl UnpluggedWindow {
    pub fn new(
        label: impl Into<String>,
        start: WallTime,
        end: WallTime,
    ) -> Result<Self, ConfigError> {
        if end <= start {
            return Err(ConfigError::InvalidValue {
                key: "unplugged".to_string(),
                message: format!("window must end after it starts ({start} .. {end})"),
            });
        }
        Ok(Self {
            label: label.into(),
            start,
            end,
        })
    }

    /// Project this window onto a concrete date.
    pub fn on_date(&self, date: NaiveDate) -> Interval {
        Interval {
            start: self.start.on_date(date),
            end: self.end.on_date(date),
        }
    }

    pub fn duration_minutes(&self) -> i64 {
        self.end.minutes_from_midnight() - self.start.minutes_from_midnight()
    }
}

/// Daily focus window. Advisory only: displayed, never enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreTime {
    pub start: WallTime,
    pub end: WallTime,
}

/// Groups tasks and blocks; owns the scheduler's exclusion windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub core_time: Option<CoreTime>,
    #[serde(default)]
    pub unplugged_windows: Vec<UnpluggedWindow>,
}

impl Workspace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            core_time: None,
            unplugged_windows: Vec::new(),
        }
    }
}
