//! Timeline scheduler.
//!
//! Packs tasks into `WILL` blocks after a cursor, routing around the
//! workspace's unplugged windows:
//! - a task is split into multiple blocks when a window cuts its span
//! - a cursor inside a window snaps to the window's end
//! - scheduling never fails; it extends into the future as far as needed
//!
//! The scheduler also derives the read-only `UNPLUGGED` placeholder blocks
//! and re-times `WILL` blocks after a reorder.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::block::{BlockStatus, TimeBlock};
use crate::task::Task;
use crate::timeutil::{minutes_between, Interval};
use crate::workspace::UnpluggedWindow;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Smallest slice worth emitting as its own block (minutes).
    pub min_segment_minutes: i64,
    /// Hard lookahead bound; past it the remainder is placed as-is so a
    /// wall-to-wall exclusion setup cannot spin the packer forever.
    pub max_lookahead_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_segment_minutes: 1,
            max_lookahead_days: 30,
        }
    }
}

/// Packs queued tasks into timeline blocks.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
        }
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// Lay a task out after `after_cursor` as one or more `WILL` blocks.
    ///
    /// The summed duration of the result always equals the task's estimate.
    pub fn schedule(
        &self,
        task: &Task,
        after_cursor: DateTime<Utc>,
        windows: &[UnpluggedWindow],
    ) -> Vec<TimeBlock> {
        let segments =
            self.pack_segments(after_cursor, task.estimated_minutes as i64, windows);
        let split = segments.len() > 1;
        segments
            .into_iter()
            .enumerate()
            .map(|(i, span)| {
                let mut block = TimeBlock::for_task(task, span);
                if split {
                    block.split_index = Some(i as u32);
                }
                block
            })
            .collect()
    }

    /// Schedule a whole queue sequentially, each task after the previous.
    pub fn schedule_queue(
        &self,
        tasks: &[Task],
        after_cursor: DateTime<Utc>,
        windows: &[UnpluggedWindow],
    ) -> Vec<TimeBlock> {
        let mut cursor = after_cursor;
        let mut blocks = Vec::new();
        for task in tasks {
            let scheduled = self.schedule(task, cursor, windows);
            if let Some(last) = scheduled.last() {
                cursor = last.end_time;
            }
            blocks.extend(scheduled);
        }
        blocks
    }

    /// Re-derive start times for `WILL` blocks after a reorder.
    ///
    /// Blocks keep their durations and are packed in the given sequence
    /// order starting at `from`; a block is not split further even when a
    /// window would have cut it at initial scheduling time.
    pub fn retime_sequence(
        &self,
        blocks_in_sequence: &[TimeBlock],
        from: DateTime<Utc>,
        windows: &[UnpluggedWindow],
    ) -> Vec<TimeBlock> {
        let mut cursor = from;
        let mut retimed = Vec::new();
        for block in blocks_in_sequence {
            if block.status != BlockStatus::Will {
                continue;
            }
            let span = self.next_free_span(cursor, block.duration_minutes(), windows);
            let mut updated = block.clone();
            updated.start_time = span.start;
            updated.end_time = span.end;
            cursor = span.end;
            retimed.push(updated);
        }
        retimed
    }

    /// Project unplugged windows onto a date as placeholder blocks.
    pub fn project_unplugged(
        &self,
        workspace_id: &str,
        windows: &[UnpluggedWindow],
        date: NaiveDate,
    ) -> Vec<TimeBlock> {
        let mut blocks: Vec<TimeBlock> = windows
            .iter()
            .map(|w| TimeBlock::unplugged(workspace_id, w.label.clone(), w.on_date(date)))
            .collect();
        blocks.sort_by_key(|b| b.start_time);
        blocks
    }

    // ── Packing internals ────────────────────────────────────────────

    fn pack_segments(
        &self,
        from: DateTime<Utc>,
        total_minutes: i64,
        windows: &[UnpluggedWindow],
    ) -> Vec<Interval> {
        let mut segments = Vec::new();
        if total_minutes <= 0 {
            return segments;
        }

        let horizon = from + Duration::days(self.config.max_lookahead_days);
        let mut cursor = from;
        let mut remaining = total_minutes;

        while remaining > 0 {
            if cursor >= horizon {
                segments.push(span_of(cursor, remaining));
                break;
            }
            let candidate_end = cursor + Duration::minutes(remaining);
            match next_exclusion(cursor, candidate_end, windows) {
                Some(window) if window.start <= cursor => {
                    cursor = window.end;
                }
                Some(window) => {
                    let span = minutes_between(cursor, window.start).min(remaining);
                    if span >= self.config.min_segment_minutes {
                        segments.push(span_of(cursor, span));
                        remaining -= span;
                    }
                    cursor = window.end;
                }
                None => {
                    segments.push(span_of(cursor, remaining));
                    remaining = 0;
                }
            }
        }
        segments
    }

    fn next_free_span(
        &self,
        from: DateTime<Utc>,
        minutes: i64,
        windows: &[UnpluggedWindow],
    ) -> Interval {
        let horizon = from + Duration::days(self.config.max_lookahead_days);
        let mut cursor = from;
        loop {
            if cursor >= horizon {
                return span_of(cursor, minutes);
            }
            let candidate_end = cursor + Duration::minutes(minutes);
            match next_exclusion(cursor, candidate_end, windows) {
                Some(window) => cursor = window.end,
                None => return span_of(cursor, minutes),
            }
        }
    }
}

fn span_of(start: DateTime<Utc>, minutes: i64) -> Interval {
    Interval {
        start,
        end: start + Duration::minutes(minutes),
    }
}

/// Earliest window projection intersecting `[cursor, candidate_end)`.
fn next_exclusion(
    cursor: DateTime<Utc>,
    candidate_end: DateTime<Utc>,
    windows: &[UnpluggedWindow],
) -> Option<Interval> {
    let mut best: Option<Interval> = None;
    let mut date = cursor.date_naive();
    let last = candidate_end.date_naive();
    loop {
        for window in windows {
            let projected = window.on_date(date);
            if projected.end > cursor && projected.start < candidate_end {
                best = match best {
                    Some(current) if current.start <= projected.start => Some(current),
                    _ => Some(projected),
                };
            }
        }
        if date >= last {
            break;
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    best
}
