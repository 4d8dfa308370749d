//! Wall-clock time arithmetic.
//!
//! Pure helpers shared by the scheduler and the ledger:
//! - `WallTime`: an "HH:mm" time of day with a total ordering
//! - `Interval`: a half-open `[start, end)` span of absolute time
//! - `subtract_exclusions`: carve exclusion windows out of a candidate span

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A time of day in minutes, parsed from and rendered as "HH:mm".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WallTime {
    minutes_from_midnight: u16,
}

impl WallTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self {
            minutes_from_midnight: (hour * 60 + minute) as u16,
        })
    }

    /// Parse an "HH:mm" string. Accepts a single-digit hour ("9:30").
    pub fn parse(s: &str) -> Option<Self> {
        let (hour_part, minute_part) = s.split_once(':')?;
        let hour: u32 = hour_part.trim().parse().ok()?;
        let minute: u32 = minute_part.trim().parse().ok()?;
        Self::new(hour, minute)
    }

    pub fn hour(&self) -> u32 {
        (self.minutes_from_midnight / 60) as u32
    }

    pub fn minute(&self) -> u32 {
        (self.minutes_from_midnight % 60) as u32
    }

    pub fn minutes_from_midnight(&self) -> i64 {
        self.minutes_from_midnight as i64
    }

    /// The absolute instant this time of day falls on for `date`.
    pub fn on_date(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(NaiveTime::MIN).and_utc()
            + Duration::minutes(self.minutes_from_midnight as i64)
    }
}

impl fmt::Display for WallTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl TryFrom<String> for WallTime {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        WallTime::parse(&value).ok_or_else(|| format!("invalid HH:mm time: '{value}'"))
    }
}

impl From<WallTime> for String {
    fn from(value: WallTime) -> Self {
        value.to_string()
    }
}

/// A half-open span of absolute time. Always non-empty: `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    /// Returns `None` for empty or inverted spans.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        if end <= start {
            return None;
        }
        Some(Self { start, end })
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

/// Add a signed number of minutes to an instant.
pub fn add_minutes(at: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    at + Duration::minutes(minutes)
}

/// Whole minutes between two instants, truncated toward zero.
pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_minutes()
}

/// Subtract exclusion windows from a candidate span.
///
/// Returns the free sub-intervals in chronological order, dropping any
/// zero-length remainder. An empty candidate (`end <= start`) yields an
/// empty list rather than an error.
pub fn subtract_exclusions(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclusions: &[Interval],
) -> Vec<Interval> {
    let mut free = Vec::new();
    if end <= start {
        return free;
    }

    let mut sorted: Vec<Interval> = exclusions
        .iter()
        .copied()
        .filter(|e| e.start < end && e.end > start)
        .collect();
    sorted.sort_by_key(|e| e.start);

    let mut cursor = start;
    for exclusion in sorted {
        if exclusion.end <= cursor {
            continue;
        }
        if exclusion.start > cursor {
            if let Some(span) = Interval::new(cursor, exclusion.start.min(end)) {
                free.push(span);
            }
        }
        cursor = cursor.max(exclusion.end);
        if cursor >= end {
            return free;
        }
    }

    if let Some(span) = Interval::new(cursor, end) {
        free.push(span);
    }
    free
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
        WallTime::new(hour, minute).unwrap().on_date(date)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 13).unwrap()
    }

    #[test]
    fn wall_time_parses_and_formats() {
        let t = WallTime::parse("09:30").unwrap();
        assert_eq!(t.hour(), 9);
        assert_eq!(t.minute(), 30);
        assert_eq!(t.to_string(), "09:30");

        assert_eq!(WallTime::parse("9:05"), WallTime::new(9, 5));
        assert!(WallTime::parse("24:00").is_none());
        assert!(WallTime::parse("12:60").is_none());
        assert!(WallTime::parse("noon").is_none());
    }

    #[test]
    fn wall_time_orders_by_time_of_day() {
        let early = WallTime::parse("08:15").unwrap();
        let late = WallTime::parse("17:00").unwrap();
        assert!(early < late);
    }

    #[test]
    fn wall_time_serde_round_trip() {
        let t = WallTime::parse("14:45").unwrap();
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"14:45\"");
        let decoded: WallTime = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, t);
    }

    #[test]
    fn interval_rejects_empty_spans() {
        let start = at(day(), 10, 0);
        assert!(Interval::new(start, start).is_none());
        assert!(Interval::new(start, start - Duration::minutes(5)).is_none());
        assert_eq!(
            Interval::new(start, start + Duration::minutes(5))
                .unwrap()
                .duration_minutes(),
            5
        );
    }

    #[test]
    fn subtract_nothing_returns_whole_span() {
        let free = subtract_exclusions(at(day(), 9, 0), at(day(), 10, 0), &[]);
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].duration_minutes(), 60);
    }

    #[test]
    fn subtract_middle_window_splits_span() {
        let window = Interval::new(at(day(), 14, 30), at(day(), 15, 0)).unwrap();
        let free = subtract_exclusions(at(day(), 14, 0), at(day(), 16, 0), &[window]);

        assert_eq!(free.len(), 2);
        assert_eq!(free[0].start, at(day(), 14, 0));
        assert_eq!(free[0].end, at(day(), 14, 30));
        assert_eq!(free[1].start, at(day(), 15, 0));
        assert_eq!(free[1].end, at(day(), 16, 0));
    }

    #[test]
    fn subtract_window_covering_start_pushes_cursor() {
        let window = Interval::new(at(day(), 8, 0), at(day(), 9, 30)).unwrap();
        let free = subtract_exclusions(at(day(), 9, 0), at(day(), 10, 0), &[window]);

        assert_eq!(free.len(), 1);
        assert_eq!(free[0].start, at(day(), 9, 30));
    }

    #[test]
    fn subtract_overlapping_windows_merge() {
        let first = Interval::new(at(day(), 10, 0), at(day(), 11, 0)).unwrap();
        let second = Interval::new(at(day(), 10, 30), at(day(), 11, 30)).unwrap();
        let free = subtract_exclusions(at(day(), 9, 0), at(day(), 12, 0), &[second, first]);

        assert_eq!(free.len(), 2);
        assert_eq!(free[0].end, at(day(), 10, 0));
        assert_eq!(free[1].start, at(day(), 11, 30));
    }

    #[test]
    fn subtract_window_swallowing_span_yields_nothing() {
        let window = Interval::new(at(day(), 9, 0), at(day(), 18, 0)).unwrap();
        let free = subtract_exclusions(at(day(), 10, 0), at(day(), 11, 0), &[window]);
        assert!(free.is_empty());
    }

    #[test]
    fn empty_candidate_yields_empty_list() {
        let start = at(day(), 10, 0);
        assert!(subtract_exclusions(start, start, &[]).is_empty());
    }
}
