//! Translation between the display zone (KST, where dates are picked and
//! timestamps are read) and the query zone (UTC, what Swarm filters on).
//!
//! The offset is a fixed number of hours. No timezone database, no DST.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::{Error, Result};

/// Hours the display zone is ahead of the query zone (KST = UTC+9).
pub const DISPLAY_OFFSET_HOURS: i64 = 9;

const DAY_FMT: &str = "%Y/%m/%d";
const DISPLAY_INSTANT_FMT: &str = "%Y-%m-%d %p %I:%M";

/// Fixed offset between the display zone and the query zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneOffsets {
    display_ahead: Duration,
}

impl Default for ZoneOffsets {
    fn default() -> Self {
        Self::from_hours(DISPLAY_OFFSET_HOURS)
    }
}

impl ZoneOffsets {
    pub fn from_hours(hours: i64) -> Self {
        Self {
            display_ahead: Duration::hours(hours),
        }
    }

    pub fn to_query(&self, display: NaiveDateTime) -> NaiveDateTime {
        display - self.display_ahead
    }

    pub fn to_display(&self, query: NaiveDateTime) -> NaiveDateTime {
        query + self.display_ahead
    }

    /// Renders a query-zone instant as a display-zone 12-hour timestamp,
    /// e.g. `"2025-03-20T07:18:00"` -> `"2025-03-20 PM 04:18"`.
    /// Anything unparsable renders as an empty string.
    pub fn query_to_display(&self, query_instant: &str) -> String {
        parse_instant(query_instant)
            .map(|dt| self.to_display(dt).format(DISPLAY_INSTANT_FMT).to_string())
            .unwrap_or_default()
    }
}

/// Shorthand for [`ZoneOffsets::query_to_display`] with the default offset.
pub fn query_to_display(query_instant: &str) -> String {
    ZoneOffsets::default().query_to_display(query_instant)
}

/// Accepts the ISO-like shapes Swarm puts into `title` attributes:
/// `T` or space separator, optional seconds and fraction, optional UTC marker.
fn parse_instant(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    let s = s.strip_suffix('Z').unwrap_or(s);
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Calendar day range picked in the display zone, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidRange {
                start: start.format(DAY_FMT).to_string(),
                end: end.format(DAY_FMT).to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parses both bounds from `YYYY-MM-DD` or `YYYY/MM/DD`.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_day(start)?, parse_day(end)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// `"YYYY/MM/DD ~ YYYY/MM/DD"` in the display zone.
    pub fn display_string(&self) -> String {
        format!(
            "{} ~ {}",
            self.start.format(DAY_FMT),
            self.end.format(DAY_FMT)
        )
    }

    pub fn query_window(&self) -> QueryWindow {
        self.query_window_with(&ZoneOffsets::default())
    }

    /// Shifts each bound's display-zone midnight into the query zone.
    pub fn query_window_with(&self, zones: &ZoneOffsets) -> QueryWindow {
        let midnight = |d: NaiveDate| zones.to_query(d.and_time(NaiveTime::MIN));
        QueryWindow {
            start: midnight(self.start),
            end: midnight(self.end),
        }
    }
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, DAY_FMT))
        .map_err(|_| Error::InvalidDate(s.to_string()))
}

/// A [`DateRange`] expressed as query-zone instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl QueryWindow {
    /// Swarm only takes whole days, time of day is dropped here.
    pub fn start_day(&self) -> String {
        self.start.format(DAY_FMT).to_string()
    }

    pub fn end_day(&self) -> String {
        self.end.format(DAY_FMT).to_string()
    }

    /// `"@YYYY/MM/DD,@YYYY/MM/DD"`, the value of Swarm's `range` filter.
    pub fn filter(&self) -> String {
        format!("@{},@{}", self.start_day(), self.end_day())
    }
}

/// Guide shown before a query so the user sees what Swarm is asked for.
pub fn guide_text(range: &DateRange) -> String {
    format!(
        "Selected KST range: {}\nUTC range queried on Swarm: {}\nNote: KST is {} hours ahead of UTC.",
        range.display_string(),
        range.query_window().filter(),
        DISPLAY_OFFSET_HOURS
    )
}
