//! Calendar bucketing for aggregation keys
//!
//! Converts an instant into the key of the calendar bucket that contains it,
//! in a caller-supplied timezone, and enumerates the dense sequence of bucket
//! keys covering a range. All arithmetic happens on local calendar dates, so
//! DST transitions never shift a bucket boundary.
//!
//! Key formats:
//! - day: `YYYY-MM-DD`
//! - week: `YYYY-MM-DD` of the first day of the week
//! - month: `YYYY-MM`
//! - year: `YYYY`
//!
//! Weeks are anchored at the start of the week containing "now" and step in
//! whole seven-day blocks forward and backward from that anchor.
//!
//! # Examples
//!
//! ```
//! use timestat_core::calendar::{Calendar, CalendarUnit};
//! use timestat_core::types::WeekStart;
//! use chrono::{TimeZone, Utc};
//!
//! let now = Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap();
//! let calendar = Calendar::new(chrono_tz::Europe::Vienna, WeekStart::MONDAY, now);
//!
//! let ts = Utc.with_ymd_and_hms(2024, 1, 1, 23, 30, 0).unwrap();
//! assert_eq!(calendar.bucket_key(ts, CalendarUnit::Day), "2024-01-02");
//! assert_eq!(calendar.bucket_key(ts, CalendarUnit::Week), "2024-01-01");
//! ```

use crate::aggregation_types::Dimension;
use crate::error::{Result, TimestatError};
use crate::types::{TimeEntry, WeekStart};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Fixed-width calendar step behind a temporal dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarUnit {
    Day,
    Week,
    Month,
    Year,
}

impl CalendarUnit {
    /// `strftime` pattern of a bucket key
    fn key_format(&self) -> &'static str {
        match self {
            Self::Day | Self::Week => "%Y-%m-%d",
            Self::Month => "%Y-%m",
            Self::Year => "%Y",
        }
    }

    /// Format the first day of a bucket as its key
    pub fn format_key(&self, bucket_start: NaiveDate) -> String {
        bucket_start.format(self.key_format()).to_string()
    }
}

/// Bucketing context: timezone, week convention and the reference "now"
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calendar {
    tz: Tz,
    week_start: WeekStart,
    now: DateTime<Utc>,
}

impl Calendar {
    pub fn new(tz: Tz, week_start: WeekStart, now: DateTime<Utc>) -> Self {
        Self {
            tz,
            week_start,
            now,
        }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn week_start(&self) -> WeekStart {
        self.week_start
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Calendar date of an instant in the configured timezone
    pub fn local_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.tz).date_naive()
    }

    /// First day of the week containing "now"
    pub fn week_anchor(&self) -> NaiveDate {
        let today = self.local_date(self.now);
        let offset = (7 + today.weekday().num_days_from_sunday() - u32::from(self.week_start.index())) % 7;
        today - Duration::days(i64::from(offset))
    }

    /// First local day of the bucket of `unit` containing `date`
    pub fn bucket_start_of_date(&self, date: NaiveDate, unit: CalendarUnit) -> NaiveDate {
        match unit {
            CalendarUnit::Day => date,
            CalendarUnit::Week => {
                let anchor = self.week_anchor();
                let weeks = (date - anchor).num_days().div_euclid(7);
                anchor + Duration::days(weeks * 7)
            }
            CalendarUnit::Month => date.with_day(1).unwrap_or(date),
            CalendarUnit::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
        }
    }

    /// First local day of the bucket of `unit` containing `ts`
    pub fn bucket_start(&self, ts: DateTime<Utc>, unit: CalendarUnit) -> NaiveDate {
        self.bucket_start_of_date(self.local_date(ts), unit)
    }

    /// Key of the bucket of `unit` containing `ts`
    pub fn bucket_key(&self, ts: DateTime<Utc>, unit: CalendarUnit) -> String {
        unit.format_key(self.bucket_start(ts, unit))
    }

    /// Grouping key of an entry for any dimension
    ///
    /// Temporal dimensions bucket the entry's start instant; categorical ones
    /// read the association directly. `None` means the entry has no value for
    /// the dimension.
    pub fn dimension_key(&self, entry: &TimeEntry, dimension: Dimension) -> Option<String> {
        match dimension.calendar_unit() {
            Some(unit) => Some(self.bucket_key(entry.start, unit)),
            None => categorical_key(entry, dimension),
        }
    }

    /// Ordered bucket keys covering `[start, end)`
    ///
    /// The first key is the bucket containing `start`, aligned down to the
    /// unit boundary; the last is the bucket containing the final instant
    /// before `end`. An empty range yields no keys.
    ///
    /// # Errors
    ///
    /// Returns [`TimestatError::InvalidRange`] when `start > end` and
    /// [`TimestatError::NonTemporalDimension`] for categorical dimensions.
    pub fn expected_keys(
        &self,
        dimension: Dimension,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let unit = dimension
            .calendar_unit()
            .ok_or(TimestatError::NonTemporalDimension(dimension))?;
        if start > end {
            return Err(TimestatError::InvalidRange { start, end });
        }
        if start == end {
            return Ok(Vec::new());
        }

        let last = self.bucket_start(end - Duration::nanoseconds(1), unit);
        let mut cursor = self.bucket_start(start, unit);
        let mut keys = Vec::new();
        while cursor <= last {
            keys.push(unit.format_key(cursor));
            cursor = match next_bucket(cursor, unit) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(keys)
    }
}

/// First day of the bucket following the one starting at `bucket_start`
fn next_bucket(bucket_start: NaiveDate, unit: CalendarUnit) -> Option<NaiveDate> {
    match unit {
        CalendarUnit::Day => bucket_start.succ_opt(),
        CalendarUnit::Week => bucket_start.checked_add_signed(Duration::days(7)),
        CalendarUnit::Month => bucket_start.checked_add_months(chrono::Months::new(1)),
        CalendarUnit::Year => NaiveDate::from_ymd_opt(bucket_start.year() + 1, 1, 1),
    }
}

/// Key of a categorical dimension, read straight off the entry
fn categorical_key(entry: &TimeEntry, dimension: Dimension) -> Option<String> {
    match dimension {
        Dimension::User => Some(entry.user_id.to_string()),
        Dimension::Project => entry.project_id.map(|id| id.to_string()),
        Dimension::Task => entry.task_id.map(|id| id.to_string()),
        Dimension::Client => entry.client_id.map(|id| id.to_string()),
        Dimension::Billable => Some(if entry.billable { "1" } else { "0" }.to_string()),
        Dimension::Day | Dimension::Week | Dimension::Month | Dimension::Year => None,
    }
}
