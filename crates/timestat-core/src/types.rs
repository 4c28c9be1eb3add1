//! Core domain types for timestat
//!
//! This module contains the fundamental types used throughout the timestat library.
//! Identifiers are strongly typed so a project id can never be passed where a
//! task id is expected, and money is always an integer count of the smallest
//! currency unit.

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Wrap an existing UUID
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }

            /// Generate a fresh random identifier
            pub fn new_v4() -> Self {
                Self(Uuid::new_v4())
            }

            /// Get the inner UUID
            pub fn inner(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a user (the member who tracked the time)
    UserId
);
uuid_id!(
    /// Identifier of an organization
    OrganizationId
);
uuid_id!(
    /// Identifier of a project
    ProjectId
);
uuid_id!(
    /// Identifier of a task inside a project
    TaskId
);
uuid_id!(
    /// Identifier of a client owning projects
    ClientId
);
uuid_id!(
    /// Identifier of a tag
    TagId
);
uuid_id!(
    /// Identifier of a time entry
    TimeEntryId
);

/// Hourly billable rate in the smallest currency unit (e.g. cents per hour)
///
/// # Examples
/// ```
/// use timestat_core::types::BillableRate;
///
/// let rate = BillableRate::new(10_000);
/// assert_eq!(rate.per_hour(), 10_000);
/// assert_eq!(rate.to_string(), "10000/h");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BillableRate(u64);

impl BillableRate {
    /// Create a rate from an amount per hour
    pub fn new(per_hour: u64) -> Self {
        Self(per_hour)
    }

    /// Amount charged per hour in the smallest currency unit
    pub fn per_hour(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BillableRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/h", self.0)
    }
}

/// First day of the calendar week used for weekly buckets
///
/// Accepts weekday names (`monday`, `mon`) or the numeric convention
/// 0 = Sunday .. 6 = Saturday when parsed from a string.
///
/// # Examples
/// ```
/// use timestat_core::types::WeekStart;
/// use std::str::FromStr;
///
/// assert_eq!(WeekStart::from_str("0").unwrap(), WeekStart::SUNDAY);
/// assert_eq!(WeekStart::from_str("Monday").unwrap(), WeekStart::default());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeekStart(Weekday);

impl WeekStart {
    pub const SUNDAY: Self = Self(Weekday::Sun);
    pub const MONDAY: Self = Self(Weekday::Mon);

    /// Create from a chrono weekday
    pub fn new(day: Weekday) -> Self {
        Self(day)
    }

    /// Create from the 0 = Sunday .. 6 = Saturday convention
    pub fn from_index(index: u8) -> Option<Self> {
        let day = match index {
            0 => Weekday::Sun,
            1 => Weekday::Mon,
            2 => Weekday::Tue,
            3 => Weekday::Wed,
            4 => Weekday::Thu,
            5 => Weekday::Fri,
            6 => Weekday::Sat,
            _ => return None,
        };
        Some(Self(day))
    }

    /// Index in the 0 = Sunday .. 6 = Saturday convention
    pub fn index(&self) -> u8 {
        self.0.num_days_from_sunday() as u8
    }

    /// Get the inner weekday
    pub fn weekday(&self) -> Weekday {
        self.0
    }
}

impl Default for WeekStart {
    fn default() -> Self {
        Self::MONDAY
    }
}

impl fmt::Display for WeekStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.0 {
            Weekday::Mon => "monday",
            Weekday::Tue => "tuesday",
            Weekday::Wed => "wednesday",
            Weekday::Thu => "thursday",
            Weekday::Fri => "friday",
            Weekday::Sat => "saturday",
            Weekday::Sun => "sunday",
        };
        f.write_str(name)
    }
}

impl FromStr for WeekStart {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(index) = trimmed.parse::<u8>() {
            return Self::from_index(index)
                .ok_or_else(|| format!("Invalid week start: {s} (expected 0-6, 0 = Sunday)"));
        }
        trimmed
            .parse::<Weekday>()
            .map(Self)
            .map_err(|_| format!("Invalid week start: {s}"))
    }
}

impl Serialize for WeekStart {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WeekStart {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A single time-tracking record
///
/// `end == None` means the timer is still running; its duration is measured
/// against the caller-supplied "now" and never stored as infinite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    /// Entry identifier
    pub id: TimeEntryId,
    /// Member who tracked the time
    pub user_id: UserId,
    /// Organization the entry belongs to
    pub organization_id: OrganizationId,
    /// Optional project
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    /// Optional task (always inside the project)
    #[serde(default)]
    pub task_id: Option<TaskId>,
    /// Client of the project, denormalized for grouping and filtering
    #[serde(default)]
    pub client_id: Option<ClientId>,
    /// Start instant
    pub start: DateTime<Utc>,
    /// End instant, `None` while running
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    /// Whether the time is billable
    #[serde(default)]
    pub billable: bool,
    /// Materialized billable rate resolved at write time
    #[serde(default)]
    pub billable_rate: Option<BillableRate>,
    /// Tags attached to the entry
    #[serde(default)]
    pub tags: Vec<TagId>,
    /// Free-form description
    #[serde(default)]
    pub description: String,
}

impl TimeEntry {
    /// Whether the timer is still running
    pub fn is_running(&self) -> bool {
        self.end.is_none()
    }

    /// Whether the end, if any, is not before the start
    pub fn has_valid_range(&self) -> bool {
        self.end.is_none_or(|end| end >= self.start)
    }

    /// End instant, substituting `now` for running entries
    pub fn end_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.end.unwrap_or(now)
    }

    /// Tracked duration in whole seconds, rounded to the nearest second
    ///
    /// Running entries are measured against `now`. A start after the end
    /// (or after `now`) yields zero rather than a negative duration.
    pub fn duration_seconds(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.end_or(now) - self.start).num_milliseconds();
        if millis <= 0 {
            return 0;
        }
        ((millis + 500) / 1000) as u64
    }
}

/// Organization row with its default rate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub billable_rate: Option<BillableRate>,
}

/// Membership of a user in an organization, with an optional rate override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    #[serde(default)]
    pub billable_rate: Option<BillableRate>,
}

/// Project row with its default rate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub organization_id: OrganizationId,
    #[serde(default)]
    pub client_id: Option<ClientId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub billable_rate: Option<BillableRate>,
}

/// Membership of a user in a project, with an optional rate override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMember {
    pub user_id: UserId,
    pub project_id: ProjectId,
    #[serde(default)]
    pub billable_rate: Option<BillableRate>,
}

/// Which rate prices an entry when aggregating cost
///
/// # Examples
/// ```
/// use timestat_core::types::RateMode;
/// use std::str::FromStr;
///
/// assert_eq!(RateMode::from_str("auto").unwrap(), RateMode::Auto);
/// assert_eq!(RateMode::Resolve.to_string(), "resolve");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateMode {
    /// Use the stored rate when present, otherwise resolve the cascade
    #[default]
    Auto,
    /// Use only the rate materialized on the entry
    Stored,
    /// Always resolve the cascade, ignoring the stored rate
    Resolve,
}

impl fmt::Display for RateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Stored => write!(f, "stored"),
            Self::Resolve => write!(f, "resolve"),
        }
    }
}

impl FromStr for RateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "stored" => Ok(Self::Stored),
            "resolve" => Ok(Self::Resolve),
            _ => Err(format!("Invalid rate mode: {s}")),
        }
    }
}

/// Direction used when rounding per-entry durations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundingMode {
    Up,
    Down,
    Nearest,
}

impl FromStr for RoundingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "nearest" => Ok(Self::Nearest),
            _ => Err(format!("Invalid rounding mode: {s}")),
        }
    }
}

/// Per-entry duration rounding to a multiple of `minutes`
///
/// # Examples
/// ```
/// use timestat_core::types::{DurationRounding, RoundingMode};
///
/// let rounding = DurationRounding::new(RoundingMode::Up, 15);
/// assert_eq!(rounding.apply(61), 900);
/// assert_eq!(rounding.apply(0), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationRounding {
    pub mode: RoundingMode,
    pub minutes: u32,
}

impl DurationRounding {
    pub fn new(mode: RoundingMode, minutes: u32) -> Self {
        Self { mode, minutes }
    }

    /// Round a duration in seconds; `minutes == 0` leaves it unchanged
    pub fn apply(&self, seconds: u64) -> u64 {
        let step = u64::from(self.minutes) * 60;
        if step == 0 {
            return seconds;
        }
        let whole = seconds / step;
        let rest = seconds % step;
        let steps = match self.mode {
            RoundingMode::Down => whole,
            RoundingMode::Up if rest > 0 => whole + 1,
            RoundingMode::Up => whole,
            RoundingMode::Nearest if rest * 2 >= step => whole + 1,
            RoundingMode::Nearest => whole,
        };
        steps * step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> TimeEntry {
        TimeEntry {
            id: TimeEntryId::new_v4(),
            user_id: UserId::new_v4(),
            organization_id: OrganizationId::new_v4(),
            project_id: None,
            task_id: None,
            client_id: None,
            start,
            end,
            billable: false,
            billable_rate: None,
            tags: Vec::new(),
            description: String::new(),
        }
    }

    #[test]
    fn test_running_entry_measured_against_now() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 40).unwrap();
        let running = entry(start, None);

        assert!(running.is_running());
        assert_eq!(running.duration_seconds(now), 40);
    }

    #[test]
    fn test_duration_rounds_to_nearest_second() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = start + chrono::Duration::milliseconds(1_500);
        assert_eq!(entry(start, Some(end)).duration_seconds(end), 2);

        let end = start + chrono::Duration::milliseconds(1_499);
        assert_eq!(entry(start, Some(end)).duration_seconds(end), 1);
    }

    #[test]
    fn test_duration_never_negative() {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(entry(start, None).duration_seconds(now), 0);
    }

    #[test]
    fn test_end_before_start_is_an_invalid_range() {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let before = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        assert!(entry(start, None).has_valid_range());
        assert!(entry(start, Some(start)).has_valid_range());
        assert!(!entry(start, Some(before)).has_valid_range());
        assert_eq!(entry(start, Some(before)).duration_seconds(start), 0);
    }

    #[test]
    fn test_week_start_parsing() {
        assert_eq!(WeekStart::from_str("0").unwrap().weekday(), Weekday::Sun);
        assert_eq!(WeekStart::from_str("6").unwrap().weekday(), Weekday::Sat);
        assert_eq!(WeekStart::from_str("tue").unwrap().weekday(), Weekday::Tue);
        assert!(WeekStart::from_str("7").is_err());
        assert!(WeekStart::from_str("someday").is_err());
        assert_eq!(WeekStart::SUNDAY.index(), 0);
        assert_eq!(WeekStart::MONDAY.to_string(), "monday");
    }

    #[test]
    fn test_week_start_serde() {
        let json = serde_json::to_string(&WeekStart::SUNDAY).unwrap();
        assert_eq!(json, "\"sunday\"");
        let parsed: WeekStart = serde_json::from_str("\"3\"").unwrap();
        assert_eq!(parsed.weekday(), Weekday::Wed);
    }

    #[test]
    fn test_duration_rounding_modes() {
        let down = DurationRounding::new(RoundingMode::Down, 15);
        let nearest = DurationRounding::new(RoundingMode::Nearest, 15);
        let off = DurationRounding::new(RoundingMode::Up, 0);

        assert_eq!(down.apply(1_799), 900);
        assert_eq!(nearest.apply(449), 0);
        assert_eq!(nearest.apply(450), 900);
        assert_eq!(off.apply(1_234), 1_234);
    }

    #[test]
    fn test_ids_display_as_uuid() {
        let raw = "550e8400-e29b-41d4-a716-446655440000";
        let project = ProjectId::from_str(raw).unwrap();
        assert_eq!(project.to_string(), raw);
        assert_eq!(serde_json::to_string(&project).unwrap(), format!("\"{raw}\""));
    }
}
