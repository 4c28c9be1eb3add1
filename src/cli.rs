//! CLI interface for timestat
//!
//! This module defines the command-line interface using clap.
//!
//! # Example
//!
//! ```bash
//! # Hours and cost per week and project for January, including empty weeks
//! timestat --data timesheet.json aggregate --group week --sub-group project \
//!     --start 2024-01-01 --end 2024-02-01 --fill-gaps
//!
//! # Billable time without a project, as JSON
//! timestat aggregate --group user --billable true --project none --json
//!
//! # Re-resolve stored rates after a project rate change and save them
//! timestat rates --apply-scope project:7d3c... --write
//! ```

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};
use std::hash::Hash;
use std::path::PathBuf;
use std::str::FromStr;
use timestat_core::aggregation_types::Dimension;
use timestat_core::error::{Result, TimestatError};
use timestat_core::filters::{IdFilter, TimeEntryFilter};
use timestat_core::types::{
    ClientId, DurationRounding, OrganizationId, ProjectId, RateMode, RoundingMode, TagId, TaskId,
    UserId, WeekStart,
};
use timestat_rates::RateUpdateScope;

/// Aggregate tracked time and billable cost
#[derive(Parser, Debug, Clone)]
#[command(name = "timestat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Dataset file with organizations, projects, members and time entries
    #[arg(long, short = 'd', env = "TIMESTAT_DATA", global = true)]
    pub data: Option<PathBuf>,

    /// Show informational output (default shows only warnings and errors)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Suppress everything below warnings, even when RUST_LOG is set
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Calendar settings shared by all commands
    #[command(flatten)]
    pub calendar: CalendarArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Timezone and week convention for calendar buckets and date arguments
#[derive(Args, Debug, Clone)]
pub struct CalendarArgs {
    /// Timezone for date grouping (e.g. "Europe/Vienna", "America/New_York", "UTC")
    /// If not specified, uses TZ or the system's local timezone
    #[arg(long, short = 'z', global = true)]
    pub timezone: Option<String>,

    /// Use UTC for date grouping (overrides --timezone)
    #[arg(long, global = true)]
    pub utc: bool,

    /// First day of the week: a weekday name or 0-6 with 0 = Sunday
    #[arg(long, default_value = "monday", global = true)]
    pub week_start: WeekStart,
}

/// Entry predicates shared by all commands
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only entries starting at or after this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub start: Option<String>,

    /// Only entries starting before this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub end: Option<String>,

    /// Restrict to one organization
    #[arg(long)]
    pub organization: Option<OrganizationId>,

    /// Restrict to one user
    #[arg(long)]
    pub user: Option<UserId>,

    /// Restrict to a set of members (repeatable)
    #[arg(long = "member")]
    pub members: Vec<UserId>,

    /// Project ids, or "none" for entries without a project (repeatable)
    #[arg(long = "project")]
    pub projects: Vec<String>,

    /// Client ids, or "none" for entries without a client (repeatable)
    #[arg(long = "client")]
    pub clients: Vec<String>,

    /// Task ids, or "none" for entries without a task (repeatable)
    #[arg(long = "task")]
    pub tasks: Vec<String>,

    /// Tag ids; an entry matches when it carries any of them (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Only billable (true) or non-billable (false) entries
    #[arg(long)]
    pub billable: Option<bool>,

    /// Only running (true) or finished (false) entries
    #[arg(long)]
    pub active: Option<bool>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sum tracked time and cost, optionally grouped by one or two dimensions
    Aggregate {
        /// Primary grouping (day, week, month, year, user, project, task, client, billable)
        #[arg(long, short = 'g')]
        group: Option<Dimension>,

        /// Secondary grouping inside each primary bucket
        #[arg(long, short = 's')]
        sub_group: Option<Dimension>,

        /// Emit zero buckets for calendar slots without entries (needs --start and --end)
        #[arg(long)]
        fill_gaps: bool,

        /// Which rate prices billable entries
        #[arg(long, default_value = "auto")]
        mode: RateMode,

        /// Round each entry's duration (up, down, nearest)
        #[arg(long)]
        round: Option<RoundingMode>,

        /// Rounding interval in minutes
        #[arg(long, default_value = "0")]
        round_minutes: u32,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Show the resolved billable rate of each entry
    Rates {
        /// Only re-resolve entries affected by a rate change at this scope:
        /// organization:ID, member:USER:ORG, project:ID or project-member:USER:PROJECT
        #[arg(long, value_parser = parse_update_scope)]
        apply_scope: Option<RateUpdateScope>,

        /// Store the resolved rates on the entries and save the dataset
        #[arg(long)]
        write: bool,

        #[command(flatten)]
        filters: FilterArgs,
    },
}

impl Command {
    pub fn filters(&self) -> &FilterArgs {
        match self {
            Command::Aggregate { filters, .. } | Command::Rates { filters, .. } => filters,
        }
    }
}

impl FilterArgs {
    /// Build the entry filter, reading dates in `tz`
    pub fn to_filter(&self, tz: Tz) -> Result<TimeEntryFilter> {
        let mut filter = TimeEntryFilter::new();

        if let Some(start) = &self.start {
            filter = filter.with_start(parse_instant(start, tz)?);
        }
        if let Some(end) = &self.end {
            filter = filter.with_end(parse_instant(end, tz)?);
        }
        if let Some(organization) = self.organization {
            filter = filter.with_organization(organization);
        }
        if let Some(user) = self.user {
            filter = filter.with_user(user);
        }
        if !self.members.is_empty() {
            filter = filter.with_members(self.members.iter().copied());
        }
        if !self.projects.is_empty() {
            filter = filter.with_projects(parse_id_filter::<ProjectId>(&self.projects)?);
        }
        if !self.clients.is_empty() {
            filter = filter.with_clients(parse_id_filter::<ClientId>(&self.clients)?);
        }
        if !self.tasks.is_empty() {
            filter = filter.with_tasks(parse_id_filter::<TaskId>(&self.tasks)?);
        }
        if !self.tags.is_empty() {
            filter = filter.with_tags(parse_id_filter::<TagId>(&self.tags)?);
        }
        if let Some(billable) = self.billable {
            filter = filter.with_billable(billable);
        }
        if let Some(active) = self.active {
            filter = filter.with_active(active);
        }

        Ok(filter)
    }
}

/// Rounding settings from the aggregate flags
pub fn rounding_from_args(round: Option<RoundingMode>, minutes: u32) -> Option<DurationRounding> {
    round
        .filter(|_| minutes > 0)
        .map(|mode| DurationRounding::new(mode, minutes))
}

/// Parse a date argument into an instant
///
/// Plain dates are local midnight in `tz`; RFC 3339 timestamps are taken
/// as-is.
pub fn parse_instant(value: &str, tz: Tz) -> Result<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        TimestatError::InvalidDate(format!(
            "Invalid date '{value}', expected YYYY-MM-DD or an RFC 3339 timestamp"
        ))
    })?;
    let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| {
        TimestatError::InvalidDate(format!("Invalid date '{value}'"))
    })?;

    // A DST jump can skip midnight; the day then starts at its first valid minute.
    (0..MINUTES_PER_DAY)
        .find_map(|minute| {
            tz.from_local_datetime(&(midnight + Duration::minutes(minute)))
                .earliest()
        })
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| {
            TimestatError::InvalidDate(format!("{value} has no local time in {tz}"))
        })
}

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Parse id arguments, treating "none" as "no association"
fn parse_id_filter<T>(values: &[String]) -> Result<IdFilter<T>>
where
    T: FromStr + Eq + Hash + Copy,
    T::Err: std::fmt::Display,
{
    let mut ids = Vec::with_capacity(values.len());
    let mut include_none = false;

    for value in values {
        if value.eq_ignore_ascii_case("none") {
            include_none = true;
            continue;
        }
        let id = value
            .parse::<T>()
            .map_err(|e| TimestatError::InvalidArgument(format!("Invalid id '{value}': {e}")))?;
        ids.push(id);
    }

    let filter = IdFilter::new(ids);
    Ok(if include_none {
        filter.with_none()
    } else {
        filter
    })
}

/// Parse `kind:id[:id]` into a rate update scope
pub fn parse_update_scope(value: &str) -> std::result::Result<RateUpdateScope, String> {
    fn id<T: FromStr>(raw: &str) -> std::result::Result<T, String> {
        raw.parse::<T>().map_err(|_| format!("invalid id '{raw}'"))
    }

    let parts: Vec<&str> = value.split(':').collect();
    match parts.as_slice() {
        ["organization", organization] => Ok(RateUpdateScope::Organization(id(organization)?)),
        ["member", user, organization] => Ok(RateUpdateScope::OrganizationMember {
            user: id(user)?,
            organization: id(organization)?,
        }),
        ["project", project] => Ok(RateUpdateScope::Project(id(project)?)),
        ["project-member", user, project] => Ok(RateUpdateScope::ProjectMember {
            user: id(user)?,
            project: id(project)?,
        }),
        _ => Err(format!(
            "invalid scope '{value}', expected organization:ID, member:USER:ORG, \
             project:ID or project-member:USER:PROJECT"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_aggregate_parsing() {
        let cli = Cli::try_parse_from([
            "timestat",
            "--data",
            "sheet.json",
            "aggregate",
            "--group",
            "week",
            "--sub-group",
            "Project",
            "--fill-gaps",
            "--start",
            "2024-01-01",
            "--end",
            "2024-02-01",
            "--week-start",
            "0",
        ])
        .unwrap();

        assert_eq!(cli.data, Some(PathBuf::from("sheet.json")));
        assert_eq!(cli.calendar.week_start, WeekStart::SUNDAY);
        match cli.command {
            Command::Aggregate {
                group,
                sub_group,
                fill_gaps,
                mode,
                ..
            } => {
                assert_eq!(group, Some(Dimension::Week));
                assert_eq!(sub_group, Some(Dimension::Project));
                assert!(fill_gaps);
                assert_eq!(mode, RateMode::Auto);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_unknown_dimension_rejected() {
        assert!(Cli::try_parse_from(["timestat", "aggregate", "--group", "hour"]).is_err());
    }

    #[test]
    fn test_parse_instant() {
        let vienna: Tz = "Europe/Vienna".parse().unwrap();
        assert_eq!(
            parse_instant("2024-01-01", vienna).unwrap(),
            Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap()
        );
        assert_eq!(
            parse_instant("2024-01-01T12:00:00+02:00", vienna).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
        );
        assert!(matches!(
            parse_instant("01/02/2024", Tz::UTC),
            Err(TimestatError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_parse_instant_when_dst_skips_midnight() {
        // Clocks in Santiago jump from 00:00 to 01:00 on 2024-09-08.
        let santiago: Tz = "America/Santiago".parse().unwrap();
        let start = parse_instant("2024-09-08", santiago).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 9, 8, 4, 0, 0).unwrap());
        assert_eq!(
            start.with_timezone(&santiago).date_naive(),
            NaiveDate::from_ymd_opt(2024, 9, 8).unwrap()
        );

        assert_eq!(
            parse_instant("2024-09-09", santiago).unwrap(),
            Utc.with_ymd_and_hms(2024, 9, 9, 3, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_none_sentinel_in_id_filters() {
        let project = ProjectId::new_v4();
        let args = FilterArgs {
            projects: vec![project.to_string(), "none".to_string()],
            ..FilterArgs::default()
        };
        let filter = args.to_filter(Tz::UTC).unwrap();
        let projects = filter.project_ids.unwrap();

        assert!(projects.matches(Some(project)));
        assert!(projects.matches(None));
        assert!(!projects.matches(Some(ProjectId::new_v4())));
    }

    #[test]
    fn test_invalid_id_rejected() {
        let args = FilterArgs {
            tasks: vec!["not-a-uuid".to_string()],
            ..FilterArgs::default()
        };
        assert!(matches!(
            args.to_filter(Tz::UTC),
            Err(TimestatError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_parse_update_scope() {
        let user = UserId::new_v4();
        let project = ProjectId::new_v4();

        assert_eq!(
            parse_update_scope(&format!("project-member:{user}:{project}")).unwrap(),
            RateUpdateScope::ProjectMember { user, project }
        );
        assert_eq!(
            parse_update_scope(&format!("project:{project}")).unwrap(),
            RateUpdateScope::Project(project)
        );
        assert!(parse_update_scope("team:123").is_err());
        assert!(parse_update_scope("project:nope").is_err());
    }

    #[test]
    fn test_rounding_disabled_without_minutes() {
        assert!(rounding_from_args(Some(RoundingMode::Up), 0).is_none());
        assert!(rounding_from_args(None, 15).is_none());
        assert_eq!(
            rounding_from_args(Some(RoundingMode::Nearest), 15),
            Some(DurationRounding::new(RoundingMode::Nearest, 15))
        );
    }
}
