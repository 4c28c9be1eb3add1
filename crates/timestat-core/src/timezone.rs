//! Timezone utilities for calendar bucketing
//!
//! This module resolves the timezone used to turn instants into calendar
//! buckets, from explicit user input, the `TZ` environment variable, or the
//! system's local zone.

use chrono_tz::Tz;
use std::str::FromStr;
use tracing::debug;

use crate::error::{Result, TimestatError};

/// Zone in which calendar buckets and plain-date arguments are read
#[derive(Debug, Clone, PartialEq)]
pub struct TimezoneConfig {
    pub tz: Tz,
    /// Set when the zone is UTC, so headers print "UTC" instead of a zone name
    pub is_utc: bool,
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        Self::from_tz(get_local_timezone())
    }
}

impl TimezoneConfig {
    /// Wrap an already parsed timezone
    pub fn from_tz(tz: Tz) -> Self {
        Self {
            is_utc: tz == Tz::UTC,
            tz,
        }
    }

    /// UTC configuration
    pub fn utc() -> Self {
        Self::from_tz(Tz::UTC)
    }

    /// Parse an IANA timezone identifier such as `Europe/Vienna`
    pub fn parse(name: &str) -> Result<Self> {
        Tz::from_str(name).map(Self::from_tz).map_err(|_| {
            TimestatError::InvalidTimezone(format!(
                "'{name}'. Use an IANA name such as 'Europe/Vienna' or 'UTC'"
            ))
        })
    }

    /// Resolve the `--timezone` and `--utc` flags
    ///
    /// `--utc` wins over a named zone; with neither flag the local zone is
    /// detected.
    pub fn from_cli(name: Option<&str>, use_utc: bool) -> Result<Self> {
        if use_utc {
            return Ok(Self::utc());
        }
        name.map_or_else(|| Ok(Self::default()), Self::parse)
    }

    /// Name shown in log lines and report headers
    pub fn display_name(&self) -> &str {
        if self.is_utc { "UTC" } else { self.tz.name() }
    }
}

/// Detect the zone used when none is given on the command line
///
/// Order: the `TZ` environment variable, the system zone reported by
/// `iana-time-zone`, then UTC. Unparseable values fall through to the next
/// source.
pub fn get_local_timezone() -> Tz {
    let from_env = std::env::var("TZ").ok().and_then(|name| parse_zone(&name, "TZ"));
    if let Some(tz) = from_env {
        return tz;
    }

    let from_system = match iana_time_zone::get_timezone() {
        Ok(name) => parse_zone(&name, "iana-time-zone"),
        Err(error) => {
            debug!(%error, "System timezone detection failed");
            None
        }
    };
    from_system.unwrap_or_else(|| {
        debug!("Falling back to UTC for calendar buckets");
        Tz::UTC
    })
}

fn parse_zone(name: &str, source: &'static str) -> Option<Tz> {
    match Tz::from_str(name) {
        Ok(tz) => {
            debug!(zone = name, source, "Detected local timezone");
            Some(tz)
        }
        Err(_) => {
            debug!(zone = name, source, "Ignoring unknown timezone name");
            None
        }
    }
}
