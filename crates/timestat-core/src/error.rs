//! Error types for timestat
//!
//! This module defines the error types used throughout the timestat library.
//! All errors are derived from `thiserror` for convenient error handling
//! and automatic `From` implementations.
//!
//! Precondition violations (bad ranges, unsupported groupings) are reported
//! before any entry is read, so a caller never sees a half-summed result.
//!
//! # Example
//!
//! ```
//! use timestat_core::error::{TimestatError, Result};
//!
//! fn example_function() -> Result<()> {
//!     // This will automatically convert io::Error to TimestatError
//!     let _file = std::fs::read_to_string("nonexistent.json")?;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

use crate::aggregation_types::Dimension;

/// Main error type for timestat operations
#[derive(Error, Debug)]
pub enum TimestatError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid date format
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Invalid timezone
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// Invalid week start day
    #[error("Invalid week start: {0}")]
    InvalidWeekStart(String),

    /// Unknown grouping dimension
    #[error("Invalid grouping dimension: {0}")]
    InvalidDimension(String),

    /// Range start lies after range end
    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange {
        /// Requested range start
        start: chrono::DateTime<chrono::Utc>,
        /// Requested range end
        end: chrono::DateTime<chrono::Utc>,
    },

    /// Gap filling was requested without a range to fill
    #[error("Gap filling requires both a range start and a range end")]
    MissingRange,

    /// Calendar slots can only be generated for temporal dimensions
    #[error("Cannot generate calendar slots for non-temporal dimension '{0}'")]
    NonTemporalDimension(Dimension),

    /// Grouping combination that the engine does not support
    #[error("Unsupported grouping: {0}")]
    UnsupportedGrouping(String),

    /// Parse error with file context
    #[error("Parse error in {file}: {error}")]
    Parse {
        /// The file that caused the error
        file: PathBuf,
        /// The error message
        error: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A seconds or cost total does not fit in 64 bits
    #[error("Total {0} overflowed while summing time entries")]
    TotalOverflow(&'static str),
}

/// Convenience type alias for Results in timestat
///
/// # Example
///
/// ```
/// use timestat_core::Result;
///
/// fn process_data() -> Result<String> {
///     Ok("Processed successfully".to_string())
/// }
/// ```
pub type Result<T> = std::result::Result<T, TimestatError>;
