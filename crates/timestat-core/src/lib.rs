//! Core types, traits, and utilities for timestat
//!
//! This crate provides the foundational types, error handling,
//! timezone configuration, calendar bucketing, filters, and the
//! aggregation result tree used by all other timestat crates.

pub mod aggregation_types;
pub mod calendar;
pub mod error;
pub mod filters;
pub mod provider;
pub mod timezone;
pub mod types;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use aggregation_types::{AggregationResult, Dimension, GroupNode, LeafNode};
pub use error::{Result, TimestatError};
pub use types::{
    BillableRate, ClientId, OrganizationId, ProjectId, RateMode, TagId, TaskId, TimeEntry, UserId,
    WeekStart,
};
