//! Billable rate resolution and cost calculation for timestat
//!
//! This crate resolves which hourly rate applies to a time entry by walking
//! the project-member, project, organization-member and organization scopes
//! in that order, and turns durations into integer costs.

pub mod cost_calculator;
pub mod rate_resolver;
pub mod rate_table;

pub use cost_calculator::CostCalculator;
pub use rate_resolver::{RateResolver, RateScope, RateUpdateScope};
pub use rate_table::{RateScopeReader, RateTable};
