//! timestat - Time entry aggregation and billable rate resolution
//!
//! This library provides functionality to:
//! - Resolve the billable rate of time entries through the project member,
//!   project, organization member and organization scopes
//! - Sum tracked time and cost, grouped by up to two calendar or categorical
//!   dimensions
//! - Fill calendar gaps so charts get one bucket per day, week, month or year
//! - Load timesheet datasets from JSON and render results as tables or JSON
//!
//! # Examples
//!
//! ```no_run
//! use timestat::{
//!     aggregation::{AggregationRequest, Aggregator},
//!     cost_calculator::CostCalculator,
//!     data_loader::DataLoader,
//!     provider::RateScopeSource,
//!     rate_table::RateTable,
//!     types::RateMode,
//!     Dimension,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> timestat::Result<()> {
//!     let loader = DataLoader::open("timesheet.json").await?;
//!     let rates = RateTable::from_scopes(&loader.load_rate_scopes(None).await?);
//!     let calculator = Arc::new(CostCalculator::new(Arc::new(rates), RateMode::Auto));
//!     let aggregator = Aggregator::new(calculator);
//!
//!     let request = AggregationRequest::new().with_group(Dimension::Month);
//!     let by_month = aggregator.aggregate_from(&loader, &request).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod aggregation;
pub mod cli;
pub mod data_loader;
pub mod gap_fill;
pub mod output;

// Re-export from the workspace crates
pub use timestat_core::{aggregation_types, calendar, error, filters, provider, timezone, types};
pub use timestat_rates::{cost_calculator, rate_resolver, rate_table};

// Re-export commonly used types
pub use timestat_core::{
    AggregationResult, BillableRate, Dimension, GroupNode, LeafNode, RateMode, Result,
    TimeEntry, TimestatError, WeekStart,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
