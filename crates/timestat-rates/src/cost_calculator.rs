//! Cost calculator module for computing the cost of tracked time
//!
//! Costs are integers in the smallest currency unit. One entry costs
//! `round(seconds * rate_per_hour / 3600)`, rounding halves up, so summing
//! many entries never accumulates floating point drift.
//!
//! # Examples
//!
//! ```
//! use timestat_rates::{CostCalculator, RateTable};
//! use timestat_core::types::{BillableRate, RateMode};
//! use std::sync::Arc;
//!
//! let calculator = CostCalculator::new(Arc::new(RateTable::new()), RateMode::Auto);
//!
//! // 90 minutes at 100.00 per hour
//! assert_eq!(CostCalculator::cost_for(5_400, Some(BillableRate::new(10_000))), 15_000);
//! assert_eq!(CostCalculator::cost_for(5_400, None), 0);
//! ```

use crate::rate_resolver::RateResolver;
use crate::rate_table::RateTable;
use std::sync::Arc;
use timestat_core::types::{BillableRate, RateMode, TimeEntry};
use tracing::trace;

const SECONDS_PER_HOUR: u128 = 3_600;

/// Prices tracked time using stored or resolved billable rates
///
/// The rate table is shared read-only, so one calculator can price entries
/// from several threads at once.
#[derive(Debug, Clone)]
pub struct CostCalculator {
    rates: Arc<RateTable>,
    mode: RateMode,
}

impl CostCalculator {
    /// Create a new CostCalculator over a batch-loaded rate table
    pub fn new(rates: Arc<RateTable>, mode: RateMode) -> Self {
        Self { rates, mode }
    }

    pub fn mode(&self) -> RateMode {
        self.mode
    }

    /// Resolver over the shared rate table
    pub fn resolver(&self) -> RateResolver<'_> {
        RateResolver::new(self.rates.as_ref())
    }

    /// Cost of `seconds` at `rate`, rounded half up
    ///
    /// A missing rate costs nothing.
    pub fn cost_for(seconds: u64, rate: Option<BillableRate>) -> u64 {
        let Some(rate) = rate else {
            return 0;
        };
        let scaled = u128::from(seconds) * u128::from(rate.per_hour());
        let cost = (scaled + SECONDS_PER_HOUR / 2) / SECONDS_PER_HOUR;
        u64::try_from(cost).unwrap_or(u64::MAX)
    }

    /// Rate used to price an entry under the configured mode
    ///
    /// Non-billable entries never have a rate, whatever is stored on them.
    pub fn effective_rate(&self, entry: &TimeEntry) -> Option<BillableRate> {
        if !entry.billable {
            return None;
        }
        match self.mode {
            RateMode::Stored => entry.billable_rate,
            RateMode::Resolve => self.resolver().resolve(entry),
            RateMode::Auto => entry
                .billable_rate
                .or_else(|| self.resolver().resolve(entry)),
        }
    }

    /// Cost of an entry whose (possibly rounded) duration is `seconds`
    pub fn entry_cost(&self, entry: &TimeEntry, seconds: u64) -> u64 {
        let rate = self.effective_rate(entry);
        let cost = Self::cost_for(seconds, rate);
        trace!(entry = %entry.id, seconds, ?rate, cost, "Priced time entry");
        cost
    }
}
