//! Aggregation module for summarizing time entries
//!
//! This module turns a filtered set of time entries into a two-level tree of
//! duration and cost totals. The first level groups by the request's primary
//! dimension, the second (optional) level groups each first-level bucket by a
//! secondary dimension. Temporal dimensions bucket by calendar date in the
//! request's timezone; categorical ones group by the entry's association.
//!
//! # Numeric semantics
//!
//! - Each entry contributes whole seconds (running entries end at the
//!   aggregator's "now"), optionally rounded per entry.
//! - Each entry's cost is `round(seconds * rate / 3600)` in the smallest
//!   currency unit; sums are integer sums.
//! - Every grouped node equals the sum of its children, before and after gap
//!   filling.
//!
//! # Ordering
//!
//! Buckets are emitted in ascending key order with the "no value" bucket
//! first. Date keys are zero-padded, so ascending key order is chronological.
//!
//! # Examples
//!
//! ```no_run
//! use timestat::{
//!     aggregation::{AggregationRequest, Aggregator},
//!     data_loader::DataLoader,
//!     cost_calculator::CostCalculator,
//!     provider::RateScopeSource,
//!     rate_table::RateTable,
//!     types::RateMode,
//!     Dimension,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> timestat::Result<()> {
//! let loader = DataLoader::open("timesheet.json").await?;
//! let rates = RateTable::from_scopes(&loader.load_rate_scopes(None).await?);
//! let calculator = Arc::new(CostCalculator::new(Arc::new(rates), RateMode::Auto));
//! let aggregator = Aggregator::new(calculator);
//!
//! let request = AggregationRequest::new()
//!     .with_group(Dimension::Week)
//!     .with_sub_group(Dimension::Project);
//! let tree = aggregator.aggregate_from(&loader, &request).await?;
//! println!("{} seconds, {} cost", tree.seconds, tree.cost);
//! # Ok(())
//! # }
//! ```

use crate::gap_fill::GapFiller;
use chrono::{DateTime, Utc};
use futures::stream::{Stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use timestat_core::aggregation_types::{AggregationResult, Dimension, GroupNode, LeafNode};
use timestat_core::calendar::Calendar;
use timestat_core::error::{Result, TimestatError};
use timestat_core::filters::TimeEntryFilter;
use timestat_core::provider::TimeEntrySource;
use timestat_core::timezone::TimezoneConfig;
use timestat_core::types::{DurationRounding, TimeEntry, WeekStart};
use timestat_rates::CostCalculator;
use tracing::{debug, warn};

/// Everything that shapes one aggregation
#[derive(Debug, Clone)]
pub struct AggregationRequest {
    /// Primary grouping dimension
    pub group: Option<Dimension>,
    /// Secondary grouping dimension, only valid with a primary one
    pub sub_group: Option<Dimension>,
    /// Entry predicates
    pub filter: TimeEntryFilter,
    /// Timezone used for calendar buckets
    pub timezone: TimezoneConfig,
    /// First day of weekly buckets
    pub week_start: WeekStart,
    /// Insert zero buckets for calendar slots without entries
    pub fill_gaps: bool,
    /// Inclusive range start
    pub start: Option<DateTime<Utc>>,
    /// Exclusive range end
    pub end: Option<DateTime<Utc>>,
    /// Per-entry duration rounding
    pub rounding: Option<DurationRounding>,
}

impl Default for AggregationRequest {
    fn default() -> Self {
        Self {
            group: None,
            sub_group: None,
            filter: TimeEntryFilter::default(),
            timezone: TimezoneConfig::utc(),
            week_start: WeekStart::default(),
            fill_gaps: false,
            start: None,
            end: None,
            rounding: None,
        }
    }
}

impl AggregationRequest {
    /// Ungrouped request in UTC with weeks starting on Monday
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, group: Dimension) -> Self {
        self.group = Some(group);
        self
    }

    pub fn with_sub_group(mut self, sub_group: Dimension) -> Self {
        self.sub_group = Some(sub_group);
        self
    }

    pub fn with_filter(mut self, filter: TimeEntryFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_timezone(mut self, timezone: TimezoneConfig) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_week_start(mut self, week_start: WeekStart) -> Self {
        self.week_start = week_start;
        self
    }

    pub fn with_fill_gaps(mut self, fill_gaps: bool) -> Self {
        self.fill_gaps = fill_gaps;
        self
    }

    /// Set the `[start, end)` range
    pub fn with_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn with_rounding(mut self, rounding: DurationRounding) -> Self {
        self.rounding = Some(rounding);
        self
    }

    /// Reject requests the engine cannot answer
    pub fn validate(&self) -> Result<()> {
        match (self.group, self.sub_group) {
            (None, Some(sub_group)) => {
                return Err(TimestatError::UnsupportedGrouping(format!(
                    "secondary grouping '{sub_group}' requires a primary grouping"
                )));
            }
            (Some(group), Some(sub_group)) if group == sub_group => {
                return Err(TimestatError::UnsupportedGrouping(format!(
                    "cannot group by '{group}' twice"
                )));
            }
            _ => {}
        }

        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(TimestatError::InvalidRange { start, end });
            }
        }

        if self.fill_gaps && (self.start.is_none() || self.end.is_none()) {
            return Err(TimestatError::MissingRange);
        }

        Ok(())
    }

    /// Entry filter narrowed to the request range
    ///
    /// Explicit filter bounds win over the range.
    pub fn effective_filter(&self) -> TimeEntryFilter {
        let mut filter = self.filter.clone();
        if filter.start.is_none() {
            filter.start = self.start;
        }
        if filter.end.is_none() {
            filter.end = self.end;
        }
        filter
    }

    fn calendar(&self, now: DateTime<Utc>) -> Calendar {
        Calendar::new(self.timezone.tz, self.week_start, now)
    }
}

/// Seconds and cost of one entry, keyed by its buckets
struct MeasuredEntry {
    group_key: Option<String>,
    sub_group_key: Option<String>,
    seconds: u64,
    cost: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    seconds: u64,
    cost: u64,
}

impl Totals {
    /// Add one measurement, failing instead of wrapping on overflow
    fn add(&mut self, seconds: u64, cost: u64) -> Result<()> {
        self.seconds = self
            .seconds
            .checked_add(seconds)
            .ok_or(TimestatError::TotalOverflow("seconds"))?;
        self.cost = self
            .cost
            .checked_add(cost)
            .ok_or(TimestatError::TotalOverflow("cost"))?;
        Ok(())
    }
}

/// Accumulator for one first-level bucket
#[derive(Default)]
struct GroupAccumulator {
    totals: Totals,
    children: BTreeMap<Option<String>, Totals>,
}

impl GroupAccumulator {
    fn add_entry(&mut self, entry: &MeasuredEntry) -> Result<()> {
        self.totals.add(entry.seconds, entry.cost)?;
        self.children
            .entry(entry.sub_group_key.clone())
            .or_default()
            .add(entry.seconds, entry.cost)
    }

    fn into_group_node(self, key: Option<String>, sub_group: Option<Dimension>) -> GroupNode {
        match sub_group {
            Some(dimension) => {
                let children = self
                    .children
                    .into_iter()
                    .map(|(child_key, totals)| {
                        LeafNode::total(child_key, totals.seconds, totals.cost)
                    })
                    .collect();
                GroupNode::grouped(
                    key,
                    self.totals.seconds,
                    self.totals.cost,
                    dimension,
                    children,
                )
            }
            None => GroupNode::total(key, self.totals.seconds, self.totals.cost),
        }
    }
}

/// Main aggregation engine
///
/// Holds the per-request pricing context and the instant treated as "now"
/// for running entries and week anchoring. It performs no writes.
pub struct Aggregator {
    cost_calculator: Arc<CostCalculator>,
    now: DateTime<Utc>,
    show_progress: bool,
}

impl Aggregator {
    /// Create a new Aggregator using the current time as "now"
    pub fn new(cost_calculator: Arc<CostCalculator>) -> Self {
        Self {
            cost_calculator,
            now: Utc::now(),
            show_progress: false,
        }
    }

    /// Pin the instant used as "now"
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Enable or disable progress spinners
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Load entries matching the request from `source` and aggregate them
    pub async fn aggregate_from<S>(
        &self,
        source: &S,
        request: &AggregationRequest,
    ) -> Result<AggregationResult>
    where
        S: TimeEntrySource + ?Sized,
    {
        request.validate()?;
        let entries = source.load_entries(request.effective_filter());
        self.aggregate(entries, request).await
    }

    /// Aggregate an already filtered stream of entries
    ///
    /// The first stream error aborts the aggregation; no partial tree is
    /// returned.
    pub async fn aggregate(
        &self,
        entries: impl Stream<Item = Result<TimeEntry>>,
        request: &AggregationRequest,
    ) -> Result<AggregationResult> {
        request.validate()?;

        let progress = if self.show_progress {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg} [{elapsed_precise}] {pos} entries read")
                    .map_err(|e| TimestatError::Config(e.to_string()))?,
            );
            pb.set_message("Reading time entries");
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            Some(pb)
        } else {
            None
        };

        let mut collected = Vec::new();
        tokio::pin!(entries);
        while let Some(result) = entries.next().await {
            collected.push(result?);
            if let Some(ref pb) = progress {
                pb.set_position(collected.len() as u64);
            }
        }

        if let Some(pb) = progress {
            pb.finish_with_message(format!("Read {} entries", collected.len()));
        }

        self.aggregate_entries(&collected, request)
    }

    /// Aggregate a slice of entries synchronously
    ///
    /// Returns [`TimestatError::TotalOverflow`] when a seconds or cost total
    /// does not fit in a `u64`.
    pub fn aggregate_entries(
        &self,
        entries: &[TimeEntry],
        request: &AggregationRequest,
    ) -> Result<AggregationResult> {
        request.validate()?;
        let calendar = request.calendar(self.now);

        let measured: Vec<MeasuredEntry> = entries
            .par_iter()
            .map(|entry| self.measure(entry, request, &calendar))
            .collect();

        let Some(group) = request.group else {
            let mut totals = Totals::default();
            for entry in &measured {
                totals.add(entry.seconds, entry.cost)?;
            }
            debug!(
                entries = measured.len(),
                seconds = totals.seconds,
                cost = totals.cost,
                "Aggregated time entries without grouping"
            );
            return Ok(AggregationResult::total(None, totals.seconds, totals.cost));
        };

        let mut groups: BTreeMap<Option<String>, GroupAccumulator> = BTreeMap::new();
        for entry in &measured {
            groups
                .entry(entry.group_key.clone())
                .or_default()
                .add_entry(entry)?;
        }

        let mut root_totals = Totals::default();
        let mut nodes = Vec::with_capacity(groups.len());
        for (key, acc) in groups {
            root_totals.add(acc.totals.seconds, acc.totals.cost)?;
            nodes.push(acc.into_group_node(key, request.sub_group));
        }

        debug!(
            entries = measured.len(),
            buckets = nodes.len(),
            %group,
            sub_group = ?request.sub_group,
            "Aggregated time entries"
        );

        let mut result = AggregationResult::grouped(
            None,
            root_totals.seconds,
            root_totals.cost,
            group,
            nodes,
        );

        if request.fill_gaps {
            let (Some(start), Some(end)) = (request.start, request.end) else {
                return Err(TimestatError::MissingRange);
            };
            let filler = GapFiller::new(calendar, start, end)?;
            result = filler.fill_result(result, request.sub_group)?;
        }

        Ok(result)
    }

    fn measure(
        &self,
        entry: &TimeEntry,
        request: &AggregationRequest,
        calendar: &Calendar,
    ) -> MeasuredEntry {
        if !entry.has_valid_range() {
            warn!(
                entry = %entry.id,
                start = %entry.start,
                end = ?entry.end,
                "Time entry ends before it starts"
            );
        }
        let raw_seconds = entry.duration_seconds(self.now);
        let seconds = request
            .rounding
            .map_or(raw_seconds, |rounding| rounding.apply(raw_seconds));
        let cost = self.cost_calculator.entry_cost(entry, seconds);

        MeasuredEntry {
            group_key: request
                .group
                .and_then(|dimension| calendar.dimension_key(entry, dimension)),
            sub_group_key: request
                .sub_group
                .and_then(|dimension| calendar.dimension_key(entry, dimension)),
            seconds,
            cost,
        }
    }
}
