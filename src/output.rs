//! Output formatting module for aggregation trees and rate reports
//!
//! Two formats are supported:
//! - Table: human-readable tables built with prettytable
//! - JSON: the aggregation tree as-is, for charts and scripts
//!
//! Durations are rendered as `H:MM:SS`, costs as decimal amounts with two
//! fractional digits (the stored unit is the hundredth).
//!
//! # Examples
//!
//! ```
//! use timestat::output::{get_formatter, KeyLabels};
//! use timestat::AggregationResult;
//!
//! let result = AggregationResult::total(None, 5_400, 15_000);
//! let formatter = get_formatter(false);
//! let output = formatter.format_aggregation(&result, &KeyLabels::default());
//! assert!(output.contains("1:30:00"));
//! assert!(output.contains("150.00"));
//! ```

use crate::data_loader::Dataset;
use colored::Colorize;
use prettytable::{Row, Table, format, row};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use timestat_core::aggregation_types::{AggregationResult, Dimension};
use timestat_core::types::{BillableRate, TimeEntryId};
use timestat_rates::RateScope;

/// Human-readable names for bucket keys
///
/// Keys without a known label are shown verbatim.
#[derive(Debug, Clone, Default)]
pub struct KeyLabels {
    names: HashMap<(Dimension, String), String>,
}

impl KeyLabels {
    /// Project names from a dataset
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let mut labels = Self::default();
        for project in &dataset.projects {
            if !project.name.is_empty() {
                labels.insert(Dimension::Project, project.id.to_string(), &project.name);
            }
        }
        labels
    }

    pub fn insert(&mut self, dimension: Dimension, key: impl Into<String>, name: impl Into<String>) {
        self.names.insert((dimension, key.into()), name.into());
    }

    /// Display text for a bucket key
    pub fn label(&self, dimension: Option<Dimension>, key: Option<&str>) -> String {
        let Some(key) = key else {
            return "(none)".to_string();
        };
        match dimension {
            Some(Dimension::Billable) => match key {
                "1" => "billable".to_string(),
                "0" => "non-billable".to_string(),
                other => other.to_string(),
            },
            Some(dimension) => self
                .names
                .get(&(dimension, key.to_string()))
                .cloned()
                .unwrap_or_else(|| key.to_string()),
            None => key.to_string(),
        }
    }
}

/// One line of the `rates` report
#[derive(Debug, Clone, Serialize)]
pub struct RateRow {
    pub entry_id: TimeEntryId,
    pub billable: bool,
    pub stored: Option<BillableRate>,
    pub resolved: Option<BillableRate>,
    pub scope: Option<RateScope>,
}

impl RateRow {
    /// Whether the stored rate differs from the resolved one
    pub fn is_stale(&self) -> bool {
        self.stored != self.resolved
    }
}

/// Trait for output formatters
pub trait OutputFormatter {
    /// Format an aggregation tree
    fn format_aggregation(&self, result: &AggregationResult, labels: &KeyLabels) -> String;

    /// Format the resolved rate of each entry
    fn format_rates(&self, rows: &[RateRow]) -> String;
}

/// Table formatter for human-readable output
pub struct TableFormatter;

impl TableFormatter {
    /// Format a number with thousands separators
    fn format_number(n: u64) -> String {
        let s = n.to_string();
        let mut result = String::new();

        for (count, ch) in s.chars().rev().enumerate() {
            if count > 0 && count % 3 == 0 {
                result.push(',');
            }
            result.push(ch);
        }

        result.chars().rev().collect()
    }

    /// Format seconds as `H:MM:SS`
    fn format_duration(seconds: u64) -> String {
        format!(
            "{}:{:02}:{:02}",
            Self::format_number(seconds / 3_600),
            (seconds % 3_600) / 60,
            seconds % 60
        )
    }

    /// Format a cost in hundredths as a decimal amount
    fn format_cost(cost: u64) -> String {
        format!("{}.{:02}", Self::format_number(cost / 100), cost % 100)
    }

    fn format_rate(rate: Option<BillableRate>) -> String {
        rate.map_or_else(|| "-".to_string(), |rate| Self::format_cost(rate.per_hour()))
    }

    fn totals_row(result: &AggregationResult, columns: usize) -> Row {
        let duration = Self::format_duration(result.seconds);
        let cost = Self::format_cost(result.cost);
        if columns == 4 {
            row![b -> "TOTAL", "", br -> duration, br -> cost]
        } else {
            row![b -> "TOTAL", br -> duration, br -> cost]
        }
    }
}

impl OutputFormatter for TableFormatter {
    fn format_aggregation(&self, result: &AggregationResult, labels: &KeyLabels) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);

        let group = result.grouped_type;
        let sub_group = result
            .children()
            .iter()
            .find_map(|node| node.grouped_type);

        let mut title = String::from("Tracked time");
        if let Some(group) = group {
            title.push_str(&format!(" by {group}"));
        }
        if let Some(sub_group) = sub_group {
            title.push_str(&format!(" and {sub_group}"));
        }

        let columns = match (group, sub_group) {
            (None, _) => {
                table.set_titles(row![b -> "", b -> "Duration", b -> "Cost"]);
                3
            }
            (Some(group), None) => {
                table.set_titles(row![
                    b -> capitalize(group.as_str()),
                    b -> "Duration",
                    b -> "Cost"
                ]);
                3
            }
            (Some(group), Some(sub_group)) => {
                table.set_titles(row![
                    b -> capitalize(group.as_str()),
                    b -> capitalize(sub_group.as_str()),
                    b -> "Duration",
                    b -> "Cost"
                ]);
                4
            }
        };

        for node in result.children() {
            let label = labels.label(group, node.key());
            let duration = Self::format_duration(node.seconds);
            let cost = Self::format_cost(node.cost);
            if columns == 4 {
                table.add_row(row![b -> label, "", r -> duration, r -> cost]);
                for child in node.children() {
                    table.add_row(row![
                        "",
                        labels.label(sub_group, child.key()),
                        r -> Self::format_duration(child.seconds),
                        r -> Self::format_cost(child.cost)
                    ]);
                }
            } else {
                table.add_row(row![label, r -> duration, r -> cost]);
            }
        }

        table.add_row(Self::totals_row(result, columns));
        format!("{}\n{}", title.bold(), table)
    }

    fn format_rates(&self, rows: &[RateRow]) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![
            b -> "Entry",
            b -> "Billable",
            b -> "Stored",
            b -> "Resolved",
            b -> "Scope"
        ]);

        let mut stale = 0;
        for rate_row in rows {
            if rate_row.is_stale() {
                stale += 1;
            }
            table.add_row(row![
                rate_row.entry_id,
                if rate_row.billable { "yes" } else { "no" },
                r -> Self::format_rate(rate_row.stored),
                r -> Self::format_rate(rate_row.resolved),
                rate_row.scope.map_or_else(|| "-".to_string(), |scope| scope.to_string())
            ]);
        }

        let summary = format!("{} entries, {} with a stale stored rate", rows.len(), stale);
        let summary = if stale > 0 {
            summary.yellow().to_string()
        } else {
            summary
        };
        format!("{table}{summary}\n")
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_aggregation(&self, result: &AggregationResult, _labels: &KeyLabels) -> String {
        serde_json::to_string_pretty(result).unwrap_or_else(|e| json!({ "error": e.to_string() }).to_string())
    }

    fn format_rates(&self, rows: &[RateRow]) -> String {
        let output = json!({
            "entries": rows,
            "stale": rows.iter().filter(|row| row.is_stale()).count(),
        });
        serde_json::to_string_pretty(&output).unwrap_or_else(|e| json!({ "error": e.to_string() }).to_string())
    }
}

/// Get the formatter for the requested output mode
pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(TableFormatter)
    }
}
