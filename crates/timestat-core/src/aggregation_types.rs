//! Aggregation data types for timestat
//!
//! Pure data structures describing an aggregation request's grouping
//! dimensions and the two-level result tree. The nesting depth is fixed by
//! the types themselves: a [`AggregationResult`] holds [`GroupNode`]s, which
//! hold [`LeafNode`]s, and a leaf cannot carry children.
//!
//! Serialized, every level has the same shape:
//!
//! ```json
//! { "key": "2024-01-01", "seconds": 3600, "cost": 5000,
//!   "grouped_type": null, "grouped_data": null }
//! ```

use crate::calendar::CalendarUnit;
use crate::error::{Result, TimestatError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Grouping dimension of an aggregation
///
/// Temporal dimensions map an instant to a calendar bucket; categorical
/// dimensions read a foreign key or flag straight off the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Day,
    Week,
    Month,
    Year,
    User,
    Project,
    Task,
    Client,
    Billable,
}

impl Dimension {
    /// Every supported dimension, temporal ones first
    pub const ALL: [Dimension; 9] = [
        Self::Day,
        Self::Week,
        Self::Month,
        Self::Year,
        Self::User,
        Self::Project,
        Self::Task,
        Self::Client,
        Self::Billable,
    ];

    /// Calendar unit backing a temporal dimension
    pub fn calendar_unit(&self) -> Option<CalendarUnit> {
        match self {
            Self::Day => Some(CalendarUnit::Day),
            Self::Week => Some(CalendarUnit::Week),
            Self::Month => Some(CalendarUnit::Month),
            Self::Year => Some(CalendarUnit::Year),
            Self::User | Self::Project | Self::Task | Self::Client | Self::Billable => None,
        }
    }

    /// Whether this dimension buckets by calendar time
    pub fn is_temporal(&self) -> bool {
        self.calendar_unit().is_some()
    }

    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::User => "user",
            Self::Project => "project",
            Self::Task => "task",
            Self::Client => "client",
            Self::Billable => "billable",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|dimension| dimension.as_str() == lower)
            .ok_or_else(|| format!("Invalid grouping dimension: {s}"))
    }
}

/// Uninhabited child type that terminates the tree at the leaf level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoChildren {}

/// One node of the aggregation tree
///
/// `key == None` is the "no value for this dimension" bucket (for example
/// entries without a project). `cost` is in the smallest currency unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node<C> {
    pub key: Option<String>,
    pub seconds: u64,
    pub cost: u64,
    pub grouped_type: Option<Dimension>,
    pub grouped_data: Option<Vec<C>>,
}

/// Second-level node; never has children
pub type LeafNode = Node<NoChildren>;

/// First-level node; children are leaves when a secondary grouping is set
pub type GroupNode = Node<LeafNode>;

/// Root of an aggregation: the grand total over the whole filtered set
pub type AggregationResult = Node<GroupNode>;

impl<C> Node<C> {
    /// Node without children
    pub fn total(key: Option<String>, seconds: u64, cost: u64) -> Self {
        Self {
            key,
            seconds,
            cost,
            grouped_type: None,
            grouped_data: None,
        }
    }

    /// Node with children grouped by `dimension`
    pub fn grouped(
        key: Option<String>,
        seconds: u64,
        cost: u64,
        dimension: Dimension,
        children: Vec<C>,
    ) -> Self {
        Self {
            key,
            seconds,
            cost,
            grouped_type: Some(dimension),
            grouped_data: Some(children),
        }
    }

    /// Zero-valued placeholder used by gap filling
    ///
    /// With a child dimension the placeholder carries an empty child list.
    pub fn zero(key: Option<String>, child_dimension: Option<Dimension>) -> Self {
        Self {
            key,
            seconds: 0,
            cost: 0,
            grouped_type: child_dimension,
            grouped_data: child_dimension.map(|_| Vec::new()),
        }
    }

    /// Children, or an empty slice for ungrouped nodes
    pub fn children(&self) -> &[C] {
        self.grouped_data.as_deref().unwrap_or_default()
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

/// Access to a node's summed values, implemented at every tree level
pub trait Summed {
    fn seconds(&self) -> u64;
    fn cost(&self) -> u64;

    /// Whether every grouped node equals the sum of its children, recursively
    fn is_consistent(&self) -> bool;
}

impl Summed for NoChildren {
    fn seconds(&self) -> u64 {
        match *self {}
    }

    fn cost(&self) -> u64 {
        match *self {}
    }

    fn is_consistent(&self) -> bool {
        match *self {}
    }
}

impl<C: Summed> Summed for Node<C> {
    fn seconds(&self) -> u64 {
        self.seconds
    }

    fn cost(&self) -> u64 {
        self.cost
    }

    fn is_consistent(&self) -> bool {
        let Some(children) = &self.grouped_data else {
            return true;
        };
        checked_totals(children).is_ok_and(|totals| totals == (self.seconds, self.cost))
            && children.iter().all(Summed::is_consistent)
    }
}

/// Sum the seconds and cost of `children`, failing on overflow
pub fn checked_totals<C: Summed>(children: &[C]) -> Result<(u64, u64)> {
    children.iter().try_fold((0u64, 0u64), |(seconds, cost), child| {
        Ok((
            seconds
                .checked_add(child.seconds())
                .ok_or(TimestatError::TotalOverflow("seconds"))?,
            cost.checked_add(child.cost())
                .ok_or(TimestatError::TotalOverflow("cost"))?,
        ))
    })
}

impl<C: Summed> Node<C> {
    /// Reset this node's totals to the sum of its children
    ///
    /// Ungrouped nodes are left untouched. An overflowing sum leaves the
    /// node unchanged and returns [`TimestatError::TotalOverflow`].
    pub fn recompute_totals(&mut self) -> Result<()> {
        if let Some(children) = &self.grouped_data {
            (self.seconds, self.cost) = checked_totals(children)?;
        }
        Ok(())
    }
}
