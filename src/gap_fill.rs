//! Gap filling for calendar groupings
//!
//! Sparse aggregation results only contain buckets that had entries. For
//! charts the caller usually wants every calendar slot of the requested range,
//! so this module rewrites each temporal level into the complete, ordered list
//! of expected keys, keeping the values of buckets that exist and inserting
//! zero-valued ones for the rest.
//!
//! Categorical levels pass through unchanged. When the secondary dimension is
//! temporal, the child lists of every kept first-level node are filled with
//! the same range. Zero-valued first-level nodes get an empty child list.
//!
//! A sparse bucket whose key is not among the expected keys (for example an
//! entry that started before the range) cannot be placed. It is dropped with a
//! warning and the parent totals are recomputed from the kept children, so the
//! returned tree always sums correctly.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use timestat_core::aggregation_types::{AggregationResult, Dimension, GroupNode, Node, Summed};
use timestat_core::calendar::Calendar;
use timestat_core::error::{Result, TimestatError};
use tracing::{debug, warn};

/// Fills calendar gaps over one `[start, end)` range
#[derive(Debug, Clone)]
pub struct GapFiller {
    calendar: Calendar,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl GapFiller {
    pub fn new(calendar: Calendar, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(TimestatError::InvalidRange { start, end });
        }
        Ok(Self {
            calendar,
            start,
            end,
        })
    }

    /// Fill the first-level nodes of a result and refresh the grand total
    pub fn fill_result(
        &self,
        mut result: AggregationResult,
        sub_group: Option<Dimension>,
    ) -> Result<AggregationResult> {
        let (Some(group), Some(nodes)) = (result.grouped_type, result.grouped_data.take()) else {
            return Ok(result);
        };

        let before = (result.seconds, result.cost);
        result.grouped_data = Some(self.fill(nodes, group, sub_group)?);
        result.recompute_totals()?;

        if before != (result.seconds, result.cost) {
            warn!(
                seconds_before = before.0,
                seconds_after = result.seconds,
                cost_before = before.1,
                cost_after = result.cost,
                "Gap filling dropped buckets outside the requested range"
            );
        }
        Ok(result)
    }

    /// Fill a list of first-level nodes grouped by `group`
    ///
    /// `sub_group` describes the children of each node.
    pub fn fill(
        &self,
        nodes: Vec<GroupNode>,
        group: Dimension,
        sub_group: Option<Dimension>,
    ) -> Result<Vec<GroupNode>> {
        let fill_children = |node: &mut GroupNode| -> Result<()> {
            let Some(sub_group) = sub_group.filter(Dimension::is_temporal) else {
                return Ok(());
            };
            if let Some(children) = node.grouped_data.take() {
                node.grouped_data = Some(self.fill_level(children, sub_group, None, |_| Ok(()))?);
                node.recompute_totals()?;
            }
            Ok(())
        };

        if group.is_temporal() {
            return self.fill_level(nodes, group, sub_group, fill_children);
        }

        let mut nodes = nodes;
        for node in &mut nodes {
            fill_children(node)?;
        }
        Ok(nodes)
    }

    /// Rewrite one level into the complete list of expected buckets
    ///
    /// `on_found` runs for every node that came from the sparse input.
    fn fill_level<C, F>(
        &self,
        nodes: Vec<Node<C>>,
        dimension: Dimension,
        child_dimension: Option<Dimension>,
        mut on_found: F,
    ) -> Result<Vec<Node<C>>>
    where
        C: Summed,
        F: FnMut(&mut Node<C>) -> Result<()>,
    {
        let expected = self
            .calendar
            .expected_keys(dimension, self.start, self.end)?;

        let mut sparse: HashMap<String, Node<C>> = HashMap::with_capacity(nodes.len());
        for node in nodes {
            let Some(key) = node.key.clone() else {
                drop_anomaly(&node, dimension, "bucket without a key");
                continue;
            };
            if sparse.contains_key(&key) {
                drop_anomaly(&node, dimension, "duplicate bucket key");
                continue;
            }
            sparse.insert(key, node);
        }

        let found = sparse.len();
        let mut filled = Vec::with_capacity(expected.len());
        for key in expected {
            match sparse.remove(&key) {
                Some(mut node) => {
                    on_found(&mut node)?;
                    filled.push(node);
                }
                None => filled.push(Node::zero(Some(key), child_dimension)),
            }
        }

        for node in sparse.into_values() {
            drop_anomaly(&node, dimension, "bucket outside the requested range");
        }

        debug!(
            %dimension,
            found,
            slots = filled.len(),
            "Filled calendar gaps"
        );
        Ok(filled)
    }
}

fn drop_anomaly<C: Summed>(node: &Node<C>, dimension: Dimension, reason: &str) {
    warn!(
        %dimension,
        key = ?node.key,
        seconds = node.seconds(),
        cost = node.cost(),
        reason,
        "Dropping aggregation bucket during gap filling"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Tz;
    use timestat_core::aggregation_types::LeafNode;
    use std::io;
    use std::sync::{Arc, Mutex};
    use timestat_core::types::WeekStart;

    fn ts(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    fn filler(start: &str, end: &str) -> GapFiller {
        let calendar = Calendar::new(Tz::UTC, WeekStart::MONDAY, ts("2024-06-01T00:00:00Z"));
        GapFiller::new(calendar, ts(start), ts(end)).unwrap()
    }

    /// Tracing output written while `f` runs
    fn captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
        #[derive(Clone, Default)]
        struct Buffer(Arc<Mutex<Vec<u8>>>);

        impl io::Write for Buffer {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let value = tracing::subscriber::with_default(subscriber, f);
        let logs = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        (value, logs)
    }

    fn day(key: &str, seconds: u64, cost: u64) -> GroupNode {
        GroupNode::total(Some(key.to_string()), seconds, cost)
    }

    #[test]
    fn test_fills_missing_days_in_order() {
        let nodes = vec![day("2024-01-03", 60, 1), day("2024-01-01", 30, 2)];
        let filled = filler("2024-01-01T00:00:00Z", "2024-01-04T00:00:00Z")
            .fill(nodes, Dimension::Day, None)
            .unwrap();

        let keys: Vec<_> = filled.iter().map(|n| n.key().unwrap()).collect();
        assert_eq!(keys, ["2024-01-01", "2024-01-02", "2024-01-03"]);
        assert_eq!(filled[0].seconds, 30);
        assert_eq!(filled[1].seconds, 0);
        assert_eq!(filled[1].cost, 0);
        assert!(filled[1].grouped_data.is_none());
        assert_eq!(filled[2].cost, 1);
    }

    #[test]
    fn test_zero_node_gets_empty_children_with_sub_group() {
        let filled = filler("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z")
            .fill(Vec::new(), Dimension::Day, Some(Dimension::Project))
            .unwrap();

        assert_eq!(filled.len(), 1);
        assert_eq!(filled[0].grouped_type, Some(Dimension::Project));
        assert_eq!(filled[0].grouped_data, Some(Vec::new()));
    }

    #[test]
    fn test_temporal_children_filled_under_categorical_group() {
        let project = GroupNode::grouped(
            Some("p".into()),
            100,
            10,
            Dimension::Month,
            vec![LeafNode::total(Some("2024-02".into()), 100, 10)],
        );
        let filled = filler("2024-01-15T00:00:00Z", "2024-03-02T00:00:00Z")
            .fill(vec![project], Dimension::Project, Some(Dimension::Month))
            .unwrap();

        let children = filled[0].children();
        let keys: Vec<_> = children.iter().map(|n| n.key().unwrap()).collect();
        assert_eq!(keys, ["2024-01", "2024-02", "2024-03"]);
        assert_eq!(filled[0].seconds, 100);
    }

    #[test]
    fn test_out_of_range_bucket_is_dropped_and_totals_recomputed() {
        let result = AggregationResult::grouped(
            None,
            90,
            3,
            Dimension::Day,
            vec![day("2023-12-31", 60, 1), day("2024-01-01", 30, 2)],
        );
        let (filled, logs) = captured_logs(|| {
            filler("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z")
                .fill_result(result, None)
                .unwrap()
        });

        assert!(logs.contains("WARN"));
        assert!(logs.contains("Dropping aggregation bucket during gap filling"));
        assert!(logs.contains("2023-12-31"));
        assert!(logs.contains("Gap filling dropped buckets outside the requested range"));
        assert_eq!(filled.children().len(), 1);
        assert_eq!(filled.seconds, 30);
        assert_eq!(filled.cost, 2);
        assert!(filled.is_consistent());
    }

    #[test]
    fn test_filling_is_idempotent() {
        let gaps = filler("2024-01-01T00:00:00Z", "2024-01-20T00:00:00Z");
        let once = gaps
            .fill(vec![day("2024-01-08", 5, 5)], Dimension::Week, None)
            .unwrap();
        let twice = gaps.fill(once.clone(), Dimension::Week, None).unwrap();

        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn test_ungrouped_result_passes_through() {
        let result = AggregationResult::total(None, 10, 1);
        let filled = filler("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z")
            .fill_result(result.clone(), None)
            .unwrap();
        assert_eq!(filled, result);
    }

    #[test]
    fn test_backwards_range_rejected() {
        let calendar = Calendar::new(Tz::UTC, WeekStart::MONDAY, ts("2024-06-01T00:00:00Z"));
        assert!(matches!(
            GapFiller::new(calendar, ts("2024-01-02T00:00:00Z"), ts("2024-01-01T00:00:00Z")),
            Err(TimestatError::InvalidRange { .. })
        ));
    }
}
