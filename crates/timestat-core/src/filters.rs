//! Filtering module for time entries
//!
//! This module builds the predicate set applied to time entries before
//! aggregation: date range, running/finished, billable flag, organization,
//! user equality, and membership in project/client/task/tag id sets.
//!
//! Date bounds apply to the entry's start instant and form a half-open range:
//! `start <= entry.start < end`.
//!
//! # Examples
//!
//! ```
//! use timestat_core::filters::{IdFilter, TimeEntryFilter};
//! use timestat_core::types::ProjectId;
//! use chrono::{TimeZone, Utc};
//!
//! let project = ProjectId::new_v4();
//! let filter = TimeEntryFilter::new()
//!     .with_start(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
//!     .with_end(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap())
//!     .with_billable(true)
//!     .with_projects(IdFilter::new([project]).with_none());
//! ```

use crate::types::{ClientId, OrganizationId, ProjectId, TagId, TaskId, TimeEntry, UserId};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::hash::Hash;

/// Membership test against a set of ids
///
/// `include_none` additionally matches entries that have no association at
/// all, which is how callers ask for "entries without a project".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdFilter<T: Eq + Hash> {
    ids: HashSet<T>,
    include_none: bool,
}

impl<T: Eq + Hash + Copy> IdFilter<T> {
    /// Match any of the given ids
    pub fn new(ids: impl IntoIterator<Item = T>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
            include_none: false,
        }
    }

    /// Match only entries without an association
    pub fn none() -> Self {
        Self::new([]).with_none()
    }

    /// Also match entries without an association
    pub fn with_none(mut self) -> Self {
        self.include_none = true;
        self
    }

    pub fn matches(&self, value: Option<T>) -> bool {
        match value {
            Some(id) => self.ids.contains(&id),
            None => self.include_none,
        }
    }

    /// Match when any element of `values` is in the set
    pub fn matches_any(&self, values: &[T]) -> bool {
        if values.is_empty() {
            return self.include_none;
        }
        values.iter().any(|id| self.ids.contains(id))
    }
}

/// Filter configuration for time entries
///
/// All filters are optional and combine with AND.
#[derive(Debug, Default, Clone)]
pub struct TimeEntryFilter {
    /// Restrict to one organization
    pub organization_id: Option<OrganizationId>,
    /// Entries starting at or after this instant
    pub start: Option<DateTime<Utc>>,
    /// Entries starting before this instant
    pub end: Option<DateTime<Utc>>,
    /// `Some(true)` keeps running entries only, `Some(false)` finished ones only
    pub active: Option<bool>,
    /// Billable flag
    pub billable: Option<bool>,
    /// Exact user
    pub user_id: Option<UserId>,
    /// Any of these users
    pub member_ids: Option<HashSet<UserId>>,
    pub project_ids: Option<IdFilter<ProjectId>>,
    pub client_ids: Option<IdFilter<ClientId>>,
    pub task_ids: Option<IdFilter<TaskId>>,
    pub tag_ids: Option<IdFilter<TagId>>,
}

impl TimeEntryFilter {
    /// Create a new filter with no restrictions
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_organization(mut self, organization_id: OrganizationId) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    /// Set the inclusive lower bound on the entry start
    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Set the exclusive upper bound on the entry start
    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn with_billable(mut self, billable: bool) -> Self {
        self.billable = Some(billable);
        self
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_members(mut self, member_ids: impl IntoIterator<Item = UserId>) -> Self {
        self.member_ids = Some(member_ids.into_iter().collect());
        self
    }

    pub fn with_projects(mut self, projects: IdFilter<ProjectId>) -> Self {
        self.project_ids = Some(projects);
        self
    }

    pub fn with_clients(mut self, clients: IdFilter<ClientId>) -> Self {
        self.client_ids = Some(clients);
        self
    }

    pub fn with_tasks(mut self, tasks: IdFilter<TaskId>) -> Self {
        self.task_ids = Some(tasks);
        self
    }

    pub fn with_tags(mut self, tags: IdFilter<TagId>) -> Self {
        self.tag_ids = Some(tags);
        self
    }

    /// Check if an entry passes the filter
    pub fn matches(&self, entry: &TimeEntry) -> bool {
        if self
            .organization_id
            .is_some_and(|org| org != entry.organization_id)
        {
            return false;
        }
        if self.start.is_some_and(|start| entry.start < start) {
            return false;
        }
        if self.end.is_some_and(|end| entry.start >= end) {
            return false;
        }
        if self.active.is_some_and(|active| active != entry.is_running()) {
            return false;
        }
        if self.billable.is_some_and(|billable| billable != entry.billable) {
            return false;
        }
        if self.user_id.is_some_and(|user| user != entry.user_id) {
            return false;
        }
        if let Some(members) = &self.member_ids {
            if !members.contains(&entry.user_id) {
                return false;
            }
        }
        if let Some(projects) = &self.project_ids {
            if !projects.matches(entry.project_id) {
                return false;
            }
        }
        if let Some(clients) = &self.client_ids {
            if !clients.matches(entry.client_id) {
                return false;
            }
        }
        if let Some(tasks) = &self.task_ids {
            if !tasks.matches(entry.task_id) {
                return false;
            }
        }
        if let Some(tags) = &self.tag_ids {
            if !tags.matches_any(&entry.tags) {
                return false;
            }
        }
        true
    }

    /// Filter a stream of entries
    ///
    /// Errors from the underlying stream are passed through untouched so the
    /// consumer can abort.
    pub fn filter_stream<S>(
        self,
        stream: S,
    ) -> impl futures::Stream<Item = crate::error::Result<TimeEntry>>
    where
        S: futures::Stream<Item = crate::error::Result<TimeEntry>>,
    {
        use futures::StreamExt;

        stream.filter(move |result| {
            let keep = match result {
                Ok(entry) => self.matches(entry),
                Err(_) => true,
            };
            futures::future::ready(keep)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{entry_between, ts};
    use futures::{StreamExt, stream};

    #[test]
    fn test_date_filter_is_half_open_on_start() {
        let filter = TimeEntryFilter::new()
            .with_start(ts("2024-01-01T00:00:00Z"))
            .with_end(ts("2024-02-01T00:00:00Z"));

        let before = entry_between("2023-12-31T23:59:59Z", "2024-01-01T01:00:00Z");
        let first = entry_between("2024-01-01T00:00:00Z", "2024-01-01T01:00:00Z");
        let last = entry_between("2024-01-31T23:00:00Z", "2024-02-01T01:00:00Z");
        let after = entry_between("2024-02-01T00:00:00Z", "2024-02-01T01:00:00Z");

        assert!(!filter.matches(&before));
        assert!(filter.matches(&first));
        assert!(filter.matches(&last));
        assert!(!filter.matches(&after));
    }

    #[test]
    fn test_active_and_billable_filters() {
        let mut running = entry_between("2024-01-01T00:00:00Z", "2024-01-01T01:00:00Z");
        running.end = None;
        running.billable = true;
        let finished = entry_between("2024-01-01T00:00:00Z", "2024-01-01T01:00:00Z");

        let active = TimeEntryFilter::new().with_active(true);
        assert!(active.matches(&running));
        assert!(!active.matches(&finished));

        let inactive_billable = TimeEntryFilter::new().with_active(false).with_billable(true);
        assert!(!inactive_billable.matches(&running));
        assert!(!inactive_billable.matches(&finished));
    }

    #[test]
    fn test_project_filter_with_none_sentinel() {
        let project = ProjectId::new_v4();
        let mut with_project = entry_between("2024-01-01T00:00:00Z", "2024-01-01T01:00:00Z");
        with_project.project_id = Some(project);
        let mut other_project = with_project.clone();
        other_project.project_id = Some(ProjectId::new_v4());
        let no_project = entry_between("2024-01-01T00:00:00Z", "2024-01-01T01:00:00Z");

        let only = TimeEntryFilter::new().with_projects(IdFilter::new([project]));
        assert!(only.matches(&with_project));
        assert!(!only.matches(&other_project));
        assert!(!only.matches(&no_project));

        let or_none = TimeEntryFilter::new().with_projects(IdFilter::new([project]).with_none());
        assert!(or_none.matches(&no_project));

        let none_only = TimeEntryFilter::new().with_projects(IdFilter::none());
        assert!(none_only.matches(&no_project));
        assert!(!none_only.matches(&with_project));
    }

    #[test]
    fn test_tag_filter_matches_any_overlap() {
        let (red, blue) = (TagId::new_v4(), TagId::new_v4());
        let mut tagged = entry_between("2024-01-01T00:00:00Z", "2024-01-01T01:00:00Z");
        tagged.tags = vec![red, blue];
        let untagged = entry_between("2024-01-01T00:00:00Z", "2024-01-01T01:00:00Z");

        let filter = TimeEntryFilter::new().with_tags(IdFilter::new([blue]));
        assert!(filter.matches(&tagged));
        assert!(!filter.matches(&untagged));
    }

    #[test]
    fn test_user_and_member_filters() {
        let entry = entry_between("2024-01-01T00:00:00Z", "2024-01-01T01:00:00Z");

        assert!(TimeEntryFilter::new().with_user(entry.user_id).matches(&entry));
        assert!(!TimeEntryFilter::new().with_user(UserId::new_v4()).matches(&entry));
        assert!(
            TimeEntryFilter::new()
                .with_members([UserId::new_v4(), entry.user_id])
                .matches(&entry)
        );
        assert!(
            !TimeEntryFilter::new()
                .with_organization(OrganizationId::new_v4())
                .matches(&entry)
        );
    }

    #[tokio::test]
    async fn test_filter_stream_keeps_errors() {
        let keep = entry_between("2024-01-05T00:00:00Z", "2024-01-05T01:00:00Z");
        let drop = entry_between("2023-01-05T00:00:00Z", "2023-01-05T01:00:00Z");
        let entries = stream::iter(vec![
            Ok(keep.clone()),
            Ok(drop),
            Err(crate::error::TimestatError::InvalidArgument("broken row".into())),
        ]);

        let results: Vec<_> = TimeEntryFilter::new()
            .with_start(ts("2024-01-01T00:00:00Z"))
            .filter_stream(entries)
            .collect()
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().id, keep.id);
        assert!(results[1].is_err());
    }
}
