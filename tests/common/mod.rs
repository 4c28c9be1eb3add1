//! Common test utilities and helpers for timestat tests
//!
//! This module provides a time entry builder, a small multi-scope dataset and
//! helpers to build aggregators with a pinned "now".

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use timestat::{
    aggregation::Aggregator,
    cost_calculator::CostCalculator,
    data_loader::Dataset,
    rate_table::RateTable,
    types::{
        BillableRate, ClientId, Member, Organization, OrganizationId, Project, ProjectId,
        ProjectMember, RateMode, TagId, TaskId, TimeEntry, TimeEntryId, UserId,
    },
};

/// Parse an RFC 3339 timestamp
#[allow(dead_code)]
pub fn ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .unwrap()
        .with_timezone(&Utc)
}

/// Builder for creating test TimeEntry instances
pub struct TimeEntryBuilder {
    entry: TimeEntry,
}

#[allow(dead_code)]
impl TimeEntryBuilder {
    /// One finished, non-billable hour on 2024-01-01 in a fresh organization
    pub fn new() -> Self {
        Self {
            entry: TimeEntry {
                id: TimeEntryId::new_v4(),
                user_id: UserId::new_v4(),
                organization_id: OrganizationId::new_v4(),
                project_id: None,
                task_id: None,
                client_id: None,
                start: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
                end: Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()),
                billable: false,
                billable_rate: None,
                tags: Vec::new(),
                description: String::new(),
            },
        }
    }

    pub fn starting(mut self, start: DateTime<Utc>) -> Self {
        self.entry.start = start;
        self
    }

    /// Start at `start` and run for `seconds`
    pub fn lasting(mut self, start: DateTime<Utc>, seconds: i64) -> Self {
        self.entry.start = start;
        self.entry.end = Some(start + chrono::Duration::seconds(seconds));
        self
    }

    pub fn running(mut self) -> Self {
        self.entry.end = None;
        self
    }

    pub fn user(mut self, user: UserId) -> Self {
        self.entry.user_id = user;
        self
    }

    pub fn organization(mut self, organization: OrganizationId) -> Self {
        self.entry.organization_id = organization;
        self
    }

    pub fn project(mut self, project: ProjectId) -> Self {
        self.entry.project_id = Some(project);
        self
    }

    pub fn task(mut self, task: TaskId) -> Self {
        self.entry.task_id = Some(task);
        self
    }

    pub fn client(mut self, client: ClientId) -> Self {
        self.entry.client_id = Some(client);
        self
    }

    pub fn tag(mut self, tag: TagId) -> Self {
        self.entry.tags.push(tag);
        self
    }

    pub fn billable(mut self) -> Self {
        self.entry.billable = true;
        self
    }

    pub fn stored_rate(mut self, rate: u64) -> Self {
        self.entry.billable_rate = Some(BillableRate::new(rate));
        self
    }

    pub fn build(self) -> TimeEntry {
        self.entry
    }
}

/// Ids of the agency dataset
#[allow(dead_code)]
pub struct Agency {
    pub organization: OrganizationId,
    pub alice: UserId,
    pub bob: UserId,
    pub website: ProjectId,
    pub internal: ProjectId,
    pub dataset: Dataset,
}

/// One organization (rate 100.00/h), two members, two projects
///
/// - Alice has a member rate of 120.00/h.
/// - The website project has a rate of 150.00/h and Bob has a project member
///   rate of 90.00/h on it.
/// - The internal project has no rate.
#[allow(dead_code)]
pub fn agency() -> Agency {
    let organization = OrganizationId::new_v4();
    let alice = UserId::new_v4();
    let bob = UserId::new_v4();
    let website = ProjectId::new_v4();
    let internal = ProjectId::new_v4();

    let dataset = Dataset {
        organizations: vec![Organization {
            id: organization,
            name: "Agency".into(),
            billable_rate: Some(BillableRate::new(10_000)),
        }],
        members: vec![
            Member {
                user_id: alice,
                organization_id: organization,
                billable_rate: Some(BillableRate::new(12_000)),
            },
            Member {
                user_id: bob,
                organization_id: organization,
                billable_rate: None,
            },
        ],
        projects: vec![
            Project {
                id: website,
                organization_id: organization,
                client_id: None,
                name: "Website".into(),
                billable_rate: Some(BillableRate::new(15_000)),
            },
            Project {
                id: internal,
                organization_id: organization,
                client_id: None,
                name: "Internal".into(),
                billable_rate: None,
            },
        ],
        project_members: vec![ProjectMember {
            user_id: bob,
            project_id: website,
            billable_rate: Some(BillableRate::new(9_000)),
        }],
        time_entries: Vec::new(),
    };

    Agency {
        organization,
        alice,
        bob,
        website,
        internal,
        dataset,
    }
}

/// Aggregator with an empty rate table
#[allow(dead_code)]
pub fn plain_aggregator(now: DateTime<Utc>) -> Aggregator {
    aggregator_with(RateTable::new(), RateMode::Auto, now)
}

/// Aggregator over `rates` in `mode`
#[allow(dead_code)]
pub fn aggregator_with(rates: RateTable, mode: RateMode, now: DateTime<Utc>) -> Aggregator {
    let calculator = CostCalculator::new(Arc::new(rates), mode);
    Aggregator::new(Arc::new(calculator)).with_now(now)
}
