//! Batch-loaded rate-scope lookup table
//!
//! A [`RateTable`] is built once per request from the rows of the four rate
//! scopes and is immutable afterwards, so it can be shared across threads
//! while resolving many entries. A missing row and a row whose rate is null
//! read back identically as `None`.

use std::collections::HashMap;
use timestat_core::provider::RateScopes;
use timestat_core::types::{BillableRate, OrganizationId, ProjectId, UserId};
use tracing::debug;

/// Point lookups against the four rate scopes
pub trait RateScopeReader {
    /// Rate of `user` inside `project`
    fn project_member_rate(&self, user: UserId, project: ProjectId) -> Option<BillableRate>;

    /// Default rate of `project`
    fn project_rate(&self, project: ProjectId) -> Option<BillableRate>;

    /// Rate of `user` inside `organization`
    fn member_rate(&self, user: UserId, organization: OrganizationId) -> Option<BillableRate>;

    /// Default rate of `organization`
    fn organization_rate(&self, organization: OrganizationId) -> Option<BillableRate>;
}

/// Immutable in-memory rate lookup context
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    organizations: HashMap<OrganizationId, Option<BillableRate>>,
    members: HashMap<(UserId, OrganizationId), Option<BillableRate>>,
    projects: HashMap<ProjectId, Option<BillableRate>>,
    project_members: HashMap<(UserId, ProjectId), Option<BillableRate>>,
}

impl RateTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from raw scope rows
    pub fn from_scopes(scopes: &RateScopes) -> Self {
        let table = Self {
            organizations: scopes
                .organizations
                .iter()
                .map(|org| (org.id, org.billable_rate))
                .collect(),
            members: scopes
                .members
                .iter()
                .map(|member| ((member.user_id, member.organization_id), member.billable_rate))
                .collect(),
            projects: scopes
                .projects
                .iter()
                .map(|project| (project.id, project.billable_rate))
                .collect(),
            project_members: scopes
                .project_members
                .iter()
                .map(|member| ((member.user_id, member.project_id), member.billable_rate))
                .collect(),
        };
        debug!(
            organizations = table.organizations.len(),
            members = table.members.len(),
            projects = table.projects.len(),
            project_members = table.project_members.len(),
            "Loaded rate table"
        );
        table
    }

    pub fn with_organization(mut self, id: OrganizationId, rate: Option<BillableRate>) -> Self {
        self.organizations.insert(id, rate);
        self
    }

    pub fn with_member(
        mut self,
        user: UserId,
        organization: OrganizationId,
        rate: Option<BillableRate>,
    ) -> Self {
        self.members.insert((user, organization), rate);
        self
    }

    pub fn with_project(mut self, id: ProjectId, rate: Option<BillableRate>) -> Self {
        self.projects.insert(id, rate);
        self
    }

    pub fn with_project_member(
        mut self,
        user: UserId,
        project: ProjectId,
        rate: Option<BillableRate>,
    ) -> Self {
        self.project_members.insert((user, project), rate);
        self
    }
}

impl RateScopeReader for RateTable {
    fn project_member_rate(&self, user: UserId, project: ProjectId) -> Option<BillableRate> {
        self.project_members.get(&(user, project)).copied().flatten()
    }

    fn project_rate(&self, project: ProjectId) -> Option<BillableRate> {
        self.projects.get(&project).copied().flatten()
    }

    fn member_rate(&self, user: UserId, organization: OrganizationId) -> Option<BillableRate> {
        self.members.get(&(user, organization)).copied().flatten()
    }

    fn organization_rate(&self, organization: OrganizationId) -> Option<BillableRate> {
        self.organizations.get(&organization).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timestat_core::types::{Member, Organization, Project, ProjectMember};

    #[test]
    fn test_missing_row_and_null_rate_read_the_same() {
        let (user, org) = (UserId::new_v4(), OrganizationId::new_v4());
        let table = RateTable::new().with_member(user, org, None);

        assert_eq!(table.member_rate(user, org), None);
        assert_eq!(table.member_rate(UserId::new_v4(), org), None);
    }

    #[test]
    fn test_from_scopes_indexes_every_table() {
        let (user, org, project) = (UserId::new_v4(), OrganizationId::new_v4(), ProjectId::new_v4());
        let scopes = RateScopes {
            organizations: vec![Organization {
                id: org,
                name: "Acme".into(),
                billable_rate: Some(BillableRate::new(1_000)),
            }],
            members: vec![Member {
                user_id: user,
                organization_id: org,
                billable_rate: Some(BillableRate::new(2_000)),
            }],
            projects: vec![Project {
                id: project,
                organization_id: org,
                client_id: None,
                name: "Website".into(),
                billable_rate: Some(BillableRate::new(3_000)),
            }],
            project_members: vec![ProjectMember {
                user_id: user,
                project_id: project,
                billable_rate: Some(BillableRate::new(4_000)),
            }],
        };

        let table = RateTable::from_scopes(&scopes);
        assert_eq!(table.organization_rate(org), Some(BillableRate::new(1_000)));
        assert_eq!(table.member_rate(user, org), Some(BillableRate::new(2_000)));
        assert_eq!(table.project_rate(project), Some(BillableRate::new(3_000)));
        assert_eq!(
            table.project_member_rate(user, project),
            Some(BillableRate::new(4_000))
        );
    }
}
