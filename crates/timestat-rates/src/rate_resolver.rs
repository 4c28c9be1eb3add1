//! Billable rate cascade
//!
//! The rate of a billable entry is the first non-null rate among:
//!
//! 1. the user's project membership
//! 2. the project
//! 3. the user's organization membership
//! 4. the organization
//!
//! Non-billable entries never have a rate. A scope whose row does not exist is
//! skipped exactly like a scope whose rate is null.
//!
//! # Examples
//!
//! ```
//! use timestat_rates::{RateResolver, RateTable};
//! use timestat_core::types::{BillableRate, TimeEntry};
//!
//! # fn example(entry: &TimeEntry) {
//! let table = RateTable::new()
//!     .with_organization(entry.organization_id, Some(BillableRate::new(1_001)))
//!     .with_member(entry.user_id, entry.organization_id, Some(BillableRate::new(2_002)));
//!
//! let resolver = RateResolver::new(&table);
//! let rate = resolver.resolve(entry);
//! # }
//! ```

use crate::rate_table::{RateScopeReader, RateTable};
use serde::Serialize;
use std::fmt;
use timestat_core::types::{BillableRate, OrganizationId, ProjectId, TimeEntry, UserId};
use tracing::debug;

/// Scope a resolved rate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateScope {
    ProjectMember,
    Project,
    OrganizationMember,
    Organization,
}

impl fmt::Display for RateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ProjectMember => "project member",
            Self::Project => "project",
            Self::OrganizationMember => "organization member",
            Self::Organization => "organization",
        };
        f.write_str(name)
    }
}

/// Set of entries affected by an administrative rate change
///
/// Used to re-materialize stored rates after one scope's rate was edited
/// and the change should apply to existing entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateUpdateScope {
    Organization(OrganizationId),
    OrganizationMember {
        user: UserId,
        organization: OrganizationId,
    },
    Project(ProjectId),
    ProjectMember {
        user: UserId,
        project: ProjectId,
    },
}

impl RateUpdateScope {
    /// Whether a change at this scope can alter the entry's rate
    pub fn affects(&self, entry: &TimeEntry) -> bool {
        match *self {
            Self::Organization(organization) => entry.organization_id == organization,
            Self::OrganizationMember { user, organization } => {
                entry.user_id == user && entry.organization_id == organization
            }
            Self::Project(project) => entry.project_id == Some(project),
            Self::ProjectMember { user, project } => {
                entry.user_id == user && entry.project_id == Some(project)
            }
        }
    }
}

/// Read-only resolver over a rate-scope reader
#[derive(Debug)]
pub struct RateResolver<'a, R: RateScopeReader + ?Sized = RateTable> {
    scopes: &'a R,
}

impl<R: RateScopeReader + ?Sized> Clone for RateResolver<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: RateScopeReader + ?Sized> Copy for RateResolver<'_, R> {}

impl<'a, R: RateScopeReader + ?Sized> RateResolver<'a, R> {
    pub fn new(scopes: &'a R) -> Self {
        Self { scopes }
    }

    /// Resolve the rate of an entry
    pub fn resolve(&self, entry: &TimeEntry) -> Option<BillableRate> {
        self.resolve_with_scope(entry).map(|(_, rate)| rate)
    }

    /// Resolve the rate of an entry along with the scope that supplied it
    pub fn resolve_with_scope(&self, entry: &TimeEntry) -> Option<(RateScope, BillableRate)> {
        if !entry.billable {
            return None;
        }

        if let Some(project) = entry.project_id {
            if let Some(rate) = self.scopes.project_member_rate(entry.user_id, project) {
                return Some((RateScope::ProjectMember, rate));
            }
            if let Some(rate) = self.scopes.project_rate(project) {
                return Some((RateScope::Project, rate));
            }
        }

        if let Some(rate) = self.scopes.member_rate(entry.user_id, entry.organization_id) {
            return Some((RateScope::OrganizationMember, rate));
        }

        self.scopes
            .organization_rate(entry.organization_id)
            .map(|rate| (RateScope::Organization, rate))
    }

    /// Store the resolved rate on the entry, returning whether it changed
    pub fn materialize(&self, entry: &mut TimeEntry) -> bool {
        let resolved = self.resolve(entry);
        if entry.billable_rate == resolved {
            return false;
        }
        entry.billable_rate = resolved;
        true
    }

    /// Re-materialize the rate of every entry affected by `scope`
    ///
    /// Returns how many stored rates changed.
    pub fn reapply(&self, entries: &mut [TimeEntry], scope: RateUpdateScope) -> usize {
        let mut changed = 0;
        for entry in entries.iter_mut().filter(|entry| scope.affects(entry)) {
            if self.materialize(entry) {
                changed += 1;
            }
        }
        debug!(?scope, changed, "Reapplied billable rates");
        changed
    }
}
