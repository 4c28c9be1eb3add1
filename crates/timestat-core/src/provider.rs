//! Provider traits for the persistence boundary
//!
//! The aggregation engine never talks to storage directly. A
//! [`TimeEntrySource`] streams the entries matching a [`TimeEntryFilter`], and
//! a [`RateScopeSource`] hands out the four rate-scope tables of an
//! organization in one batch so rate resolution does no per-entry I/O.

use crate::error::Result;
use crate::filters::TimeEntryFilter;
use crate::types::{Member, Organization, OrganizationId, Project, ProjectMember, TimeEntry};
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

/// Boxed stream of time entries
pub type EntryStream<'a> = Pin<Box<dyn Stream<Item = Result<TimeEntry>> + Send + 'a>>;

/// Source of filtered time entries
///
/// Dropping the returned stream abandons the read; implementations must not
/// perform writes while streaming.
pub trait TimeEntrySource: Send + Sync {
    /// Stream every entry matching `filter`
    fn load_entries(&self, filter: TimeEntryFilter) -> EntryStream<'_>;
}

/// Raw rate-scope rows of one organization
#[derive(Debug, Clone, Default)]
pub struct RateScopes {
    pub organizations: Vec<Organization>,
    pub members: Vec<Member>,
    pub projects: Vec<Project>,
    pub project_members: Vec<ProjectMember>,
}

/// Batch reader for rate-scope rows
#[async_trait]
pub trait RateScopeSource: Send + Sync {
    /// Load all rate scopes relevant to `organization_id`
    async fn load_rate_scopes(&self, organization_id: Option<OrganizationId>) -> Result<RateScopes>;
}
