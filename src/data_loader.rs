//! Data loader module for JSON timesheet datasets
//!
//! A dataset is one JSON document holding the rate-scope tables and the time
//! entries of one or more organizations:
//!
//! ```json
//! {
//!   "organizations": [{ "id": "…", "name": "Acme", "billable_rate": 10000 }],
//!   "members": [{ "user_id": "…", "organization_id": "…", "billable_rate": null }],
//!   "projects": [{ "id": "…", "organization_id": "…", "name": "Website" }],
//!   "project_members": [],
//!   "time_entries": [{ "id": "…", "user_id": "…", "organization_id": "…",
//!                      "start": "2024-01-01T09:00:00Z", "end": null, "billable": true }]
//! }
//! ```
//!
//! Every table is optional. The loader serves entries as a filtered stream
//! and hands out the rate scopes in one batch.
//!
//! # Examples
//!
//! ```no_run
//! use timestat::data_loader::DataLoader;
//! use timestat::filters::TimeEntryFilter;
//! use timestat::provider::TimeEntrySource;
//! use futures::StreamExt;
//!
//! # async fn example() -> timestat::Result<()> {
//! let loader = DataLoader::open("timesheet.json").await?;
//!
//! let entries = loader.load_entries(TimeEntryFilter::new().with_billable(true));
//! tokio::pin!(entries);
//! while let Some(result) = entries.next().await {
//!     let entry = result?;
//!     println!("{}: {}s", entry.id, entry.duration_seconds(chrono::Utc::now()));
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures::stream;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use timestat_core::error::{Result, TimestatError};
use timestat_core::filters::TimeEntryFilter;
use timestat_core::provider::{EntryStream, RateScopeSource, RateScopes, TimeEntrySource};
use timestat_core::types::{
    Member, Organization, OrganizationId, Project, ProjectId, ProjectMember, TimeEntry,
    TimeEntryId,
};
use tracing::{debug, info, warn};

/// Contents of a dataset file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub organizations: Vec<Organization>,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub project_members: Vec<ProjectMember>,
    #[serde(default)]
    pub time_entries: Vec<TimeEntry>,
}

impl Dataset {
    /// Ids of entries whose end lies before their start
    pub fn entries_with_invalid_range(&self) -> Vec<TimeEntryId> {
        self.time_entries
            .iter()
            .filter(|entry| !entry.has_valid_range())
            .map(|entry| entry.id)
            .collect()
    }

    /// Rate-scope rows, restricted to one organization when given
    pub fn rate_scopes(&self, organization_id: Option<OrganizationId>) -> RateScopes {
        let in_scope = |id: OrganizationId| organization_id.is_none_or(|wanted| wanted == id);

        let projects: Vec<Project> = self
            .projects
            .iter()
            .filter(|project| in_scope(project.organization_id))
            .cloned()
            .collect();
        let project_ids: HashSet<ProjectId> = projects.iter().map(|project| project.id).collect();

        RateScopes {
            organizations: self
                .organizations
                .iter()
                .filter(|organization| in_scope(organization.id))
                .cloned()
                .collect(),
            members: self
                .members
                .iter()
                .filter(|member| in_scope(member.organization_id))
                .cloned()
                .collect(),
            project_members: self
                .project_members
                .iter()
                .filter(|row| organization_id.is_none() || project_ids.contains(&row.project_id))
                .cloned()
                .collect(),
            projects,
        }
    }
}

/// Loader over a dataset file
///
/// The dataset is read once and kept in memory; [`DataLoader::save`] writes
/// it back, which the `rates --write` command uses after materializing rates.
pub struct DataLoader {
    path: Option<PathBuf>,
    dataset: Dataset,
}

impl DataLoader {
    /// Read and parse the dataset at `path`
    ///
    /// # Errors
    ///
    /// Returns [`TimestatError::Io`] if the file cannot be read and
    /// [`TimestatError::Parse`] if it is not a valid dataset.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = tokio::fs::read_to_string(&path).await?;
        let dataset: Dataset =
            serde_json::from_str(&raw).map_err(|e| TimestatError::Parse {
                file: path.clone(),
                error: e.to_string(),
            })?;

        let invalid = dataset.entries_with_invalid_range();
        if !invalid.is_empty() {
            warn!(
                path = %path.display(),
                count = invalid.len(),
                entries = ?invalid,
                "Time entries end before they start and count as zero seconds"
            );
        }

        info!(
            path = %path.display(),
            entries = dataset.time_entries.len(),
            organizations = dataset.organizations.len(),
            "Loaded dataset"
        );
        Ok(Self {
            path: Some(path),
            dataset,
        })
    }

    /// Loader over an in-memory dataset with no backing file
    pub fn from_dataset(dataset: Dataset) -> Self {
        Self {
            path: None,
            dataset,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn dataset_mut(&mut self) -> &mut Dataset {
        &mut self.dataset
    }

    /// Write the dataset back to the file it was opened from
    ///
    /// # Errors
    ///
    /// Returns [`TimestatError::Config`] for loaders built from memory.
    pub async fn save(&self) -> Result<()> {
        let path = self.path.as_ref().ok_or_else(|| {
            TimestatError::Config("dataset has no backing file to save to".to_string())
        })?;
        let serialized = serde_json::to_string_pretty(&self.dataset)?;
        tokio::fs::write(path, serialized).await?;
        debug!(path = %path.display(), "Saved dataset");
        Ok(())
    }
}

impl TimeEntrySource for DataLoader {
    fn load_entries(&self, filter: TimeEntryFilter) -> EntryStream<'_> {
        let entries = stream::iter(self.dataset.time_entries.iter().cloned().map(Ok));
        Box::pin(filter.filter_stream(entries))
    }
}

#[async_trait]
impl RateScopeSource for DataLoader {
    async fn load_rate_scopes(
        &self,
        organization_id: Option<OrganizationId>,
    ) -> Result<RateScopes> {
        let scopes = self.dataset.rate_scopes(organization_id);
        debug!(
            organization = ?organization_id,
            projects = scopes.projects.len(),
            members = scopes.members.len(),
            "Loaded rate scopes"
        );
        Ok(scopes)
    }
}
