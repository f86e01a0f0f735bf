//! Commits harvested from version control and the changes grouped per job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::build::{RepositoryReference, Revision};

/// A single commit, normalized across VCS kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub revision: Revision,
    /// svn user name or git committer e-mail, as reported by the VCS.
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Outcome of querying one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum HarvestStatus {
    Complete,
    /// The query failed; the commit list is empty but not known to be.
    QueryFailed(String),
}

/// Commits landed in one repository since the last pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryChanges {
    pub repository: RepositoryReference,
    pub last_pass_revision: Revision,
    /// Newest first.
    pub commits: Vec<Commit>,
    pub status: HarvestStatus,
}

impl RepositoryChanges {
    pub fn is_query_failed(&self) -> bool {
        matches!(self.status, HarvestStatus::QueryFailed(_))
    }
}

/// Changes in the repositories of one source job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobChanges {
    pub job: String,
    /// Build of `job` associated with the target's last pass.
    pub build: u64,
    pub repositories: Vec<RepositoryChanges>,
}
