//! Build records read from the build server's persisted metadata.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Version control systems a job can check out from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VcsKind {
    /// Linear integer revisions.
    Subversion,
    /// Content-addressed commit hashes.
    Git,
}

impl VcsKind {
    pub fn name(&self) -> &'static str {
        match self {
            VcsKind::Subversion => "svn",
            VcsKind::Git => "git",
        }
    }
}

impl fmt::Display for VcsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A revision identifier. Numbers are ordered within one repository,
/// hashes are opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Revision {
    Number(u64),
    Hash(String),
}

impl Revision {
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Revision::Number(n) => Some(*n),
            Revision::Hash(_) => None,
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::Number(n) => write!(f, "{n}"),
            Revision::Hash(h) => f.write_str(h),
        }
    }
}

/// A source repository and the VCS used to query it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryReference {
    pub url: String,
    pub kind: VcsKind,
}

impl RepositoryReference {
    pub fn new(url: impl Into<String>, kind: VcsKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }

    pub fn svn(url: impl Into<String>) -> Self {
        Self::new(url, VcsKind::Subversion)
    }

    pub fn git(url: impl Into<String>) -> Self {
        Self::new(url, VcsKind::Git)
    }
}

/// The revision a build checked out from one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedRevision {
    pub repository: RepositoryReference,
    pub revision: Revision,
}

/// Reference to an upstream build listed among a build's causes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpstreamRef {
    pub job: String,
    pub build: u64,
}

/// A single build of a job as recorded in its `build.xml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub job: String,
    pub number: u64,
    /// Revisions per repository, in document order. Each URL appears once.
    pub revisions: Vec<RecordedRevision>,
    /// Upstream builds in document order (nearest first).
    pub upstream: Vec<UpstreamRef>,
}

impl BuildRecord {
    pub fn revision_for(&self, url: &str) -> Option<&RecordedRevision> {
        self.revisions.iter().find(|r| r.repository.url == url)
    }
}

/// Everything known about the last successful build of a target job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPass {
    pub target_job: String,
    /// Build number of the target job's last successful build.
    pub target_build: u64,
    /// Source builds: the local (or product) build first, then upstream
    /// builds in discovery order. Each job appears at most once.
    pub sources: Vec<BuildRecord>,
}

impl LastPass {
    /// Build number of `job` associated with the last pass, if it is a source.
    pub fn build_of(&self, job: &str) -> Option<u64> {
        if job == self.target_job {
            return Some(self.target_build);
        }
        self.sources.iter().find(|b| b.job == job).map(|b| b.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_display() {
        assert_eq!(Revision::Number(4711).to_string(), "4711");
        assert_eq!(Revision::Hash("9fceb02".to_string()).to_string(), "9fceb02");
    }

    #[test]
    fn revision_serializes_untagged() {
        let v = serde_json::to_value(Revision::Number(12)).unwrap();
        assert_eq!(v, serde_json::json!(12));
        let v = serde_json::to_value(Revision::Hash("abc".to_string())).unwrap();
        assert_eq!(v, serde_json::json!("abc"));
    }

    #[test]
    fn last_pass_build_lookup() {
        let lp = LastPass {
            target_job: "tests".to_string(),
            target_build: 40,
            sources: vec![BuildRecord {
                job: "product".to_string(),
                number: 7,
                revisions: vec![],
                upstream: vec![],
            }],
        };
        assert_eq!(lp.build_of("tests"), Some(40));
        assert_eq!(lp.build_of("product"), Some(7));
        assert_eq!(lp.build_of("other"), None);
    }
}
