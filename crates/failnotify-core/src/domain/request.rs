//! What a notification run is asked to report.

use serde::{Deserialize, Serialize};

/// Why the run was triggered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Incident {
    /// The core build script of the job failed.
    BuildFailed,
    /// The job was expected to fail but passed.
    UnexpectedPass { comment: String },
    /// A test job failed against a product build.
    TestFailed { product: String },
}

/// Which builds supply the repositories to harvest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceSelection {
    /// The job's own last pass and its upstream builds.
    Local,
    /// The product build that was the nearest upstream of the job's last
    /// pass, plus that build's upstreams.
    Product(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyRequest {
    pub job: String,
    pub build: u64,
    pub incident: Incident,
    pub source: SourceSelection,
}

impl NotifyRequest {
    pub fn build_failed(job: impl Into<String>, build: u64) -> Self {
        Self {
            job: job.into(),
            build,
            incident: Incident::BuildFailed,
            source: SourceSelection::Local,
        }
    }

    pub fn unexpected_pass(job: impl Into<String>, build: u64, comment: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            build,
            incident: Incident::UnexpectedPass {
                comment: comment.into(),
            },
            source: SourceSelection::Local,
        }
    }

    pub fn test_failed(test_job: impl Into<String>, build: u64, product: impl Into<String>) -> Self {
        let product = product.into();
        Self {
            job: test_job.into(),
            build,
            incident: Incident::TestFailed {
                product: product.clone(),
            },
            source: SourceSelection::Product(product),
        }
    }
}
