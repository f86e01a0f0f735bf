//! Revision lookup for a job's last successful build.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, info};

use crate::domain::build::{BuildRecord, LastPass};
use crate::domain::error::{NotifyError, Result};
use crate::jenkins::JenkinsHome;

/// Finds the revisions that were current at a job's last pass, for the job
/// itself and for every upstream job its build refers to.
pub struct RevisionLocator<'a> {
    home: &'a JenkinsHome,
}

impl<'a> RevisionLocator<'a> {
    pub fn new(home: &'a JenkinsHome) -> Self {
        Self { home }
    }

    /// Last pass of `job`: its own build first, then upstream builds.
    pub fn locate(&self, job: &str) -> Result<LastPass> {
        let local = self.home.last_successful_build(job)?;
        let target_build = local.number;
        let sources = self.with_upstream(local, &[])?;
        info!(
            event = "locate.done",
            job = %job,
            build = target_build,
            sources = sources.len(),
        );
        Ok(LastPass {
            target_job: job.to_string(),
            target_build,
            sources,
        })
    }

    /// Last pass of a test job whose nearest upstream is `product`. The
    /// product build used by that test run becomes the first source.
    pub fn locate_via_product(&self, test_job: &str, product: &str) -> Result<LastPass> {
        let test = self.home.last_successful_build(test_job)?;
        let nearest = test.upstream.first().ok_or_else(|| NotifyError::UpstreamMismatch {
            detail: format!(
                "last successful build #{} of {} has no upstream build",
                test.number, test_job
            ),
        })?;
        if nearest.job != product {
            return Err(NotifyError::UpstreamMismatch {
                detail: format!(
                    "nearest upstream job of {} is {:?}, expected {:?}",
                    test_job, nearest.job, product
                ),
            });
        }
        let product_build = self.upstream_build(&nearest.job, nearest.build)?;
        let sources = self.with_upstream(product_build, &[test_job])?;
        Ok(LastPass {
            target_job: test_job.to_string(),
            target_build: test.number,
            sources,
        })
    }

    /// `first` followed by its transitive upstream builds, each job once.
    fn with_upstream(&self, first: BuildRecord, exclude: &[&str]) -> Result<Vec<BuildRecord>> {
        let mut seen: HashSet<String> = exclude.iter().map(|j| j.to_string()).collect();
        seen.insert(first.job.clone());

        let mut queue: VecDeque<_> = first.upstream.iter().cloned().collect();
        let mut sources = vec![first];

        while let Some(next) = queue.pop_front() {
            if !seen.insert(next.job.clone()) {
                debug!(job = %next.job, build = next.build, "upstream job already visited");
                continue;
            }
            let record = self.upstream_build(&next.job, next.build)?;
            queue.extend(record.upstream.iter().cloned());
            sources.push(record);
        }
        Ok(sources)
    }

    fn upstream_build(&self, job: &str, build: u64) -> Result<BuildRecord> {
        let record = self.home.build(job, build)?;
        if record.number != build {
            return Err(NotifyError::UpstreamMismatch {
                detail: format!(
                    "{} build #{} records number {}",
                    job, build, record.number
                ),
            });
        }
        Ok(record)
    }
}
