//! Commit harvesting across the repositories of a last pass.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::{git, svn, CommandRunner};
use crate::domain::build::{LastPass, RepositoryReference, Revision, VcsKind};
use crate::domain::commit::{Commit, HarvestStatus, JobChanges, RepositoryChanges};
use crate::domain::error::{NotifyError, Result};
use crate::jenkins::JenkinsHome;

/// Queries version control for the commits made since a last pass.
#[derive(Clone)]
pub struct CommitHarvester {
    runner: Arc<dyn CommandRunner>,
}

impl CommitHarvester {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Commits in `repository` strictly newer than `since`, newest first.
    ///
    /// git runs in `workspace`, which must be a clone of the repository;
    /// Subversion queries the repository URL directly.
    pub async fn harvest(
        &self,
        repository: &RepositoryReference,
        since: &Revision,
        workspace: &Path,
    ) -> Result<Vec<Commit>> {
        let command = match repository.kind {
            VcsKind::Subversion => {
                let rev = since.as_number().ok_or_else(|| {
                    NotifyError::VcsOutput(format!(
                        "svn repository {} recorded non-numeric revision {since}",
                        repository.url
                    ))
                })?;
                svn::log_command(&repository.url, rev)
            }
            VcsKind::Git => git::log_command(workspace, &since.to_string()),
        };

        let output = self.runner.run(&command).await?;
        if !output.success() {
            return Err(NotifyError::VcsCommand {
                command: command.display(),
                detail: format!("exit code {}: {}", output.exit_code, output.stderr.trim()),
            });
        }

        match (repository.kind, since) {
            (VcsKind::Subversion, Revision::Number(rev)) => svn::parse_log(&output.stdout, *rev),
            _ => git::parse_log(&output.stdout),
        }
    }

    /// Like [`harvest`](Self::harvest), but a failed query becomes an empty
    /// commit list marked [`HarvestStatus::QueryFailed`].
    pub async fn changes(
        &self,
        repository: &RepositoryReference,
        since: &Revision,
        workspace: &Path,
    ) -> RepositoryChanges {
        let (commits, status) = match self.harvest(repository, since, workspace).await {
            Ok(commits) => (commits, HarvestStatus::Complete),
            Err(e) => {
                warn!(
                    event = "harvest.failed",
                    repository = %repository.url,
                    kind = %repository.kind,
                    error = %e,
                );
                (Vec::new(), HarvestStatus::QueryFailed(e.to_string()))
            }
        };
        info!(
            event = "harvest.done",
            repository = %repository.url,
            since = %since,
            commits = commits.len(),
        );
        RepositoryChanges {
            repository: repository.clone(),
            last_pass_revision: since.clone(),
            commits,
            status,
        }
    }

    /// Changes in every repository of every source build, in source order.
    pub async fn harvest_all(&self, home: &JenkinsHome, last_pass: &LastPass) -> Vec<JobChanges> {
        let mut jobs = Vec::with_capacity(last_pass.sources.len());
        for build in &last_pass.sources {
            let workspace = home.workspace(&build.job);
            let mut repositories = Vec::with_capacity(build.revisions.len());
            for recorded in &build.revisions {
                repositories.push(
                    self.changes(&recorded.repository, &recorded.revision, &workspace)
                        .await,
                );
            }
            jobs.push(JobChanges {
                job: build.job.clone(),
                build: build.number,
                repositories,
            });
        }
        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedRunner;
    use crate::vcs::CommandOutput;

    const SVN_LOG: &str = r#"<log>
<logentry revision="102"><author>bob</author><date>2013-05-02T08:00:00.000000Z</date><msg>b</msg></logentry>
<logentry revision="101"><author>alice</author><date>2013-05-01T08:00:00.000000Z</date><msg>a</msg></logentry>
<logentry revision="100"><author>carol</author><date>2013-04-30T08:00:00.000000Z</date><msg>c</msg></logentry>
</log>"#;

    #[tokio::test]
    async fn svn_harvest_excludes_last_pass_revision() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond("svn", CommandOutput::ok(SVN_LOG));
        let harvester = CommitHarvester::new(runner.clone());

        let commits = harvester
            .harvest(
                &RepositoryReference::svn("https://svn.met.no/diana/trunk"),
                &Revision::Number(100),
                Path::new("/nonexistent"),
            )
            .await
            .unwrap();

        assert_eq!(commits.len(), 2);
        assert!(commits
            .iter()
            .all(|c| c.revision.as_number().unwrap() > 100));
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].display().contains("-rHEAD:100"));
    }

    #[tokio::test]
    async fn git_harvest_runs_in_workspace() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond(
            "git",
            CommandOutput::ok("abc\u{1f}dev@met.no\u{1f}1367482530\u{1f}tweak\n"),
        );
        let harvester = CommitHarvester::new(runner.clone());

        let commits = harvester
            .harvest(
                &RepositoryReference::git("git://git.met.no/tseries.git"),
                &Revision::Hash("9fceb02".to_string()),
                Path::new("/jenkins/jobs/tseries/workspace"),
            )
            .await
            .unwrap();

        assert_eq!(commits.len(), 1);
        let calls = runner.calls();
        assert_eq!(
            calls[0].cwd.as_deref(),
            Some(Path::new("/jenkins/jobs/tseries/workspace"))
        );
        assert!(calls[0].args.contains(&"9fceb02..HEAD".to_string()));
    }

    #[tokio::test]
    async fn failed_query_is_downgraded_to_empty() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond("svn", CommandOutput::failed(1, "svn: E170013: Unable to connect"));
        let harvester = CommitHarvester::new(runner);

        let changes = harvester
            .changes(
                &RepositoryReference::svn("https://svn.met.no/diana/trunk"),
                &Revision::Number(100),
                Path::new("."),
            )
            .await;

        assert!(changes.commits.is_empty());
        assert!(changes.is_query_failed());
        match changes.status {
            HarvestStatus::QueryFailed(detail) => assert!(detail.contains("E170013")),
            HarvestStatus::Complete => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn no_new_commits_is_complete_and_empty() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond("git", CommandOutput::ok(""));
        let harvester = CommitHarvester::new(runner);

        let changes = harvester
            .changes(
                &RepositoryReference::git("git://git.met.no/tseries.git"),
                &Revision::Hash("abc".to_string()),
                Path::new("."),
            )
            .await;

        assert!(changes.commits.is_empty());
        assert_eq!(changes.status, HarvestStatus::Complete);
    }
}
