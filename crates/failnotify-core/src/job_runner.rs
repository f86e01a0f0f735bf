//! Core build script execution with expected-failure classification.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::domain::error::{NotifyError, Result};
use crate::domain::request::{Incident, NotifyRequest};
use crate::vcs::{CommandOutput, CommandRunner, CommandSpec};

/// Shown in place of an empty expected-failure comment.
pub const NO_COMMENT: &str = "<no comment>";

pub fn expectfail_comment(comment: &str) -> String {
    if comment.trim().is_empty() {
        NO_COMMENT.to_string()
    } else {
        comment.to_string()
    }
}

/// How a script run compares with what was expected of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOutcome {
    ExpectedPass,
    ExpectedFailure { exit_code: i32, comment: String },
    UnexpectedPass { comment: String },
    UnexpectedFailure { exit_code: i32 },
}

impl ScriptOutcome {
    /// `expectfail` is the operator's comment when the job is expected to
    /// fail.
    pub fn classify(exit_code: i32, expectfail: Option<&str>) -> Self {
        match (exit_code == 0, expectfail) {
            (true, None) => ScriptOutcome::ExpectedPass,
            (true, Some(c)) => ScriptOutcome::UnexpectedPass {
                comment: expectfail_comment(c),
            },
            (false, None) => ScriptOutcome::UnexpectedFailure { exit_code },
            (false, Some(c)) => ScriptOutcome::ExpectedFailure {
                exit_code,
                comment: expectfail_comment(c),
            },
        }
    }

    pub fn is_unexpected(&self) -> bool {
        self.incident().is_some()
    }

    /// The incident to report, if the outcome was unexpected.
    pub fn incident(&self) -> Option<Incident> {
        match self {
            ScriptOutcome::UnexpectedPass { comment } => Some(Incident::UnexpectedPass {
                comment: comment.clone(),
            }),
            ScriptOutcome::UnexpectedFailure { .. } => Some(Incident::BuildFailed),
            _ => None,
        }
    }

    /// Notification request for `job`/`build` when the outcome was
    /// unexpected.
    pub fn notify_request(&self, job: &str, build: u64) -> Option<NotifyRequest> {
        match self {
            ScriptOutcome::UnexpectedPass { comment } => {
                Some(NotifyRequest::unexpected_pass(job, build, comment.clone()))
            }
            ScriptOutcome::UnexpectedFailure { .. } => Some(NotifyRequest::build_failed(job, build)),
            _ => None,
        }
    }
}

/// A finished script run.
#[derive(Debug, Clone)]
pub struct ScriptRun {
    pub script: PathBuf,
    pub output: CommandOutput,
    pub outcome: ScriptOutcome,
    pub duration_ms: u64,
}

/// Runs `<scripts>/jobs/<job>` and classifies the result.
pub struct JobRunner {
    runner: Arc<dyn CommandRunner>,
    scripts_dir: PathBuf,
}

impl JobRunner {
    pub fn new(runner: Arc<dyn CommandRunner>, scripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            scripts_dir: scripts_dir.into(),
        }
    }

    pub fn script_path(&self, job: &str) -> PathBuf {
        self.scripts_dir.join("jobs").join(job)
    }

    /// Run the core build script of `job`.
    ///
    /// A script that cannot be started is an error; any exit code is a
    /// classified outcome.
    pub async fn run(&self, job: &str, expectfail: Option<&str>) -> Result<ScriptRun> {
        let script = self.script_path(job);
        let start = Instant::now();
        let output = self
            .runner
            .run(&CommandSpec::new(script.to_string_lossy(), Vec::<String>::new()))
            .await
            .map_err(|e| script_error(&script, e))?;
        let duration_ms = start.elapsed().as_millis() as u64;

        let outcome = ScriptOutcome::classify(output.exit_code, expectfail);
        log_outcome(&script, &outcome, duration_ms);
        Ok(ScriptRun {
            script,
            output,
            outcome,
            duration_ms,
        })
    }
}

fn script_error(script: &Path, e: NotifyError) -> NotifyError {
    let detail = match e {
        NotifyError::VcsCommand { detail, .. } => detail,
        other => other.to_string(),
    };
    NotifyError::JobScript {
        path: script.to_path_buf(),
        detail,
    }
}

fn log_outcome(script: &Path, outcome: &ScriptOutcome, duration_ms: u64) {
    let script = script.display();
    match outcome {
        ScriptOutcome::ExpectedPass => {
            info!(event = "job.passed", script = %script, duration_ms = duration_ms);
        }
        ScriptOutcome::ExpectedFailure { exit_code, comment } => {
            info!(
                event = "job.expected_failure",
                script = %script,
                exit_code = exit_code,
                duration_ms = duration_ms,
                "failed, but this was expected: {comment}"
            );
        }
        ScriptOutcome::UnexpectedPass { comment } => {
            error!(
                event = "job.unexpected_pass",
                script = %script,
                duration_ms = duration_ms,
                "passed unexpectedly: {comment}"
            );
        }
        ScriptOutcome::UnexpectedFailure { exit_code } => {
            warn!(
                event = "job.failed",
                script = %script,
                exit_code = exit_code,
                duration_ms = duration_ms
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedRunner;

    #[test]
    fn classification_covers_all_four_cases() {
        assert_eq!(ScriptOutcome::classify(0, None), ScriptOutcome::ExpectedPass);
        assert_eq!(
            ScriptOutcome::classify(2, None),
            ScriptOutcome::UnexpectedFailure { exit_code: 2 }
        );
        assert_eq!(
            ScriptOutcome::classify(1, Some("known bug")),
            ScriptOutcome::ExpectedFailure {
                exit_code: 1,
                comment: "known bug".to_string()
            }
        );
        assert_eq!(
            ScriptOutcome::classify(0, Some("  ")),
            ScriptOutcome::UnexpectedPass {
                comment: NO_COMMENT.to_string()
            }
        );
    }

    #[test]
    fn only_unexpected_outcomes_notify() {
        assert!(ScriptOutcome::ExpectedPass.notify_request("diana", 5).is_none());
        assert!(!ScriptOutcome::classify(1, Some("x")).is_unexpected());

        let req = ScriptOutcome::classify(0, Some("flaky"))
            .notify_request("diana", 5)
            .unwrap();
        assert_eq!(
            req.incident,
            Incident::UnexpectedPass {
                comment: "flaky".to_string()
            }
        );
        let req = ScriptOutcome::classify(3, None)
            .notify_request("diana", 5)
            .unwrap();
        assert_eq!(req.incident, Incident::BuildFailed);
        assert_eq!(req.build, 5);
    }

    #[tokio::test]
    async fn test_run_uses_jobs_directory() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond("/scripts/jobs/diana", CommandOutput::failed(4, "boom"));
        let job_runner = JobRunner::new(runner.clone(), "/scripts");

        let run = job_runner.run("diana", None).await.unwrap();
        assert_eq!(run.outcome, ScriptOutcome::UnexpectedFailure { exit_code: 4 });
        assert_eq!(run.output.stderr, "boom");
        assert_eq!(runner.calls()[0].program, "/scripts/jobs/diana");
    }

    #[tokio::test]
    async fn test_unstartable_script_is_an_error() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.fail_to_spawn("jobs/diana", "failed to spawn: permission denied");
        let job_runner = JobRunner::new(runner, "/scripts");

        let err = job_runner.run("diana", None).await.unwrap_err();
        match err {
            NotifyError::JobScript { path, detail } => {
                assert_eq!(path, PathBuf::from("/scripts/jobs/diana"));
                assert!(detail.contains("permission denied"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_real_script_output_is_captured() {
        use crate::vcs::ProcessRunner;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("jobs")).unwrap();
        let script = dir.path().join("jobs").join("tseries");
        std::fs::write(&script, "#!/bin/sh\necho building\nexit 0\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let job_runner = JobRunner::new(Arc::new(ProcessRunner::new()), dir.path());
        let run = job_runner.run("tseries", Some("")).await.unwrap();
        assert!(run.output.stdout.contains("building"));
        assert_eq!(
            run.outcome,
            ScriptOutcome::UnexpectedPass {
                comment: NO_COMMENT.to_string()
            }
        );
    }
}
