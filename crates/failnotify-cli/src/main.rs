//! failnotify - build failure notification for Jenkins jobs
//!
//! ## Commands
//!
//! - `notify`: mail the candidate committers and fixed recipients of a failed build
//! - `notify-test`: the same for a test job that failed against a product build
//! - `run-job`: run a job's core build script and notify on unexpected outcomes
//! - `list-jobs`: list jobs with their node assignment
//! - `expect-fail-jobs`: group jobs by whether they are expected to fail

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, Instrument, Level};

use failnotify_core::obs::job_span;
use failnotify_core::{
    expect_fail_report, list_jobs, render_job_table, DryRunMailer, FailureNotifier, JenkinsHome,
    JobRunner, Mailer, NotificationSummary, NotifierConfig, NotifyRequest, ProcessRunner,
    SmtpMailer,
};

const EXIT_SUCCESS: u8 = 0;
/// Failed sends, or an unexpected job outcome. Fatal errors also exit 1.
const EXIT_FAILURE: u8 = 1;

#[derive(Parser)]
#[command(name = "failnotify")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Notify the people who may have broken a Jenkins job", long_about = None)]
#[command(args_override_self = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct ServerArgs {
    /// Jenkins home directory
    #[arg(long, env = "JENKINS_HOME")]
    jenkins_home: PathBuf,

    /// Jenkins base URL, used for links in the reports
    #[arg(long, env = "JENKINS_URL")]
    jenkins_url: String,
}

/// Mail and VCS options. Unset values come from the `FAILNOTIFY_*`
/// environment variables, then built-in defaults.
#[derive(Args, Debug, Clone, Default)]
struct MailArgs {
    /// Sender address (default: adminAddress of hudson.tasks.Mailer.xml)
    #[arg(long)]
    from: Option<String>,

    /// SMTP relay host [default: localhost]
    #[arg(long)]
    smtp_host: Option<String>,

    /// SMTP relay port [default: 25]
    #[arg(long)]
    smtp_port: Option<u16>,

    /// Domain appended to Subversion user names [default: met.no]
    #[arg(long)]
    svn_domain: Option<String>,

    /// Seconds before a VCS query is killed, 0 for no limit [default: 120]
    #[arg(long)]
    vcs_timeout: Option<u64>,

    /// Log the reports instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Notify fixed recipients even if the job has never passed
    #[arg(long)]
    notify_never_passed: bool,

    /// Print the summary as JSON
    #[arg(long)]
    summary_json: bool,
}

impl MailArgs {
    fn apply(&self, mut config: NotifierConfig) -> NotifierConfig {
        if let Some(from) = &self.from {
            config = config.with_from(from);
        }
        if let Some(host) = &self.smtp_host {
            let port = config.smtp_port;
            config = config.with_smtp(host, port);
        }
        if let Some(port) = self.smtp_port {
            let host = config.smtp_host.clone();
            config = config.with_smtp(&host, port);
        }
        if let Some(domain) = &self.svn_domain {
            config = config.with_svn_mail_domain(domain);
        }
        if let Some(secs) = self.vcs_timeout {
            config = config.with_vcs_timeout_secs(secs);
        }
        config.with_notify_never_passed(self.notify_never_passed)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Notify about a failed (or unexpectedly passed) build of a job
    #[command(args_override_self = true)]
    Notify {
        #[command(flatten)]
        server: ServerArgs,

        /// Failed job
        #[arg(long)]
        job: String,

        /// Failed build number
        #[arg(long)]
        build: u64,

        /// The job passed although it was expected to fail for this reason
        #[arg(long)]
        xpass: Option<String>,

        #[command(flatten)]
        mail: MailArgs,
    },

    /// Notify about a test job that failed against a product build
    #[command(args_override_self = true)]
    NotifyTest {
        #[command(flatten)]
        server: ServerArgs,

        /// Product job whose changes are reported
        #[arg(long)]
        product: String,

        /// Failed test job
        #[arg(long)]
        test: String,

        /// Failed test build number
        #[arg(long)]
        test_build: u64,

        #[command(flatten)]
        mail: MailArgs,
    },

    /// Run a job's core build script and notify if the outcome is unexpected
    #[command(args_override_self = true)]
    RunJob {
        /// Job whose script is run from <scripts-path>/jobs/
        #[arg(long)]
        job: String,

        /// The script is expected to fail, for this reason
        #[arg(long)]
        expectfail: Option<String>,

        /// Directory holding the jobs/ scripts
        #[arg(long, env = "JENKINS_SCRIPTS_PATH")]
        scripts_path: PathBuf,

        #[arg(long, env = "JENKINS_HOME")]
        jenkins_home: Option<PathBuf>,

        #[arg(long, env = "JENKINS_URL")]
        jenkins_url: Option<String>,

        /// Job to report on (default: --job)
        #[arg(long, env = "JOB_NAME")]
        job_name: Option<String>,

        #[arg(long, env = "BUILD_NUMBER")]
        build_number: Option<u64>,

        #[command(flatten)]
        mail: MailArgs,
    },

    /// List jobs with their primary node
    #[command(args_override_self = true)]
    ListJobs {
        #[arg(long, env = "JENKINS_HOME")]
        jenkins_home: PathBuf,
    },

    /// Show which jobs are expected to fail
    #[command(args_override_self = true)]
    ExpectFailJobs {
        #[arg(long, env = "JENKINS_HOME")]
        jenkins_home: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    failnotify_core::init_tracing(cli.json, level);

    let code = match cli.command {
        Commands::Notify {
            server,
            job,
            build,
            xpass,
            mail,
        } => {
            let request = match xpass {
                Some(comment) => NotifyRequest::unexpected_pass(job, build, comment),
                None => NotifyRequest::build_failed(job, build),
            };
            cmd_notify(&server.jenkins_home, &server.jenkins_url, &mail, &request).await
        }
        Commands::NotifyTest {
            server,
            product,
            test,
            test_build,
            mail,
        } => {
            let request = NotifyRequest::test_failed(test, test_build, product);
            cmd_notify(&server.jenkins_home, &server.jenkins_url, &mail, &request).await
        }
        Commands::RunJob {
            job,
            expectfail,
            scripts_path,
            jenkins_home,
            jenkins_url,
            job_name,
            build_number,
            mail,
        } => {
            let target = RunJobTarget {
                jenkins_home,
                jenkins_url,
                job_name: job_name.unwrap_or_else(|| job.clone()),
                build_number,
            };
            cmd_run_job(&scripts_path, &job, expectfail.as_deref(), &target, &mail).await
        }
        Commands::ListJobs { jenkins_home } => cmd_list_jobs(&jenkins_home),
        Commands::ExpectFailJobs { jenkins_home } => cmd_expect_fail_jobs(&jenkins_home),
    }?;
    Ok(ExitCode::from(code))
}

fn build_notifier(
    jenkins_home: &std::path::Path,
    jenkins_url: &str,
    mail: &MailArgs,
) -> Result<FailureNotifier> {
    let config = mail.apply(NotifierConfig::from_env().with_jenkins_url(jenkins_url));
    let runner = Arc::new(ProcessRunner::new().with_timeout_secs(config.vcs_timeout_secs));
    let mailer: Arc<dyn Mailer> = if mail.dry_run {
        Arc::new(DryRunMailer)
    } else {
        Arc::new(SmtpMailer::new(&config.smtp_host, config.smtp_port))
    };
    FailureNotifier::new(JenkinsHome::new(jenkins_home), runner, mailer, config)
        .context("Invalid notifier configuration")
}

fn print_summary(summary: &NotificationSummary, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
        println!("{out}");
    } else {
        print!("{}", summary.render_text());
    }
    Ok(())
}

async fn cmd_notify(
    jenkins_home: &std::path::Path,
    jenkins_url: &str,
    mail: &MailArgs,
    request: &NotifyRequest,
) -> Result<u8> {
    let notifier = build_notifier(jenkins_home, jenkins_url, mail)?;
    let summary = notifier
        .notify(request)
        .await
        .with_context(|| format!("Failed to notify about {} #{}", request.job, request.build))?;
    print_summary(&summary, mail.summary_json)?;

    if summary.has_failures() {
        Ok(EXIT_FAILURE)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Where `run-job` reports an unexpected outcome.
struct RunJobTarget {
    jenkins_home: Option<PathBuf>,
    jenkins_url: Option<String>,
    job_name: String,
    build_number: Option<u64>,
}

async fn cmd_run_job(
    scripts_path: &std::path::Path,
    job: &str,
    expectfail: Option<&str>,
    target: &RunJobTarget,
    mail: &MailArgs,
) -> Result<u8> {
    let span = job_span(&target.job_name, target.build_number.unwrap_or(0));
    run_job(scripts_path, job, expectfail, target, mail)
        .instrument(span)
        .await
}

async fn run_job(
    scripts_path: &std::path::Path,
    job: &str,
    expectfail: Option<&str>,
    target: &RunJobTarget,
    mail: &MailArgs,
) -> Result<u8> {
    let runner = JobRunner::new(Arc::new(ProcessRunner::new()), scripts_path);
    let run = runner
        .run(job, expectfail)
        .await
        .context("Failed to run core build script")?;

    print!("{}", run.output.stdout);
    eprint!("{}", run.output.stderr);

    let build = target.build_number.unwrap_or(0);
    let Some(request) = run.outcome.notify_request(&target.job_name, build) else {
        return Ok(EXIT_SUCCESS);
    };

    info!(event = "job.notifying", job = %request.job, build = request.build);
    match notify_unexpected(target, mail, &request).await {
        Ok(summary) => {
            info!(event = "job.notified", "notification succeeded");
            print_summary(&summary, mail.summary_json)?;
        }
        Err(e) => error!(event = "job.notify_failed", "notification failed: {e:#}"),
    }
    Ok(EXIT_FAILURE)
}

async fn notify_unexpected(
    target: &RunJobTarget,
    mail: &MailArgs,
    request: &NotifyRequest,
) -> Result<NotificationSummary> {
    let home = target
        .jenkins_home
        .as_deref()
        .context("JENKINS_HOME is required to notify")?;
    let url = target
        .jenkins_url
        .as_deref()
        .context("JENKINS_URL is required to notify")?;
    target
        .build_number
        .context("BUILD_NUMBER is required to notify")?;

    let notifier = build_notifier(home, url, mail)?;
    let summary = notifier.notify(request).await?;
    Ok(summary)
}

fn cmd_list_jobs(jenkins_home: &std::path::Path) -> Result<u8> {
    let rows = list_jobs(&JenkinsHome::new(jenkins_home)).context("Failed to list jobs")?;
    print!("{}", render_job_table(&rows));
    Ok(EXIT_SUCCESS)
}

fn cmd_expect_fail_jobs(jenkins_home: &std::path::Path) -> Result<u8> {
    let report = expect_fail_report(&JenkinsHome::new(jenkins_home))
        .context("Failed to read job configurations")?;
    print!("{}", report.render_text());
    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn repeated_flag_last_occurrence_wins() {
        let cli = Cli::try_parse_from([
            "failnotify",
            "notify",
            "--jenkins-home",
            "/a",
            "--jenkins-url",
            "http://j",
            "--job",
            "diana",
            "--job",
            "fimex",
            "--build",
            "3",
            "--build",
            "4",
        ])
        .unwrap();
        match cli.command {
            Commands::Notify { job, build, .. } => {
                assert_eq!(job, "fimex");
                assert_eq!(build, 4);
            }
            _ => panic!("expected notify"),
        }
    }

    #[test]
    fn unknown_flag_is_rejected() {
        let err = Cli::try_parse_from([
            "failnotify",
            "list-jobs",
            "--jenkins-home",
            "/a",
            "--jenkinshome",
            "/b",
        ])
        .err()
        .unwrap();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn mail_args_override_config() {
        let args = MailArgs {
            smtp_host: Some("relay".to_string()),
            smtp_port: Some(2525),
            vcs_timeout: Some(0),
            notify_never_passed: true,
            ..MailArgs::default()
        };
        let config = args.apply(NotifierConfig::new("http://j"));
        assert_eq!(config.smtp_host, "relay");
        assert_eq!(config.smtp_port, 2525);
        assert_eq!(config.vcs_timeout_secs, 0);
        assert!(config.notify_never_passed);
        assert_eq!(config.svn_mail_domain, "met.no");
    }

    #[test]
    fn test_list_jobs_on_empty_home() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("jobs")).unwrap();
        assert_eq!(cmd_list_jobs(dir.path()).unwrap(), EXIT_SUCCESS);
    }

    #[test]
    fn test_list_jobs_without_jobs_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(cmd_list_jobs(dir.path()).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_expected_failure_exits_zero() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("jobs")).unwrap();
        let script = dir.path().join("jobs").join("diana");
        std::fs::write(&script, "#!/bin/sh\nexit 3\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let target = RunJobTarget {
            jenkins_home: None,
            jenkins_url: None,
            job_name: "diana".to_string(),
            build_number: None,
        };
        let code = cmd_run_job(
            dir.path(),
            "diana",
            Some("known bug"),
            &target,
            &MailArgs::default(),
        )
        .await
        .unwrap();
        assert_eq!(code, EXIT_SUCCESS);

        let code = cmd_run_job(dir.path(), "diana", None, &target, &MailArgs::default())
            .await
            .unwrap();
        assert_eq!(code, EXIT_FAILURE);
    }
}
