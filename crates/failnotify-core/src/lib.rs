//! failnotify core library
//!
//! Finds the people who may have broken a build server job and mails each
//! of them a report of the changes made since the job last passed.

pub mod catalog;
pub mod config;
pub mod domain;
pub mod fakes;
pub mod jenkins;
pub mod job_runner;
pub mod locator;
pub mod mail;
pub mod obs;
pub mod pipeline;
pub mod recipients;
pub mod report;
pub mod telemetry;
pub mod vcs;

mod xml;

pub use domain::{
    BuildRecord, Commit, HarvestStatus, Incident, JobChanges, LastPass, NotifyError,
    NotifyRequest, RecordedRevision, RepositoryChanges, RepositoryReference, Result, Revision,
    SourceSelection, UpstreamRef, VcsKind,
};

pub use catalog::{
    expect_fail_report, list_jobs, render_job_table, ExpectFailReport, JobEntry, JobRow,
};
pub use config::NotifierConfig;
pub use jenkins::{JenkinsHome, JobConfig};
pub use job_runner::{JobRunner, ScriptOutcome, ScriptRun};
pub use locator::RevisionLocator;
pub use mail::{DryRunMailer, Mailer, OutgoingMail, SmtpMailer};
pub use pipeline::{DeliveryFailure, FailureNotifier, NotificationSummary};
pub use recipients::{AddressRules, Recipients};
pub use report::{LinkRule, ReportRenderer, RevisionLinks};
pub use vcs::{CommandOutput, CommandRunner, CommandSpec, CommitHarvester, ProcessRunner};

pub use obs::{emit_notify_failed, emit_notify_finished, emit_notify_sent, RecipientRole};
pub use telemetry::init_tracing;

/// failnotify version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
