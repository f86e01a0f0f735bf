//! The notification pipeline: locate, harvest, resolve, render, send.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::config::NotifierConfig;
use crate::domain::build::LastPass;
use crate::domain::commit::JobChanges;
use crate::domain::error::{NotifyError, Result};
use crate::domain::request::{NotifyRequest, SourceSelection};
use crate::jenkins::JenkinsHome;
use crate::locator::RevisionLocator;
use crate::mail::{Mailer, OutgoingMail};
use crate::obs::{self, RecipientRole};
use crate::recipients::{self, AddressRules};
use crate::report::{self, ReportInput, ReportRenderer, RevisionLinks};
use crate::vcs::{CommandRunner, CommitHarvester};

/// A send that did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFailure {
    pub recipient: String,
    pub error: String,
}

/// Outcome of a run: who was notified and which sends failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSummary {
    pub candidate_committers: Vec<String>,
    pub fixed_recipients: Vec<String>,
    pub failures: Vec<DeliveryFailure>,
}

impl NotificationSummary {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Human-readable report for stdout.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        push_group(
            &mut out,
            "notified",
            self.candidate_committers.len(),
            "candidate committer",
            &self.candidate_committers,
        );
        push_group(
            &mut out,
            "notified",
            self.fixed_recipients.len(),
            "fixed recipient",
            &self.fixed_recipients,
        );
        if !self.failures.is_empty() {
            let lines: Vec<String> = self
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.recipient, f.error))
                .collect();
            push_group(&mut out, "failed to notify", lines.len(), "recipient", &lines);
        }
        out
    }
}

fn push_group(out: &mut String, verb: &str, count: usize, noun: &str, lines: &[String]) {
    let plural = if count == 1 { "" } else { "s" };
    out.push_str(&format!("{verb} {count} {noun}{plural}:\n"));
    for line in lines {
        out.push_str(&format!("  {line}\n"));
    }
}

impl fmt::Display for NotificationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_text())
    }
}

/// Runs notification requests against one build server home.
pub struct FailureNotifier {
    home: JenkinsHome,
    harvester: CommitHarvester,
    mailer: Arc<dyn Mailer>,
    renderer: ReportRenderer,
    addresses: AddressRules,
    config: NotifierConfig,
}

impl FailureNotifier {
    pub fn new(
        home: JenkinsHome,
        runner: Arc<dyn CommandRunner>,
        mailer: Arc<dyn Mailer>,
        config: NotifierConfig,
    ) -> Result<Self> {
        let addresses = AddressRules::new(config.svn_mail_domain.clone());
        let links = RevisionLinks::compile(&config.link_rules)?;
        let renderer = ReportRenderer::new(&config.jenkins_url, links, addresses.clone())?;
        Ok(Self {
            home,
            harvester: CommitHarvester::new(runner),
            mailer,
            renderer,
            addresses,
            config,
        })
    }

    /// Run the whole pipeline for `request`.
    ///
    /// Metadata errors abort the run before anything is sent. VCS errors
    /// only mark the affected repository, and send errors are collected in
    /// the summary.
    pub async fn notify(&self, request: &NotifyRequest) -> Result<NotificationSummary> {
        let span = obs::notify_span(request);
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: &NotifyRequest) -> Result<NotificationSummary> {
        obs::emit_notify_started(request);

        let last_pass = match self.locate(request) {
            Ok(last_pass) => Some(last_pass),
            Err(NotifyError::NoSuccessfulBuild { job }) if self.config.notify_never_passed => {
                obs::emit_never_passed(&job);
                None
            }
            Err(e) => return Err(e),
        };

        let changes: Vec<JobChanges> = match &last_pass {
            Some(lp) => self.harvester.harvest_all(&self.home, lp).await,
            None => Vec::new(),
        };

        let fixed = self.home.fixed_recipients(&request.job)?;
        let from = match &self.config.from {
            Some(from) => from.clone(),
            None => self.home.admin_address()?,
        };
        let recipients = recipients::resolve(&changes, &fixed, &self.addresses);

        let input = ReportInput {
            request,
            last_pass: last_pass.as_ref(),
            changes: &changes,
        };
        let mut summary = NotificationSummary::default();

        let subject = report::candidate_subject(&request.job, request.build);
        for recipient in &recipients.candidates {
            let mail = OutgoingMail {
                from: from.clone(),
                to: recipient.clone(),
                subject: subject.clone(),
                html: self.renderer.candidate_report(&input, recipient)?,
            };
            if self.deliver(&mail, RecipientRole::Candidate, &mut summary).await {
                summary.candidate_committers.push(recipient.clone());
            }
        }

        let subject = report::fixed_subject(&request.job, request.build);
        let html = self.renderer.fixed_report(&input)?;
        for recipient in &recipients.fixed {
            let mail = OutgoingMail {
                from: from.clone(),
                to: recipient.clone(),
                subject: subject.clone(),
                html: html.clone(),
            };
            if self.deliver(&mail, RecipientRole::Fixed, &mut summary).await {
                summary.fixed_recipients.push(recipient.clone());
            }
        }

        obs::emit_notify_finished(
            summary.candidate_committers.len(),
            summary.fixed_recipients.len(),
            summary.failures.len(),
        );
        Ok(summary)
    }

    fn locate(&self, request: &NotifyRequest) -> Result<LastPass> {
        let locator = RevisionLocator::new(&self.home);
        match &request.source {
            SourceSelection::Local => locator.locate(&request.job),
            SourceSelection::Product(product) => locator.locate_via_product(&request.job, product),
        }
    }

    async fn deliver(
        &self,
        mail: &OutgoingMail,
        role: RecipientRole,
        summary: &mut NotificationSummary,
    ) -> bool {
        match self.mailer.send(mail).await {
            Ok(()) => {
                obs::emit_notify_sent(&mail.to, role);
                true
            }
            Err(e) => {
                obs::emit_notify_failed(&mail.to, role, &e);
                summary.failures.push(DeliveryFailure {
                    recipient: mail.to.clone(),
                    error: e.to_string(),
                });
                false
            }
        }
    }
}
