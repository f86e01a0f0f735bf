//! Structured observability hooks for notification runs.
//!
//! Every run gets one span carrying the job and build; the emit functions
//! log the lifecycle events inside it with a stable `event` field.

use tracing::{info, warn};

use crate::domain::request::NotifyRequest;

/// Recipient role used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientRole {
    Candidate,
    Fixed,
}

impl RecipientRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientRole::Candidate => "candidate",
            RecipientRole::Fixed => "fixed",
        }
    }
}

/// Span for one notification run.
pub fn notify_span(request: &NotifyRequest) -> tracing::Span {
    tracing::info_span!("failnotify.run", job = %request.job, build = request.build)
}

/// Span for one wrapped job script run.
pub fn job_span(job: &str, build: u64) -> tracing::Span {
    tracing::info_span!("failnotify.job", job = %job, build = build)
}

pub fn emit_notify_started(request: &NotifyRequest) {
    info!(event = "notify.started", incident = ?request.incident, source = ?request.source);
}

pub fn emit_never_passed(job: &str) {
    warn!(event = "notify.never_passed", job = %job);
}

pub fn emit_notify_sent(recipient: &str, role: RecipientRole) {
    info!(event = "notify.sent", recipient = %recipient, role = role.as_str());
}

/// Warning level: a failed send is recorded and the run continues.
pub fn emit_notify_failed(recipient: &str, role: RecipientRole, error: &dyn std::fmt::Display) {
    warn!(
        event = "notify.failed",
        recipient = %recipient,
        role = role.as_str(),
        error = %error,
    );
}

pub fn emit_notify_finished(candidates: usize, fixed: usize, failures: usize) {
    info!(
        event = "notify.finished",
        candidates = candidates,
        fixed = fixed,
        failures = failures,
    );
}
