//! Mail transport for rendered reports.

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::error::{NotifyError, Result};

/// Plain-text alternative for clients that do not render HTML.
pub const PLAIN_TEXT_NOTICE: &str =
    "Warning: plain text not supported - please enable HTML in the email client";

/// A single rendered report addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Delivers reports. Implementations must not retry; the caller records
/// failures per recipient.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

fn mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse::<Mailbox>()
        .map_err(|e| NotifyError::InvalidAddress {
            address: address.to_string(),
            detail: e.to_string(),
        })
}

/// Build the multipart/alternative message for `mail`.
pub fn build_message(mail: &OutgoingMail) -> Result<Message> {
    Message::builder()
        .from(mailbox(&mail.from)?)
        .to(mailbox(&mail.to)?)
        .subject(mail.subject.clone())
        .multipart(MultiPart::alternative_plain_html(
            PLAIN_TEXT_NOTICE.to_string(),
            mail.html.clone(),
        ))
        .map_err(|e| NotifyError::Mail(e.to_string()))
}

/// Sends through an SMTP relay without TLS or authentication, as offered
/// by a local MTA.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    relay: String,
}

impl SmtpMailer {
    pub fn new(host: &str, port: u16) -> Self {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .build();
        Self {
            transport,
            relay: format!("{host}:{port}"),
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let message = build_message(mail)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Mail(format!("relay {}: {e}", self.relay)))?;
        Ok(())
    }
}

/// Logs what would have been sent. Messages are still built so address
/// errors surface the same way as with a real relay.
#[derive(Debug, Clone, Default)]
pub struct DryRunMailer;

#[async_trait]
impl Mailer for DryRunMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        build_message(mail)?;
        info!(
            event = "notify.dry_run",
            to = %mail.to,
            subject = %mail.subject,
            html_bytes = mail.html.len(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(to: &str) -> OutgoingMail {
        OutgoingMail {
            from: "Jenkins <jenkins@met.no>".to_string(),
            to: to.to_string(),
            subject: "Jenkins alert: diana #58 failed".to_string(),
            html: "<html><body>report</body></html>".to_string(),
        }
    }

    #[test]
    fn message_is_multipart_alternative() {
        let message = build_message(&mail("alice@met.no")).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Jenkins alert: diana #58 failed"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains("To: alice@met.no"));
    }

    #[test]
    fn invalid_recipient_is_rejected() {
        let err = build_message(&mail("not an address")).unwrap_err();
        assert!(matches!(err, NotifyError::InvalidAddress { .. }));
    }

    #[tokio::test]
    async fn dry_run_validates_but_does_not_send() {
        assert!(DryRunMailer.send(&mail("bob@met.no")).await.is_ok());
        assert!(DryRunMailer.send(&mail("@@")).await.is_err());
    }
}
