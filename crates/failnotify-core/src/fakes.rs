//! In-memory fakes for the command and mail seams (testing only)
//!
//! Provides `ScriptedRunner` and `MemoryMailer` that satisfy the trait
//! contracts without spawning processes or talking to a mail relay.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::error::{NotifyError, Result};
use crate::mail::{Mailer, OutgoingMail};
use crate::vcs::{CommandOutput, CommandRunner, CommandSpec};

// ---------------------------------------------------------------------------
// ScriptedRunner
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Scripted {
    Output(CommandOutput),
    SpawnError(String),
}

/// Command runner that answers from canned responses.
///
/// A response is selected by the first rule whose pattern occurs in the
/// rendered command line. Unmatched commands fail to spawn.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<(String, Scripted)>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, pattern: &str, output: CommandOutput) {
        self.rules
            .lock()
            .unwrap()
            .push((pattern.to_string(), Scripted::Output(output)));
    }

    pub fn fail_to_spawn(&self, pattern: &str, detail: &str) {
        self.rules
            .lock()
            .unwrap()
            .push((pattern.to_string(), Scripted::SpawnError(detail.to_string())));
    }

    /// Commands run so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(command.clone());
        let line = command.display();
        let rules = self.rules.lock().unwrap();
        match rules.iter().find(|(pattern, _)| line.contains(pattern.as_str())) {
            Some((_, Scripted::Output(output))) => Ok(output.clone()),
            Some((_, Scripted::SpawnError(detail))) => Err(NotifyError::VcsCommand {
                command: line,
                detail: detail.clone(),
            }),
            None => Err(NotifyError::VcsCommand {
                command: line,
                detail: "no scripted response".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryMailer
// ---------------------------------------------------------------------------

/// Mailer that keeps sent mail in memory and can be told to reject
/// particular recipients.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    rejected: Mutex<HashSet<String>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to `address` fail.
    pub fn reject(&self, address: &str) {
        self.rejected.lock().unwrap().insert(address.to_string());
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<OutgoingMail> {
        self.sent()
            .into_iter()
            .filter(|m| m.to == address)
            .collect()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        if self.rejected.lock().unwrap().contains(&mail.to) {
            return Err(NotifyError::Mail(format!("550 mailbox unavailable: {}", mail.to)));
        }
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}
