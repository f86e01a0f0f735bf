//! Job configuration (`config.xml`) and global mailer settings.

use serde::{Deserialize, Serialize};

use crate::domain::error::{NotifyError, Result};
use crate::xml;

/// The parts of a job's `config.xml` failnotify cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Fixed recipients from the mailer publisher, duplicates removed.
    pub recipients: Vec<String>,
    pub assigned_node: Option<String>,
    pub can_roam: Option<String>,
    /// Text of the first shell `command`. `Some("")` when the element is
    /// present but empty.
    pub command: Option<String>,
}

impl JobConfig {
    /// Whether the job is pinned to its assigned node.
    pub fn requires_node(&self) -> bool {
        self.can_roam
            .as_deref()
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "no" | "0"))
            .unwrap_or(true)
    }
}

pub fn parse_job_config(text: &str, origin: &str) -> Result<JobConfig> {
    let doc = xml::parse(text, origin)?;
    let root = doc.root_element();

    let mut recipients: Vec<String> = Vec::new();
    if let Some(node) = xml::first(root, "recipients") {
        for addr in xml::text(node).split_whitespace() {
            if !recipients.iter().any(|r| r == addr) {
                recipients.push(addr.to_string());
            }
        }
    }

    let non_empty = |name: &str| {
        xml::first(root, name)
            .map(xml::text)
            .filter(|s| !s.is_empty())
    };

    Ok(JobConfig {
        recipients,
        assigned_node: non_empty("assignedNode"),
        can_roam: non_empty("canRoam"),
        command: xml::first(root, "command").map(xml::text),
    })
}

/// Sender address configured for the build server's mailer.
pub fn parse_admin_address(text: &str, origin: &str) -> Result<String> {
    let doc = xml::parse(text, origin)?;
    let addr = xml::required_text(doc.root_element(), "adminAddress", origin)?;
    if addr.is_empty() {
        return Err(NotifyError::missing(origin, "adminAddress"));
    }
    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"<?xml version='1.0' encoding='UTF-8'?>
<project>
  <assignedNode>precise64</assignedNode>
  <canRoam>false</canRoam>
  <builders>
    <hudson.tasks.Shell>
      <command>$JENKINS_SCRIPTS_PATH/runjob.sh --job diana --expectfail 'known issue #12'</command>
    </hudson.tasks.Shell>
  </builders>
  <publishers>
    <hudson.tasks.Mailer>
      <recipients>lead@met.no   ops@met.no
        lead@met.no</recipients>
      <dontNotifyEveryUnstableBuild>false</dontNotifyEveryUnstableBuild>
    </hudson.tasks.Mailer>
  </publishers>
</project>
"#;

    #[test]
    fn recipients_are_split_and_deduplicated() {
        let cfg = parse_job_config(CONFIG, "config.xml").unwrap();
        assert_eq!(cfg.recipients, vec!["lead@met.no", "ops@met.no"]);
    }

    #[test]
    fn node_and_command_are_read() {
        let cfg = parse_job_config(CONFIG, "config.xml").unwrap();
        assert_eq!(cfg.assigned_node.as_deref(), Some("precise64"));
        assert!(cfg.requires_node());
        assert!(cfg.command.unwrap().contains("--expectfail"));
    }

    #[test]
    fn missing_elements_default_to_empty() {
        let cfg = parse_job_config("<project><command/></project>", "config.xml").unwrap();
        assert!(cfg.recipients.is_empty());
        assert_eq!(cfg.assigned_node, None);
        assert!(cfg.requires_node());
        assert_eq!(cfg.command.as_deref(), Some(""));
    }

    #[test]
    fn roaming_job_does_not_require_node() {
        let cfg = parse_job_config("<project><canRoam>true</canRoam></project>", "c").unwrap();
        assert!(!cfg.requires_node());
    }

    #[test]
    fn admin_address_is_required() {
        let text = "<hudson.tasks.Mailer_-DescriptorImpl><adminAddress>Jenkins &lt;jenkins@met.no&gt;</adminAddress></hudson.tasks.Mailer_-DescriptorImpl>";
        assert_eq!(
            parse_admin_address(text, "m").unwrap(),
            "Jenkins <jenkins@met.no>"
        );
        assert!(parse_admin_address("<x/>", "m").is_err());
    }
}
