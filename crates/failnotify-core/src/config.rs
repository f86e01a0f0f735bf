//! Notifier settings.

use serde::{Deserialize, Serialize};

use crate::report::LinkRule;

/// Settings for a notification run.
///
/// `Default` reads the `FAILNOTIFY_*` environment variables and falls back
/// to built-in values; command-line flags are applied on top with the
/// `with_*` setters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Base URL of the build server, used for links in reports.
    pub jenkins_url: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Domain appended to Subversion user names.
    pub svn_mail_domain: String,
    /// Limit per VCS query in seconds (0 = none).
    pub vcs_timeout_secs: u64,
    /// Sender override; the build server's admin address otherwise.
    pub from: Option<String>,
    /// Notify fixed recipients when the job has never passed instead of
    /// aborting.
    pub notify_never_passed: bool,
    pub link_rules: Vec<LinkRule>,
}

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(fallback)
}

impl Default for NotifierConfig {
    fn default() -> Self {
        NotifierConfig {
            jenkins_url: std::env::var("JENKINS_URL").unwrap_or_default(),
            smtp_host: std::env::var("FAILNOTIFY_SMTP_HOST")
                .unwrap_or_else(|_| "localhost".to_string()),
            smtp_port: env_or("FAILNOTIFY_SMTP_PORT", 25),
            svn_mail_domain: std::env::var("FAILNOTIFY_SVN_DOMAIN")
                .unwrap_or_else(|_| "met.no".to_string()),
            vcs_timeout_secs: env_or("FAILNOTIFY_VCS_TIMEOUT_SECS", 120),
            from: None,
            notify_never_passed: false,
            link_rules: LinkRule::defaults(),
        }
    }
}

impl NotifierConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Built-in values only, ignoring the environment.
    pub fn new(jenkins_url: &str) -> Self {
        NotifierConfig {
            jenkins_url: jenkins_url.to_string(),
            smtp_host: "localhost".to_string(),
            smtp_port: 25,
            svn_mail_domain: "met.no".to_string(),
            vcs_timeout_secs: 120,
            from: None,
            notify_never_passed: false,
            link_rules: LinkRule::defaults(),
        }
    }

    pub fn with_jenkins_url(mut self, url: &str) -> Self {
        self.jenkins_url = url.to_string();
        self
    }

    pub fn with_smtp(mut self, host: &str, port: u16) -> Self {
        self.smtp_host = host.to_string();
        self.smtp_port = port;
        self
    }

    pub fn with_svn_mail_domain(mut self, domain: &str) -> Self {
        self.svn_mail_domain = domain.to_string();
        self
    }

    pub fn with_vcs_timeout_secs(mut self, secs: u64) -> Self {
        self.vcs_timeout_secs = secs;
        self
    }

    pub fn with_from(mut self, from: &str) -> Self {
        self.from = Some(from.to_string());
        self
    }

    pub fn with_notify_never_passed(mut self, enabled: bool) -> Self {
        self.notify_never_passed = enabled;
        self
    }

    pub fn with_link_rules(mut self, rules: Vec<LinkRule>) -> Self {
        self.link_rules = rules;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_values() {
        let cfg = NotifierConfig::new("https://jenkins.met.no");
        assert_eq!(cfg.smtp_host, "localhost");
        assert_eq!(cfg.smtp_port, 25);
        assert_eq!(cfg.svn_mail_domain, "met.no");
        assert_eq!(cfg.vcs_timeout_secs, 120);
        assert!(cfg.from.is_none());
        assert!(!cfg.notify_never_passed);
        assert_eq!(cfg.link_rules.len(), 2);
    }

    #[test]
    fn setters_override() {
        let cfg = NotifierConfig::new("x")
            .with_smtp("relay.met.no", 2525)
            .with_from("Jenkins <jenkins@met.no>")
            .with_svn_mail_domain("example.org")
            .with_vcs_timeout_secs(0)
            .with_notify_never_passed(true)
            .with_link_rules(vec![]);
        assert_eq!(cfg.smtp_host, "relay.met.no");
        assert_eq!(cfg.smtp_port, 2525);
        assert_eq!(cfg.from.as_deref(), Some("Jenkins <jenkins@met.no>"));
        assert_eq!(cfg.svn_mail_domain, "example.org");
        assert_eq!(cfg.vcs_timeout_secs, 0);
        assert!(cfg.notify_never_passed);
        assert!(cfg.link_rules.is_empty());
    }

    #[test]
    fn unparsable_env_value_falls_back() {
        assert_eq!(env_or::<u16>("FAILNOTIFY_TEST_UNSET_PORT_VAR", 25), 25);
    }
}
