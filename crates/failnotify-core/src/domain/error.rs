//! Domain-level error taxonomy for failnotify.

use std::path::PathBuf;

/// failnotify domain errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("job {job} has no recorded successful build")]
    NoSuccessfulBuild { job: String },

    #[error("build metadata not found: {}", path.display())]
    MetadataMissing { path: PathBuf },

    #[error("malformed XML in {origin}: {source}")]
    MalformedXml {
        origin: String,
        #[source]
        source: roxmltree::Error,
    },

    #[error("{origin}: missing element <{element}>")]
    MissingElement { origin: String, element: String },

    #[error("{origin}: invalid number {value:?} in <{element}>")]
    InvalidNumber {
        origin: String,
        element: String,
        value: String,
    },

    #[error("{origin}: repository {url} is recorded both as svn and git")]
    AmbiguousRepository { origin: String, url: String },

    #[error("upstream mismatch: {detail}")]
    UpstreamMismatch { detail: String },

    #[error("vcs command `{command}` failed: {detail}")]
    VcsCommand { command: String, detail: String },

    #[error("unexpected vcs output: {0}")]
    VcsOutput(String),

    #[error("invalid mail address {address:?}: {detail}")]
    InvalidAddress { address: String, detail: String },

    #[error("mail error: {0}")]
    Mail(String),

    #[error("job script {} failed to run: {detail}", path.display())]
    JobScript { path: PathBuf, detail: String },

    #[error("invalid revision link pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("report template: {0}")]
    Template(#[from] handlebars::TemplateError),

    #[error("report rendering failed: {0}")]
    Render(#[from] handlebars::RenderError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl NotifyError {
    pub(crate) fn missing(origin: impl Into<String>, element: &str) -> Self {
        NotifyError::MissingElement {
            origin: origin.into(),
            element: element.to_string(),
        }
    }
}

/// Result type for failnotify domain operations.
pub type Result<T> = std::result::Result<T, NotifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_successful_build_names_job() {
        let err = NotifyError::NoSuccessfulBuild {
            job: "diana-trunk".to_string(),
        };
        assert!(err.to_string().contains("diana-trunk"));
        assert!(err.to_string().contains("no recorded successful build"));
    }

    #[test]
    fn test_vcs_command_error() {
        let err = NotifyError::VcsCommand {
            command: "svn log".to_string(),
            detail: "exit status 1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("svn log"));
        assert!(msg.contains("exit status 1"));
    }

    #[test]
    fn test_missing_element_helper() {
        let err = NotifyError::missing("jobs/x/config.xml", "recipients");
        assert_eq!(
            err.to_string(),
            "jobs/x/config.xml: missing element <recipients>"
        );
    }
}
