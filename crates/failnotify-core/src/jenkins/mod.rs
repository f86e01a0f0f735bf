//! Read-only access to a Jenkins home directory.
//!
//! Layout used:
//!
//! ```text
//! <home>/hudson.tasks.Mailer.xml
//! <home>/jobs/<job>/config.xml
//! <home>/jobs/<job>/lastSuccessful/build.xml
//! <home>/jobs/<job>/builds/<n>/build.xml
//! <home>/jobs/<job>/workspace/
//! ```

pub mod build_xml;
pub mod config_xml;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::build::BuildRecord;
use crate::domain::error::{NotifyError, Result};
use crate::xml;

pub use build_xml::parse_build_record;
pub use config_xml::{parse_admin_address, parse_job_config, JobConfig};

/// A Jenkins home directory.
#[derive(Debug, Clone)]
pub struct JenkinsHome {
    root: PathBuf,
}

impl JenkinsHome {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.root.join("jobs")
    }

    pub fn job_dir(&self, job: &str) -> PathBuf {
        self.jobs_dir().join(job)
    }

    pub fn workspace(&self, job: &str) -> PathBuf {
        self.job_dir(job).join("workspace")
    }

    pub fn config_path(&self, job: &str) -> PathBuf {
        self.job_dir(job).join("config.xml")
    }

    pub fn last_successful_path(&self, job: &str) -> PathBuf {
        self.job_dir(job).join("lastSuccessful").join("build.xml")
    }

    pub fn build_path(&self, job: &str, build: u64) -> PathBuf {
        self.job_dir(job)
            .join("builds")
            .join(build.to_string())
            .join("build.xml")
    }

    pub fn mailer_path(&self) -> PathBuf {
        self.root.join("hudson.tasks.Mailer.xml")
    }

    /// Record of the job's last successful build.
    pub fn last_successful_build(&self, job: &str) -> Result<BuildRecord> {
        let path = self.last_successful_path(job);
        if !path.exists() {
            return Err(NotifyError::NoSuccessfulBuild {
                job: job.to_string(),
            });
        }
        self.read_build(job, &path)
    }

    /// Record of a specific build.
    pub fn build(&self, job: &str, build: u64) -> Result<BuildRecord> {
        self.read_build(job, &self.build_path(job, build))
    }

    fn read_build(&self, job: &str, path: &Path) -> Result<BuildRecord> {
        debug!(job = %job, path = %path.display(), "reading build record");
        let text = xml::read_file(path)?;
        parse_build_record(job, &text, &path.display().to_string())
    }

    pub fn job_config(&self, job: &str) -> Result<JobConfig> {
        let path = self.config_path(job);
        let text = xml::read_file(&path)?;
        parse_job_config(&text, &path.display().to_string())
    }

    /// People registered to be notified whenever `job` fails.
    pub fn fixed_recipients(&self, job: &str) -> Result<Vec<String>> {
        Ok(self.job_config(job)?.recipients)
    }

    /// The build server's configured sender address.
    pub fn admin_address(&self) -> Result<String> {
        let path = self.mailer_path();
        let text = xml::read_file(&path)?;
        parse_admin_address(&text, &path.display().to_string())
    }

    /// Names of all job directories, sorted.
    pub fn job_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.jobs_dir())? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_jenkins_layout() {
        let home = JenkinsHome::new("/var/lib/jenkins");
        assert_eq!(
            home.last_successful_path("diana"),
            PathBuf::from("/var/lib/jenkins/jobs/diana/lastSuccessful/build.xml")
        );
        assert_eq!(
            home.build_path("diana", 12),
            PathBuf::from("/var/lib/jenkins/jobs/diana/builds/12/build.xml")
        );
        assert_eq!(
            home.mailer_path(),
            PathBuf::from("/var/lib/jenkins/hudson.tasks.Mailer.xml")
        );
    }

    #[test]
    fn never_passed_job_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("jobs/fresh")).unwrap();
        let home = JenkinsHome::new(dir.path());
        let err = home.last_successful_build("fresh").unwrap_err();
        assert!(matches!(err, NotifyError::NoSuccessfulBuild { .. }));
    }

    #[test]
    fn missing_build_is_metadata_missing() {
        let dir = tempfile::tempdir().unwrap();
        let home = JenkinsHome::new(dir.path());
        let err = home.build("gone", 3).unwrap_err();
        assert!(matches!(err, NotifyError::MetadataMissing { .. }));
    }

    #[test]
    fn job_names_lists_directories_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("jobs/b")).unwrap();
        std::fs::create_dir_all(dir.path().join("jobs/a")).unwrap();
        std::fs::write(dir.path().join("jobs/stray.txt"), "x").unwrap();
        let home = JenkinsHome::new(dir.path());
        assert_eq!(home.job_names().unwrap(), vec!["a", "b"]);
    }
}
