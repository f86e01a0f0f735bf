//! Read-only inventory reports over the build server's job tree.

use serde::{Deserialize, Serialize};

use crate::domain::error::Result;
use crate::jenkins::JenkinsHome;

/// One line of the job list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRow {
    pub name: String,
    pub assigned_node: Option<String>,
    /// The job may only run on its assigned node.
    pub required_node: bool,
}

/// Every job with its node assignment, sorted by assigned node descending
/// (jobs without one last). Any unreadable config aborts the listing.
pub fn list_jobs(home: &JenkinsHome) -> Result<Vec<JobRow>> {
    let mut rows = Vec::new();
    for name in home.job_names()? {
        let config = home.job_config(&name)?;
        rows.push(JobRow {
            required_node: config.requires_node(),
            assigned_node: config.assigned_node,
            name,
        });
    }
    rows.sort_by(|a, b| b.assigned_node.cmp(&a.assigned_node));
    Ok(rows)
}

pub fn render_job_table(rows: &[JobRow]) -> String {
    let mut out = format!("{:<25}  {:<25}  {:<6}\n", "JOB", "PRIMARY NODE", "REQUIRED NODE");
    out.push_str(&"-".repeat(70));
    out.push('\n');
    for row in rows {
        out.push_str(&format!(
            "{:<25}  {:<25}  {:<6}\n",
            row.name,
            row.assigned_node.as_deref().unwrap_or(""),
            if row.required_node { "yes" } else { "" }
        ));
    }
    out
}

/// A job and the text it was classified by: its command, or the reason it
/// is problematic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEntry {
    pub job: String,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectFailReport {
    pub expected_to_fail: Vec<JobEntry>,
    pub expected_to_pass: Vec<JobEntry>,
    pub problematic: Vec<JobEntry>,
}

/// Classify every job by the first shell command in its config.
///
/// Per-job problems land in [`ExpectFailReport::problematic`]; only a
/// missing jobs directory is an error.
pub fn expect_fail_report(home: &JenkinsHome) -> Result<ExpectFailReport> {
    let mut report = ExpectFailReport::default();
    for job in home.job_names()? {
        match home.job_config(&job) {
            Ok(config) => match config.command {
                Some(command) if command.contains("--expectfail") => {
                    report.expected_to_fail.push(JobEntry {
                        job,
                        detail: command,
                    })
                }
                Some(command) => report.expected_to_pass.push(JobEntry {
                    job,
                    detail: command,
                }),
                None => {
                    let detail = format!(
                        "no 'command' element found in {}",
                        home.config_path(&job).display()
                    );
                    report.problematic.push(JobEntry { job, detail })
                }
            },
            Err(e) => report.problematic.push(JobEntry {
                job,
                detail: e.to_string(),
            }),
        }
    }
    Ok(report)
}

impl ExpectFailReport {
    pub fn render_text(&self) -> String {
        let group_line = "=".repeat(100);
        let item_line = "_".repeat(100);
        let groups = [
            ("Jobs expected to fail", "Command", &self.expected_to_fail),
            ("Jobs expected to pass", "Command", &self.expected_to_pass),
            ("Problematic jobs", "Error", &self.problematic),
        ];

        let mut out = String::new();
        for (i, (title, label, entries)) in groups.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&format!("{group_line}\n*** {title} ({}):\n", entries.len()));
            // "Name" is right-aligned with the detail label below it.
            for entry in entries.iter() {
                out.push_str(&format!(
                    "{item_line}\n{:>width$}: {}\n{label}: {}\n",
                    "Name",
                    entry.job,
                    entry.detail,
                    width = label.len()
                ));
            }
        }
        out
    }
}
