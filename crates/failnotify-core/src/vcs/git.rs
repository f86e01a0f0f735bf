//! git adapter: commits are read with `git log` in the job's workspace.

use std::path::Path;

use chrono::DateTime;

use super::CommandSpec;
use crate::domain::build::Revision;
use crate::domain::commit::Commit;
use crate::domain::error::{NotifyError, Result};

/// Field separator in the log format (ASCII unit separator).
const SEP: char = '\u{1f}';

/// `git log <since>..HEAD`, newest first, one commit per line.
pub fn log_command(workspace: &Path, since: &str) -> CommandSpec {
    CommandSpec::new(
        "git",
        [
            "log".to_string(),
            format!("{since}..HEAD"),
            "--pretty=format:%H%x1f%ce%x1f%ct%x1f%s".to_string(),
        ],
    )
    .in_dir(workspace)
}

/// Parse the output of [`log_command`]. Empty output means no commits.
pub fn parse_log(stdout: &str) -> Result<Vec<Commit>> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Result<Commit> {
    let mut fields = line.splitn(4, SEP);
    let (Some(hash), Some(email), Some(stamp)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(NotifyError::VcsOutput(format!("short git log line: {line:?}")));
    };
    let secs: i64 = stamp
        .trim()
        .parse()
        .map_err(|_| NotifyError::VcsOutput(format!("bad commit time {stamp:?}")))?;
    let timestamp = DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| NotifyError::VcsOutput(format!("commit time out of range: {secs}")))?;

    Ok(Commit {
        revision: Revision::Hash(hash.trim().to_string()),
        author: email.trim().to_string(),
        timestamp,
        message: fields.next().unwrap_or_default().trim_end().to_string(),
    })
}
