//! Subversion adapter: commits are read with `svn log --xml`.
//!
//! The query range is `HEAD:<since>`, inclusive of the last-pass revision,
//! which always exists. Entries at or below `since` are dropped afterwards,
//! so a repository without new commits yields an empty list instead of a
//! failed command.

use chrono::{DateTime, Utc};

use super::CommandSpec;
use crate::domain::build::Revision;
use crate::domain::commit::Commit;
use crate::domain::error::{NotifyError, Result};
use crate::xml;

pub fn log_command(url: &str, since: u64) -> CommandSpec {
    CommandSpec::new(
        "svn",
        [
            "log".to_string(),
            url.to_string(),
            format!("-rHEAD:{since}"),
            "--xml".to_string(),
            "--non-interactive".to_string(),
            "--trust-server-cert".to_string(),
        ],
    )
}

/// Parse `svn log --xml` output, keeping revisions strictly above `since`,
/// newest first.
pub fn parse_log(stdout: &str, since: u64) -> Result<Vec<Commit>> {
    let doc = roxmltree::Document::parse(stdout)
        .map_err(|e| NotifyError::VcsOutput(format!("svn log xml: {e}")))?;

    let mut commits = Vec::new();
    for entry in xml::all(doc.root_element(), "logentry") {
        let raw = entry
            .attribute("revision")
            .ok_or_else(|| NotifyError::VcsOutput("logentry without revision".to_string()))?;
        let revision: u64 = raw
            .parse()
            .map_err(|_| NotifyError::VcsOutput(format!("bad svn revision {raw:?}")))?;
        if revision <= since {
            continue;
        }

        let date = xml::first(entry, "date")
            .map(xml::text)
            .ok_or_else(|| NotifyError::VcsOutput(format!("r{revision} has no date")))?;
        let timestamp = DateTime::parse_from_rfc3339(&date)
            .map_err(|e| NotifyError::VcsOutput(format!("r{revision} date {date:?}: {e}")))?
            .with_timezone(&Utc);

        commits.push(Commit {
            revision: Revision::Number(revision),
            // Anonymous commits have no author element.
            author: xml::first(entry, "author").map(xml::text).unwrap_or_default(),
            timestamp,
            message: xml::first(entry, "msg").map(xml::text).unwrap_or_default(),
        });
    }

    commits.sort_by(|a, b| b.revision.as_number().cmp(&a.revision.as_number()));
    Ok(commits)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<log>
<logentry revision="103">
<author>bob</author>
<date>2013-05-02T08:15:30.123456Z</date>
<msg>Use &lt;QString&gt; for labels</msg>
</logentry>
<logentry revision="101">
<author>alice</author>
<date>2013-05-01T12:00:00.000000Z</date>
<msg>Fix crash when opening field dialog</msg>
</logentry>
<logentry revision="100">
<author>carol</author>
<date>2013-04-30T09:00:00.000000Z</date>
<msg>Last good change</msg>
</logentry>
</log>
"#;

    #[test]
    fn command_uses_inclusive_head_range() {
        let cmd = log_command("https://svn.met.no/diana/trunk", 100);
        assert_eq!(cmd.program, "svn");
        assert!(cmd.args.contains(&"-rHEAD:100".to_string()));
        assert!(cmd.args.contains(&"--xml".to_string()));
        assert_eq!(cmd.cwd, None);
    }

    #[test]
    fn keeps_only_revisions_after_last_pass() {
        let commits = parse_log(LOG, 100).unwrap();
        let revs: Vec<_> = commits.iter().map(|c| c.revision.clone()).collect();
        assert_eq!(revs, vec![Revision::Number(103), Revision::Number(101)]);
        assert_eq!(commits[0].author, "bob");
        assert_eq!(commits[0].message, "Use <QString> for labels");
        assert_eq!(
            commits[1].timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            "2013-05-01 12:00:00"
        );
    }

    #[test]
    fn only_last_pass_revision_gives_empty_list() {
        let log = r#"<log><logentry revision="100"><author>carol</author><date>2013-04-30T09:00:00.000000Z</date><msg>x</msg></logentry></log>"#;
        assert!(parse_log(log, 100).unwrap().is_empty());
    }

    #[test]
    fn missing_author_and_message_are_tolerated() {
        let log = r#"<log><logentry revision="7"><date>2013-04-30T09:00:00.000000Z</date><msg/></logentry></log>"#;
        let commits = parse_log(log, 6).unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].author, "");
        assert_eq!(commits[0].message, "");
    }

    #[test]
    fn garbage_output_is_an_error() {
        assert!(parse_log("svn: E160006: No such revision", 1).is_err());
    }
}
