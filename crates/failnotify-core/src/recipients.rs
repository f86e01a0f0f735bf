//! Recipient resolution: candidate committers and fixed recipients.

use serde::{Deserialize, Serialize};

use crate::domain::build::VcsKind;
use crate::domain::commit::{Commit, JobChanges};

/// Maps a commit author to the address that is notified.
///
/// Subversion user names get a mail domain appended; git already reports
/// the committer e-mail. Aliases are not resolved, so `joe` (svn) and
/// `joe.bloggs@met.no` (git) are two different recipients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRules {
    pub svn_mail_domain: String,
}

impl Default for AddressRules {
    fn default() -> Self {
        Self {
            svn_mail_domain: "met.no".to_string(),
        }
    }
}

impl AddressRules {
    pub fn new(svn_mail_domain: impl Into<String>) -> Self {
        Self {
            svn_mail_domain: svn_mail_domain.into(),
        }
    }

    pub fn address(&self, kind: VcsKind, author: &str) -> String {
        match kind {
            VcsKind::Subversion => format!("{}@{}", author, self.svn_mail_domain),
            VcsKind::Git => author.to_string(),
        }
    }

    /// Address of the commit author, or `None` for an anonymous commit.
    pub fn commit_address(&self, kind: VcsKind, commit: &Commit) -> Option<String> {
        let author = commit.author.trim();
        if author.is_empty() {
            return None;
        }
        Some(self.address(kind, author))
    }
}

/// Who gets notified. Each list is free of duplicates; a person on both
/// lists receives both reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipients {
    pub candidates: Vec<String>,
    pub fixed: Vec<String>,
}

/// Candidate committer addresses in order of first appearance. Anonymous
/// commits contribute no candidate.
pub fn candidate_committers(changes: &[JobChanges], rules: &AddressRules) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for job in changes {
        for repo in &job.repositories {
            for commit in &repo.commits {
                let Some(address) = rules.commit_address(repo.repository.kind, commit) else {
                    continue;
                };
                if !out.contains(&address) {
                    out.push(address);
                }
            }
        }
    }
    out
}

pub fn resolve(changes: &[JobChanges], fixed: &[String], rules: &AddressRules) -> Recipients {
    let mut fixed_out: Vec<String> = Vec::with_capacity(fixed.len());
    for addr in fixed {
        if !fixed_out.contains(addr) {
            fixed_out.push(addr.clone());
        }
    }
    Recipients {
        candidates: candidate_committers(changes, rules),
        fixed: fixed_out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::build::{RepositoryReference, Revision};
    use crate::domain::commit::{HarvestStatus, RepositoryChanges};
    use chrono::{TimeZone, Utc};

    fn commit(rev: Revision, author: &str) -> Commit {
        Commit {
            revision: rev,
            author: author.to_string(),
            timestamp: Utc.with_ymd_and_hms(2013, 5, 1, 12, 0, 0).unwrap(),
            message: "change".to_string(),
        }
    }

    fn sample() -> Vec<JobChanges> {
        vec![
            JobChanges {
                job: "diana".to_string(),
                build: 57,
                repositories: vec![RepositoryChanges {
                    repository: RepositoryReference::svn("https://svn.met.no/diana/trunk"),
                    last_pass_revision: Revision::Number(100),
                    commits: vec![
                        commit(Revision::Number(104), "bob"),
                        commit(Revision::Number(103), "alice"),
                        commit(Revision::Number(102), "bob"),
                    ],
                    status: HarvestStatus::Complete,
                }],
            },
            JobChanges {
                job: "tseries".to_string(),
                build: 9,
                repositories: vec![RepositoryChanges {
                    repository: RepositoryReference::git("git://git.met.no/tseries.git"),
                    last_pass_revision: Revision::Hash("abc".to_string()),
                    commits: vec![commit(Revision::Hash("def".to_string()), "alice@met.no")],
                    status: HarvestStatus::Complete,
                }],
            },
        ]
    }

    #[test]
    fn svn_authors_get_domain_and_git_is_literal() {
        let rules = AddressRules::new("example.org");
        assert_eq!(rules.address(VcsKind::Subversion, "joa"), "joa@example.org");
        assert_eq!(
            rules.address(VcsKind::Git, "jo.asplin@met.no"),
            "jo.asplin@met.no"
        );
    }

    #[test]
    fn each_author_appears_once_in_first_seen_order() {
        let candidates = candidate_committers(&sample(), &AddressRules::default());
        assert_eq!(candidates, vec!["bob@met.no", "alice@met.no"]);
    }

    #[test]
    fn fixed_list_is_kept_separate_from_candidates() {
        let fixed = vec![
            "alice@met.no".to_string(),
            "lead@met.no".to_string(),
            "lead@met.no".to_string(),
        ];
        let r = resolve(&sample(), &fixed, &AddressRules::default());
        assert_eq!(r.fixed, vec!["alice@met.no", "lead@met.no"]);
        assert!(r.candidates.contains(&"alice@met.no".to_string()));
    }

    #[test]
    fn anonymous_commits_have_no_address() {
        let mut changes = sample();
        changes[0].repositories[0]
            .commits
            .push(commit(Revision::Number(101), ""));
        changes[1].repositories[0]
            .commits
            .push(commit(Revision::Hash("fed".to_string()), "  "));
        let rules = AddressRules::default();
        assert_eq!(
            rules.commit_address(VcsKind::Subversion, &commit(Revision::Number(101), "")),
            None
        );
        assert_eq!(
            candidate_committers(&changes, &rules),
            vec!["bob@met.no", "alice@met.no"]
        );
    }

    #[test]
    fn no_commits_means_no_candidates() {
        let r = resolve(&[], &["lead@met.no".to_string()], &AddressRules::default());
        assert!(r.candidates.is_empty());
        assert_eq!(r.fixed.len(), 1);
    }
}
