//! HTML failure reports and mail subjects.
//!
//! A report is a shared head, a middle part addressed to either a candidate
//! committer or a fixed recipient, and one section per source job listing
//! the candidate changes of each of its repositories. All parts are
//! handlebars templates, so every interpolated value is HTML-escaped.

use handlebars::Handlebars;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::build::{LastPass, RepositoryReference, Revision, VcsKind};
use crate::domain::commit::{HarvestStatus, JobChanges, RepositoryChanges};
use crate::domain::error::Result;
use crate::domain::request::{Incident, NotifyRequest};
use crate::recipients::AddressRules;

/// Maps repository URLs of one VCS kind to a web viewer.
///
/// `template` may contain `{repo}` (first capture group of `pattern`) and
/// `{rev}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRule {
    pub kind: VcsKind,
    pub pattern: String,
    pub template: String,
}

impl LinkRule {
    pub fn new(kind: VcsKind, pattern: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            kind,
            pattern: pattern.into(),
            template: template.into(),
        }
    }

    pub fn defaults() -> Vec<LinkRule> {
        vec![
            LinkRule::new(
                VcsKind::Git,
                r"^git://git.met.no/(.+)$",
                "https://git.met.no/cgi-bin/gitweb.cgi?p={repo};a=commit;h={rev}",
            ),
            LinkRule::new(
                VcsKind::Subversion,
                r"^https://svn.met.no/([^/]+)",
                "https://svn.met.no/viewvc/{repo}?view=revision&revision={rev}",
            ),
        ]
    }
}

/// Compiled [`LinkRule`]s.
#[derive(Debug, Clone, Default)]
pub struct RevisionLinks {
    rules: Vec<(VcsKind, Regex, String)>,
}

impl RevisionLinks {
    pub fn compile(rules: &[LinkRule]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            compiled.push((rule.kind, Regex::new(&rule.pattern)?, rule.template.clone()));
        }
        Ok(Self { rules: compiled })
    }

    /// Viewer URL for `rev`, or `None` when no rule matches the repository.
    pub fn url(&self, repository: &RepositoryReference, rev: &Revision) -> Option<String> {
        self.rules
            .iter()
            .filter(|(kind, _, _)| *kind == repository.kind)
            .find_map(|(_, pattern, template)| {
                let caps = pattern.captures(&repository.url)?;
                let repo = caps.get(1).map_or("", |m| m.as_str());
                Some(
                    template
                        .replace("{repo}", repo)
                        .replace("{rev}", &rev.to_string()),
                )
            })
    }
}

pub fn candidate_subject(job: &str, build: u64) -> String {
    format!("Jenkins alert: {job} #{build} failed - please investigate")
}

pub fn fixed_subject(job: &str, build: u64) -> String {
    format!("Jenkins alert: {job} #{build} failed")
}

const HEAD: &str = r#"<html>
<head>
<style type="text/css">
table { border:1px solid; border-collapse:collapse }
th { border:1px solid; border-collapse:collapse; border-color:#888; padding:0px 10px;
  background:#ddd; text-align:left }
td { border:1px solid; border-collapse:collapse; border-color:#888; padding:0px 10px;
  vertical-align:top }
.descr { font-family: monospace, "Lucida Console", "Courier New"; font-size: 95%;
  color:#000 }
.hilight { background:#ffa }
</style>
</head>
<body>
"#;

const INCIDENT: &str = concat!(
    r#"{{#if (eq incident.kind "build_failed")}}"#,
    r#"<span style="color:#f00">the core build script <u>failed</u></span>"#,
    r#"{{/if}}{{#if (eq incident.kind "unexpected_pass")}}"#,
    r#"<span style="color:#f00">the core build script <u>passed unexpectedly</u></span>: {{incident.comment}}"#,
    r#"{{/if}}{{#if (eq incident.kind "test_failed")}}"#,
    r#"<span style="color:#f00">the tests <u>failed</u></span> against product <b>{{incident.product}}</b>"#,
    r#"{{/if}}"#,
);

const LAST_PASS: &str = r#"Changes in local and upstream repositories since the <a href="{{last_pass.url}}">last
successful build (#{{last_pass.build}})</a> are listed below.
"#;

const SECTIONS: &str = r#"{{#each sections}}
<br/><hr><span style="font-size: 120%">Source repositories {{relation}} <b>{{job}}</b>
(build associated with last successful build of <b>{{target_job}}</b>: <a href="{{build_url}}">#{{build}}</a>):</span>
<br/>
{{#each repositories}}
<br/>Candidate changes in {{url}} (i.e. later than Rev. {{last_pass_revision}}):
{{#if unavailable}}
<span style="color:red" title="{{detail}}"><b>unavailable</b></span><br/>
{{else}}
{{#if rows}}
<br/><table>
<tr><th>Rev.</th><th>Author</th><th>Date</th><th>Description</th></tr>
{{#each rows}}
<tr{{#if hilight}} class="hilight"{{/if}}><td>{{#if link}}<a href="{{link}}">{{revision}}</a>{{else}}{{revision}}{{/if}}</td><td>{{author}}</td><td style="white-space: nowrap;">{{date}}</td><td class="descr">{{message}}</td></tr>
{{/each}}
</table>
{{else}}
<span style="color:red"><b>none</b></span><br/>
{{/if}}
{{/if}}
{{/each}}
{{/each}}
"#;

const CANDIDATE_REPORT: &str = r#"{{> head}}
You receive this email because you may potentially have caused
the failure of <a href="{{console_url}}"><b>{{job}}</b> #{{build}}</a>.
<br/><br/>
Incident: {{> incident}}
<br/><br/>
{{#if last_pass}}
{{> last_pass}}
{{/if}}
<br/><br/>
Please investigate.
<br/><br/>
<span style="background-color: #eee; font-size: 80%"><b>Note:</b> This email was sent to {{recipient}}. Email aliases are not supported, so a person receives one email per distinct address found in the affected repositories (e.g. foob@met.no and foo.bar@met.no count as two addresses even if they belong to the same person).</span><br/>
{{> sections}}
</body>
</html>
"#;

const FIXED_REPORT: &str = r#"{{> head}}
You receive this email because you have registered to be notified whenever
<b>{{job}}</b> fails (in this case <a href="{{console_url}}">Build #{{build}}</a>).
<br/><br/>
Incident: {{> incident}}
<br/><br/>
{{#if last_pass}}
{{> last_pass}}
<br/><br/>
Candidate committers have been notified separately.
<br/>
{{else}}
<b>Note:</b> This job has never built successfully.
<br/>
{{/if}}
{{> sections}}
</body>
</html>
"#;

/// Author cell of commits without an author.
pub const NO_AUTHOR: &str = "(no author)";

/// Everything a report is rendered from.
pub struct ReportInput<'a> {
    pub request: &'a NotifyRequest,
    /// `None` when the job has never passed.
    pub last_pass: Option<&'a LastPass>,
    pub changes: &'a [JobChanges],
}

#[derive(Serialize)]
struct ReportContext<'a> {
    job: &'a str,
    build: u64,
    console_url: String,
    recipient: Option<&'a str>,
    incident: &'a Incident,
    last_pass: Option<LastPassContext>,
    sections: Vec<SectionContext<'a>>,
}

#[derive(Serialize)]
struct LastPassContext {
    url: String,
    build: u64,
}

#[derive(Serialize)]
struct SectionContext<'a> {
    relation: &'static str,
    job: &'a str,
    build: u64,
    build_url: String,
    target_job: &'a str,
    repositories: Vec<RepositoryContext<'a>>,
}

#[derive(Serialize)]
struct RepositoryContext<'a> {
    url: &'a str,
    last_pass_revision: String,
    unavailable: bool,
    detail: &'a str,
    rows: Vec<RowContext<'a>>,
}

#[derive(Serialize)]
struct RowContext<'a> {
    hilight: bool,
    revision: String,
    link: Option<String>,
    author: String,
    date: String,
    message: &'a str,
}

/// Renders reports for one build server.
pub struct ReportRenderer {
    jenkins_url: String,
    links: RevisionLinks,
    addresses: AddressRules,
    registry: Handlebars<'static>,
}

impl ReportRenderer {
    pub fn new(jenkins_url: &str, links: RevisionLinks, addresses: AddressRules) -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.register_partial("head", HEAD)?;
        registry.register_partial("incident", INCIDENT)?;
        registry.register_partial("last_pass", LAST_PASS)?;
        registry.register_partial("sections", SECTIONS)?;
        registry.register_template_string("candidate_report", CANDIDATE_REPORT)?;
        registry.register_template_string("fixed_report", FIXED_REPORT)?;

        Ok(Self {
            jenkins_url: jenkins_url.trim_end_matches('/').to_string(),
            links,
            addresses,
            registry,
        })
    }

    fn build_url(&self, job: &str, build: u64) -> String {
        format!("{}/job/{}/{}/", self.jenkins_url, job, build)
    }

    fn console_url(&self, job: &str, build: u64) -> String {
        format!("{}/job/{}/{}/console", self.jenkins_url, job, build)
    }

    /// Report for a candidate committer; only the rows of commits
    /// attributed to `recipient` are highlighted.
    pub fn candidate_report(&self, input: &ReportInput<'_>, recipient: &str) -> Result<String> {
        let context = self.context(input, Some(recipient));
        Ok(self.registry.render("candidate_report", &context)?)
    }

    /// Report for a fixed recipient. Nothing is highlighted.
    pub fn fixed_report(&self, input: &ReportInput<'_>) -> Result<String> {
        let context = self.context(input, None);
        Ok(self.registry.render("fixed_report", &context)?)
    }

    fn context<'a>(&self, input: &'a ReportInput<'a>, recipient: Option<&'a str>) -> ReportContext<'a> {
        let req = input.request;
        ReportContext {
            job: &req.job,
            build: req.build,
            console_url: self.console_url(&req.job, req.build),
            recipient,
            incident: &req.incident,
            last_pass: input.last_pass.map(|lp| LastPassContext {
                url: self.build_url(&lp.target_job, lp.target_build),
                build: lp.target_build,
            }),
            sections: self.sections(input, recipient),
        }
    }

    fn sections<'a>(&self, input: &'a ReportInput<'a>, hilight: Option<&str>) -> Vec<SectionContext<'a>> {
        let req = input.request;
        let product = match &req.incident {
            Incident::TestFailed { product } => Some(product.as_str()),
            _ => None,
        };
        input
            .changes
            .iter()
            .map(|job| {
                let relation = if job.job == req.job {
                    "local to"
                } else if Some(job.job.as_str()) == product {
                    "of product job"
                } else {
                    "for upstream job"
                };
                SectionContext {
                    relation,
                    job: &job.job,
                    build: job.build,
                    build_url: self.build_url(&job.job, job.build),
                    target_job: &req.job,
                    repositories: job
                        .repositories
                        .iter()
                        .map(|repo| self.repository(repo, hilight))
                        .collect(),
                }
            })
            .collect()
    }

    fn repository<'a>(&self, repo: &'a RepositoryChanges, hilight: Option<&str>) -> RepositoryContext<'a> {
        let (unavailable, detail) = match &repo.status {
            HarvestStatus::QueryFailed(detail) => (true, detail.as_str()),
            HarvestStatus::Complete => (false, ""),
        };
        let rows = if unavailable {
            Vec::new()
        } else {
            repo.commits
                .iter()
                .map(|commit| {
                    let address = self.addresses.commit_address(repo.repository.kind, commit);
                    RowContext {
                        hilight: hilight.is_some() && address.as_deref() == hilight,
                        revision: commit.revision.to_string(),
                        link: self.links.url(&repo.repository, &commit.revision),
                        author: address.unwrap_or_else(|| NO_AUTHOR.to_string()),
                        date: commit.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                        message: &commit.message,
                    }
                })
                .collect()
        };
        RepositoryContext {
            url: &repo.repository.url,
            last_pass_revision: repo.last_pass_revision.to_string(),
            unavailable,
            detail,
            rows,
        }
    }
}
