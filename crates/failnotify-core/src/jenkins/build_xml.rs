//! Parsing of a build's `build.xml`.
//!
//! Revisions come from two places:
//! - `hudson.scm.SVNRevisionState`: one `entry` per repository, URL in
//!   `string`, revision in `long`.
//! - `hudson.plugins.git.util.BuildData`: URL in `remoteUrls/string`, hash in
//!   the `sha1` element of `lastBuild`.
//!
//! Upstream builds are the `upstreamProject`/`upstreamBuild` pairs of the cause
//! list, nested causes included.

use roxmltree::Node;

use crate::domain::build::{
    BuildRecord, RecordedRevision, RepositoryReference, Revision, UpstreamRef,
};
use crate::domain::error::{NotifyError, Result};
use crate::xml;

const SVN_STATE: &str = "hudson.scm.SVNRevisionState";
const GIT_BUILD_DATA: &str = "hudson.plugins.git.util.BuildData";

/// Parse a build record for `job` from the contents of its `build.xml`.
pub fn parse_build_record(job: &str, text: &str, origin: &str) -> Result<BuildRecord> {
    let doc = xml::parse(text, origin)?;
    let root = doc.root_element();

    let number_node = xml::child(root, "number")
        .or_else(|| xml::first(root, "number"))
        .ok_or_else(|| NotifyError::missing(origin, "number"))?;
    let number = xml::parse_number(&xml::text(number_node), "number", origin)?;

    let mut revisions: Vec<RecordedRevision> = Vec::new();
    for state in xml::all(root, SVN_STATE) {
        for entry in xml::all(state, "entry") {
            let url = xml::required_text(entry, "string", origin)?;
            let rev = xml::required_text(entry, "long", origin)?;
            let rev = xml::parse_number(&rev, "long", origin)?;
            record(
                &mut revisions,
                RepositoryReference::svn(url),
                Revision::Number(rev),
                origin,
            )?;
        }
    }

    for data in xml::all(root, GIT_BUILD_DATA) {
        // XStream writes repeated objects as back-references.
        if data.attribute("reference").is_some() {
            continue;
        }
        let remotes = xml::first(data, "remoteUrls")
            .ok_or_else(|| NotifyError::missing(origin, "remoteUrls"))?;
        let url = xml::required_text(remotes, "string", origin)?;
        let sha1 = xml::first(data, "lastBuild")
            .and_then(find_sha1)
            .or_else(|| find_sha1(data))
            .ok_or_else(|| NotifyError::missing(origin, "sha1"))?;
        record(
            &mut revisions,
            RepositoryReference::git(url),
            Revision::Hash(xml::text(sha1)),
            origin,
        )?;
    }

    let mut upstream: Vec<UpstreamRef> = Vec::new();
    for project in xml::all(root, "upstreamProject") {
        let Some(cause) = project.parent_element() else {
            continue;
        };
        let build = xml::child(cause, "upstreamBuild")
            .ok_or_else(|| NotifyError::missing(origin, "upstreamBuild"))?;
        let reference = UpstreamRef {
            job: xml::text(project),
            build: xml::parse_number(&xml::text(build), "upstreamBuild", origin)?,
        };
        if !upstream.contains(&reference) {
            upstream.push(reference);
        }
    }

    Ok(BuildRecord {
        job: job.to_string(),
        number,
        revisions,
        upstream,
    })
}

fn find_sha1<'a, 'i>(node: Node<'a, 'i>) -> Option<Node<'a, 'i>> {
    node.descendants()
        .skip(1)
        .find(|n| n.is_element() && n.tag_name().name().eq_ignore_ascii_case("sha1"))
}

fn record(
    revisions: &mut Vec<RecordedRevision>,
    repository: RepositoryReference,
    revision: Revision,
    origin: &str,
) -> Result<()> {
    if let Some(existing) = revisions
        .iter()
        .find(|r| r.repository.url == repository.url)
    {
        if existing.repository.kind != repository.kind {
            return Err(NotifyError::AmbiguousRepository {
                origin: origin.to_string(),
                url: repository.url,
            });
        }
        return Ok(());
    }
    revisions.push(RecordedRevision {
        repository,
        revision,
    });
    Ok(())
}
