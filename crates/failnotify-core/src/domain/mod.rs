//! Domain types shared by the notification pipeline stages.

pub mod build;
pub mod commit;
pub mod error;
pub mod request;

pub use build::{
    BuildRecord, LastPass, RecordedRevision, RepositoryReference, Revision, UpstreamRef, VcsKind,
};
pub use commit::{Commit, HarvestStatus, JobChanges, RepositoryChanges};
pub use error::{NotifyError, Result};
pub use request::{Incident, NotifyRequest, SourceSelection};
