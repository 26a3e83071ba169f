//! Atomic multi-file commits over a Git host's object and ref API
//!
//! Given a batch of in-memory files, [`CommitBuilder`] creates exactly one new
//! commit on a remote branch and advances the branch only if nobody else moved
//! it in the meantime. No local working copy is involved.
//!
//! ```ignore
//! use bridge_git::{CommitBuilder, CommitRequest, FileChange, GithubHost, RepoCoordinate};
//!
//! let host = GithubHost::new(token)?;
//! let builder = CommitBuilder::new(host, "main");
//! let request = CommitRequest::new(RepoCoordinate::new("octo", "site"), "Update docs")
//!     .with_file(FileChange::text("docs/index.md", "# Hello\n"));
//! let outcome = builder.build_and_push(&request).await?;
//! println!("{}", outcome.commit_id);
//! ```

pub mod builder;
pub mod error;
pub mod github;
pub mod host;
pub mod naming;
pub mod objects;
pub mod path;
pub mod request;

pub use builder::{CommitBuilder, CommitOutcome};
pub use error::{Error, HostError, HostResult, Result, RetryHint, Step, ValidationError};
pub use github::GithubHost;
pub use host::RepositoryHost;
pub use objects::{
    BlobId, CommitId, RefUpdate, RepoCoordinate, TreeEntry, TreeEntryContent, TreeId,
};
pub use request::{CommitRequest, ContentEncoding, FileChange, FilePayload, ValidatedCommit};
