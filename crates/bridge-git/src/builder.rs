//! Atomic multi-file commit construction
//!
//! A commit is built entirely from host-side objects:
//!
//! ```text
//! branch ──> base commit ──> base tree
//!                                │ + overlay entries
//!                                v
//!                            new tree ──> new commit ──(CAS)──> branch
//! ```
//!
//! Only the final ref update is visible to anyone else. Everything created
//! before it is content-addressed and harmless if left unreferenced, so a
//! failure or cancellation at any earlier point needs no cleanup.

use std::future::Future;
use std::time::Duration;

use futures_util::{FutureExt, StreamExt, TryStreamExt, stream};
use serde::Serialize;
use tokio::time::Instant;

use crate::error::{Error, HostResult, Result, Step};
use crate::host::RepositoryHost;
use crate::objects::{CommitId, RefUpdate, RepoCoordinate, TreeEntry, TreeEntryContent, TreeId};
use crate::request::{CommitRequest, FilePayload, ValidatedCommit, ValidatedFile};

/// Upper bound on blob uploads in flight for a single commit.
const MAX_CONCURRENT_UPLOADS: usize = 8;

/// Result of a commit that landed on its branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitOutcome {
    pub commit_id: CommitId,
    pub branch: String,
    pub base_commit_id: CommitId,
    pub tree_id: TreeId,
}

/// Shared deadline for every step of one pipeline run.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    limit: Duration,
}

/// Builds commits against a [`RepositoryHost`].
///
/// The builder holds no mutable state; one instance can serve any number of
/// concurrent requests. Conflicting writes to the same branch are serialized
/// by the host's conditional ref update, never by the builder.
#[derive(Debug, Clone)]
pub struct CommitBuilder<H> {
    host: H,
    default_branch: String,
    timeout: Option<Duration>,
}

impl<H: RepositoryHost> CommitBuilder<H> {
    /// Create a builder that commits to `default_branch` when a request
    /// names no branch.
    pub fn new(host: H, default_branch: impl Into<String>) -> Self {
        Self {
            host,
            default_branch: default_branch.into(),
            timeout: None,
        }
    }

    /// Bound each pipeline run by `limit`. On expiry the in-flight step is
    /// abandoned and nothing is rolled back.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Validate `request`, then create one commit holding all of its files
    /// and fast-forward the branch to it.
    ///
    /// Never retries. A lost race on the branch is reported as
    /// [`Error::ConcurrentUpdate`]; the caller decides whether to re-read
    /// and resubmit.
    pub async fn build_and_push(&self, request: &CommitRequest) -> Result<CommitOutcome> {
        let commit = request.validate(&self.default_branch)?;
        let deadline = self.timeout.map(|limit| Deadline {
            at: Instant::now() + limit,
            limit,
        });

        match self.run(&commit, deadline).await {
            Ok(outcome) => {
                tracing::info!(
                    repository = %commit.repository,
                    branch = %outcome.branch,
                    base = %outcome.base_commit_id,
                    commit = %outcome.commit_id,
                    files = commit.files.len(),
                    "Commit pushed"
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(
                    repository = %commit.repository,
                    branch = %commit.branch,
                    kind = e.kind(),
                    step = ?e.step(),
                    error = %e,
                    "Commit failed"
                );
                Err(e)
            }
        }
    }

    async fn run(&self, commit: &ValidatedCommit, deadline: Option<Deadline>) -> Result<CommitOutcome> {
        let repo = &commit.repository;
        let branch = commit.branch.as_str();

        let base = self
            .step(Step::ResolveHead, deadline, self.host.branch_head(repo, branch))
            .await?
            .ok_or_else(|| Error::BranchNotFound {
                repository: repo.to_string(),
                branch: branch.to_string(),
            })?;

        let base_tree = self
            .step(Step::ResolveBaseTree, deadline, self.host.commit_tree(repo, &base))
            .await?;

        let entries = self
            .step(Step::UploadBlobs, deadline, self.tree_entries(commit))
            .await?;

        let tree = self
            .step(
                Step::CreateTree,
                deadline,
                self.host.create_tree(repo, &base_tree, &entries),
            )
            .await?;

        let new_commit = self
            .step(
                Step::CreateCommit,
                deadline,
                self.host
                    .create_commit(repo, &tree, std::slice::from_ref(&base), &commit.message),
            )
            .await?;

        let update = self
            .step(
                Step::UpdateRef,
                deadline,
                self.host.update_branch(repo, branch, &base, &new_commit),
            )
            .await?;

        match update {
            RefUpdate::Updated => Ok(CommitOutcome {
                commit_id: new_commit,
                branch: branch.to_string(),
                base_commit_id: base,
                tree_id: tree,
            }),
            RefUpdate::Rejected { message } => Err(Error::ConcurrentUpdate {
                branch: branch.to_string(),
                expected: base,
                attempted: new_commit,
                message,
            }),
        }
    }

    /// Turn validated files into tree entries, uploading binary content as
    /// blobs first. Entry order matches request order.
    async fn tree_entries(&self, commit: &ValidatedCommit) -> HostResult<Vec<TreeEntry>> {
        let repo = &commit.repository;
        // Collected before streaming: `buffered` over a borrowing `map`
        // closure does not satisfy `Send`.
        let uploads: Vec<_> = commit
            .files
            .iter()
            .map(|file| self.tree_entry(repo, file).boxed())
            .collect();

        stream::iter(uploads)
            .buffered(MAX_CONCURRENT_UPLOADS)
            .try_collect()
            .await
    }

    async fn tree_entry(
        &self,
        repo: &RepoCoordinate,
        file: &ValidatedFile,
    ) -> HostResult<TreeEntry> {
        let content = match &file.payload {
            FilePayload::Text(text) => TreeEntryContent::Inline(text.clone()),
            FilePayload::Binary(bytes) => {
                TreeEntryContent::Blob(self.host.create_blob(repo, bytes).await?)
            }
        };
        Ok(TreeEntry {
            path: file.path.clone(),
            content,
        })
    }

    async fn step<T>(
        &self,
        step: Step,
        deadline: Option<Deadline>,
        call: impl Future<Output = HostResult<T>>,
    ) -> Result<T> {
        tracing::debug!(step = %step, "Running commit step");

        let result = match deadline {
            Some(Deadline { at, limit }) => tokio::time::timeout_at(at, call)
                .await
                .map_err(|_| Error::Timeout { step, limit })?,
            None => call.await,
        };

        result.map_err(|e| Error::upstream(step, e))
    }
}
