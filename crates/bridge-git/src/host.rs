//! Repository host trait
//!
//! The commit builder never talks HTTP directly. It drives a
//! [`RepositoryHost`], which exposes the five object and ref primitives a Git
//! hosting service offers.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HostResult;
use crate::objects::{BlobId, CommitId, RefUpdate, RepoCoordinate, TreeEntry, TreeId};

/// Object-and-ref API of a remote Git host.
///
/// Implementations must not retry on their own and must report a refused
/// conditional update as [`RefUpdate::Rejected`] rather than as an error.
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Current commit of `branch`, or `None` if the branch does not exist.
    async fn branch_head(&self, repo: &RepoCoordinate, branch: &str)
    -> HostResult<Option<CommitId>>;

    /// Root tree of a commit.
    async fn commit_tree(&self, repo: &RepoCoordinate, commit: &CommitId) -> HostResult<TreeId>;

    /// Store raw bytes as a blob.
    async fn create_blob(&self, repo: &RepoCoordinate, content: &[u8]) -> HostResult<BlobId>;

    /// Create a tree from `base` with `entries` written over it.
    async fn create_tree(
        &self,
        repo: &RepoCoordinate,
        base: &TreeId,
        entries: &[TreeEntry],
    ) -> HostResult<TreeId>;

    /// Create a commit object. Does not move any ref.
    async fn create_commit(
        &self,
        repo: &RepoCoordinate,
        tree: &TreeId,
        parents: &[CommitId],
        message: &str,
    ) -> HostResult<CommitId>;

    /// Move `branch` from `expected` to `new` without forcing.
    async fn update_branch(
        &self,
        repo: &RepoCoordinate,
        branch: &str,
        expected: &CommitId,
        new: &CommitId,
    ) -> HostResult<RefUpdate>;
}

#[async_trait]
impl<T: RepositoryHost + ?Sized> RepositoryHost for Arc<T> {
    async fn branch_head(
        &self,
        repo: &RepoCoordinate,
        branch: &str,
    ) -> HostResult<Option<CommitId>> {
        (**self).branch_head(repo, branch).await
    }

    async fn commit_tree(&self, repo: &RepoCoordinate, commit: &CommitId) -> HostResult<TreeId> {
        (**self).commit_tree(repo, commit).await
    }

    async fn create_blob(&self, repo: &RepoCoordinate, content: &[u8]) -> HostResult<BlobId> {
        (**self).create_blob(repo, content).await
    }

    async fn create_tree(
        &self,
        repo: &RepoCoordinate,
        base: &TreeId,
        entries: &[TreeEntry],
    ) -> HostResult<TreeId> {
        (**self).create_tree(repo, base, entries).await
    }

    async fn create_commit(
        &self,
        repo: &RepoCoordinate,
        tree: &TreeId,
        parents: &[CommitId],
        message: &str,
    ) -> HostResult<CommitId> {
        (**self).create_commit(repo, tree, parents, message).await
    }

    async fn update_branch(
        &self,
        repo: &RepoCoordinate,
        branch: &str,
        expected: &CommitId,
        new: &CommitId,
    ) -> HostResult<RefUpdate> {
        (**self).update_branch(repo, branch, expected, new).await
    }
}
