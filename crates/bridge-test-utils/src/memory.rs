//! In-process [`RepositoryHost`] backed by an [`ObjectStore`].
//!
//! Realism level: **FAKE**: real content addressing and an exact ref
//! compare-and-swap, no HTTP. Supports call recording, fault injection,
//! artificial latency and a barrier that holds ref updates until several
//! requests are in flight (for race tests).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bridge_git::{
    BlobId, CommitId, HostError, HostResult, RefUpdate, RepoCoordinate, RepositoryHost,
    TreeEntry, TreeEntryContent, TreeId,
};
use tokio::sync::Barrier;

use crate::store::ObjectStore;

/// The host primitive that was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostCall {
    BranchHead,
    CommitTree,
    CreateBlob,
    CreateTree,
    CreateCommit,
    UpdateBranch,
}

/// In-memory repository host.
#[derive(Debug, Default)]
pub struct InMemoryHost {
    store: ObjectStore,
    calls: Mutex<Vec<HostCall>>,
    failures: Mutex<HashMap<HostCall, HostError>>,
    delays: Mutex<HashMap<HostCall, Duration>>,
    update_gate: Option<Arc<Barrier>>,
}

impl InMemoryHost {
    pub fn new(store: ObjectStore) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    /// Make every call of kind `call` fail with `error`.
    pub fn fail_on(self, call: HostCall, error: HostError) -> Self {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(call, error);
        self
    }

    /// Sleep before answering every call of kind `call`.
    pub fn delay_on(self, call: HostCall, delay: Duration) -> Self {
        self.delays
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(call, delay);
        self
    }

    /// Hold every ref update until `parties` updates are waiting, then let
    /// them all through. Each racer has read its base by then.
    pub fn hold_updates_until(mut self, parties: usize) -> Self {
        self.update_gate = Some(Arc::new(Barrier::new(parties)));
        self
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    async fn enter(&self, call: HostCall) -> HostResult<()> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);

        let delay = self
            .delays
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&call)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self
            .failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&call)
            .cloned();
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn unprocessable(message: impl Into<String>) -> HostError {
    HostError::Status {
        status: 422,
        message: message.into(),
    }
}

#[async_trait]
impl RepositoryHost for InMemoryHost {
    async fn branch_head(
        &self,
        repo: &RepoCoordinate,
        branch: &str,
    ) -> HostResult<Option<CommitId>> {
        self.enter(HostCall::BranchHead).await?;
        Ok(self.store.head(repo, branch))
    }

    async fn commit_tree(&self, _repo: &RepoCoordinate, commit: &CommitId) -> HostResult<TreeId> {
        self.enter(HostCall::CommitTree).await?;
        self.store
            .commit(commit)
            .map(|c| c.tree)
            .ok_or_else(|| HostError::Status {
                status: 404,
                message: "Not Found".into(),
            })
    }

    async fn create_blob(&self, _repo: &RepoCoordinate, content: &[u8]) -> HostResult<BlobId> {
        self.enter(HostCall::CreateBlob).await?;
        Ok(self.store.put_blob(content))
    }

    async fn create_tree(
        &self,
        _repo: &RepoCoordinate,
        base: &TreeId,
        entries: &[TreeEntry],
    ) -> HostResult<TreeId> {
        self.enter(HostCall::CreateTree).await?;
        let overlay: Vec<(String, String)> = entries
            .iter()
            .map(|entry| {
                let blob = match &entry.content {
                    TreeEntryContent::Inline(text) => self.store.put_blob(text.as_bytes()),
                    TreeEntryContent::Blob(blob) => blob.clone(),
                };
                (entry.path.clone(), blob.to_string())
            })
            .collect();
        self.store
            .overlay_tree(base.as_str(), &overlay)
            .ok_or_else(|| unprocessable("Invalid tree info"))
    }

    async fn create_commit(
        &self,
        _repo: &RepoCoordinate,
        tree: &TreeId,
        parents: &[CommitId],
        message: &str,
    ) -> HostResult<CommitId> {
        self.enter(HostCall::CreateCommit).await?;
        self.store
            .put_commit(tree, parents, message)
            .ok_or_else(|| unprocessable("tree or parent does not exist"))
    }

    async fn update_branch(
        &self,
        repo: &RepoCoordinate,
        branch: &str,
        expected: &CommitId,
        new: &CommitId,
    ) -> HostResult<RefUpdate> {
        if let Some(gate) = &self.update_gate {
            gate.wait().await;
        }
        self.enter(HostCall::UpdateBranch).await?;
        match self.store.compare_and_swap(repo, branch, expected, new) {
            Ok(()) => Ok(RefUpdate::Updated),
            Err(Some(current)) => Ok(RefUpdate::Rejected {
                message: format!("Reference is at {current}, expected {expected}"),
            }),
            Err(None) => Ok(RefUpdate::Rejected {
                message: "Reference does not exist".into(),
            }),
        }
    }
}
