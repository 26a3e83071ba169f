//! Content-addressed object store shared by the in-memory and HTTP fakes.
//!
//! Objects are keyed by the SHA-256 of a canonical encoding, so writing the
//! same content twice yields the same id, as on a real Git host. Trees are
//! flat `path -> blob` maps; that is enough to observe what a commit contains.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use bridge_git::{BlobId, CommitId, RepoCoordinate, TreeId};
use sha2::{Digest, Sha256};

/// A commit as stored in the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCommit {
    pub tree: TreeId,
    pub parents: Vec<CommitId>,
    pub message: String,
}

#[derive(Debug, Default)]
struct Inner {
    blobs: HashMap<String, Vec<u8>>,
    trees: HashMap<String, BTreeMap<String, String>>,
    commits: HashMap<String, StoredCommit>,
    refs: HashMap<(String, String), CommitId>,
}

/// Thread-safe handle to a shared object store. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ObjectStore {
    inner: Arc<Mutex<Inner>>,
}

fn digest(kind: &str, parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update([0u8]);
    for part in parts {
        hasher.update(part);
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

fn ref_key(repo: &RepoCoordinate, branch: &str) -> (String, String) {
    (repo.to_string(), branch.to_string())
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking test must not poison the store for the others.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn put_blob(&self, content: &[u8]) -> BlobId {
        let id = digest("blob", &[content]);
        self.lock().blobs.insert(id.clone(), content.to_vec());
        BlobId::new(id)
    }

    pub fn blob(&self, id: &str) -> Option<Vec<u8>> {
        self.lock().blobs.get(id).cloned()
    }

    /// Store a tree given as `path -> blob id`. Fails if a blob is unknown or
    /// a path needs another file to be a directory.
    pub fn put_tree(&self, entries: BTreeMap<String, String>) -> Option<TreeId> {
        let mut inner = self.lock();
        if entries.values().any(|blob| !inner.blobs.contains_key(blob)) {
            return None;
        }
        let nested_under_file = entries.keys().any(|path| {
            path.match_indices('/')
                .any(|(i, _)| entries.contains_key(&path[..i]))
        });
        if nested_under_file {
            return None;
        }
        let mut encoded = Vec::new();
        for (path, blob) in &entries {
            encoded.extend_from_slice(path.as_bytes());
            encoded.push(0);
            encoded.extend_from_slice(blob.as_bytes());
            encoded.push(b'\n');
        }
        let id = digest("tree", &[encoded.as_slice()]);
        inner.trees.insert(id.clone(), entries);
        Some(TreeId::new(id))
    }

    pub fn tree(&self, id: &str) -> Option<BTreeMap<String, String>> {
        self.lock().trees.get(id).cloned()
    }

    /// Copy `base` and write `overlay` (path -> blob id) on top of it.
    pub fn overlay_tree(&self, base: &str, overlay: &[(String, String)]) -> Option<TreeId> {
        let mut entries = self.tree(base)?;
        for (path, blob) in overlay {
            entries.insert(path.clone(), blob.clone());
        }
        self.put_tree(entries)
    }

    /// Store a commit. Fails if the tree or a parent is unknown.
    pub fn put_commit(&self, tree: &TreeId, parents: &[CommitId], message: &str) -> Option<CommitId> {
        let mut inner = self.lock();
        if !inner.trees.contains_key(tree.as_str())
            || parents.iter().any(|p| !inner.commits.contains_key(p.as_str()))
        {
            return None;
        }
        let parent_list = parents
            .iter()
            .map(CommitId::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        let id = digest(
            "commit",
            &[tree.as_str().as_bytes(), parent_list.as_bytes(), message.as_bytes()],
        );
        inner.commits.insert(
            id.clone(),
            StoredCommit {
                tree: tree.clone(),
                parents: parents.to_vec(),
                message: message.to_string(),
            },
        );
        Some(CommitId::new(id))
    }

    pub fn commit(&self, id: &CommitId) -> Option<StoredCommit> {
        self.lock().commits.get(id.as_str()).cloned()
    }

    /// Create a root commit holding `files` and point `branch` at it.
    pub fn seed_branch<C: AsRef<[u8]>>(
        &self,
        repo: &RepoCoordinate,
        branch: &str,
        files: &[(&str, C)],
    ) -> CommitId {
        let entries = files
            .iter()
            .map(|(path, content)| {
                (path.to_string(), self.put_blob(content.as_ref()).to_string())
            })
            .collect();
        let tree = self
            .put_tree(entries)
            .expect("seed_branch: blobs were just written");
        let commit = self
            .put_commit(&tree, &[], "Initial commit")
            .expect("seed_branch: tree was just written");
        self.set_head(repo, branch, &commit);
        commit
    }

    pub fn head(&self, repo: &RepoCoordinate, branch: &str) -> Option<CommitId> {
        self.lock().refs.get(&ref_key(repo, branch)).cloned()
    }

    /// Move a branch unconditionally, as another writer would.
    pub fn set_head(&self, repo: &RepoCoordinate, branch: &str, commit: &CommitId) {
        self.lock().refs.insert(ref_key(repo, branch), commit.clone());
    }

    /// Exact compare-and-swap. Returns the current value on mismatch.
    pub fn compare_and_swap(
        &self,
        repo: &RepoCoordinate,
        branch: &str,
        expected: &CommitId,
        new: &CommitId,
    ) -> Result<(), Option<CommitId>> {
        let mut inner = self.lock();
        match inner.refs.get_mut(&ref_key(repo, branch)) {
            Some(current) if *current == *expected => {
                *current = new.clone();
                Ok(())
            }
            Some(current) => Err(Some(current.clone())),
            None => Err(None),
        }
    }

    /// Whether `ancestor` is reachable from `descendant` (inclusive).
    pub fn is_ancestor(&self, ancestor: &CommitId, descendant: &CommitId) -> bool {
        let inner = self.lock();
        let mut pending = vec![descendant.clone()];
        let mut seen = HashSet::new();
        while let Some(id) = pending.pop() {
            if &id == ancestor {
                return true;
            }
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(commit) = inner.commits.get(id.as_str()) {
                pending.extend(commit.parents.iter().cloned());
            }
        }
        false
    }

    /// Every file in the tree of `commit`, decoded.
    pub fn files_at(&self, commit: &CommitId) -> BTreeMap<String, Vec<u8>> {
        let Some(stored) = self.commit(commit) else {
            return BTreeMap::new();
        };
        let tree = self.tree(stored.tree.as_str()).unwrap_or_default();
        tree.into_iter()
            .filter_map(|(path, blob)| self.blob(&blob).map(|bytes| (path, bytes)))
            .collect()
    }

    /// Contents of `path` at `commit`, if present.
    pub fn read_file(&self, commit: &CommitId, path: &str) -> Option<Vec<u8>> {
        self.files_at(commit).remove(path)
    }

    /// Number of distinct trees stored.
    pub fn tree_count(&self) -> usize {
        self.lock().trees.len()
    }

    /// Number of distinct commits stored.
    pub fn commit_count(&self) -> usize {
        self.lock().commits.len()
    }
}
