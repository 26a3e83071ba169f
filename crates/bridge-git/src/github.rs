//! GitHub implementation of [`RepositoryHost`]
//!
//! Uses the Git Data REST endpoints (`/repos/{owner}/{repo}/git/...`), so no
//! local clone is involved.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{HostError, HostResult};
use crate::host::RepositoryHost;
use crate::objects::{
    BlobId, CommitId, REGULAR_FILE_MODE, RefUpdate, RepoCoordinate, TreeEntry, TreeEntryContent,
    TreeId,
};

/// Public GitHub API root.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("commit-bridge/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ObjectRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    object: ObjectRef,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    tree: ObjectRef,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Serialize)]
struct CreateBlob<'a> {
    content: &'a str,
    encoding: &'static str,
}

#[derive(Debug, Serialize)]
struct GithubTreeEntry<'a> {
    path: &'a str,
    mode: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CreateTree<'a> {
    base_tree: &'a str,
    tree: Vec<GithubTreeEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct CreateCommit<'a> {
    message: &'a str,
    tree: &'a str,
    parents: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct UpdateRef<'a> {
    sha: &'a str,
    force: bool,
}

/// GitHub REST client scoped to Git objects and refs.
#[derive(Clone)]
pub struct GithubHost {
    http: Client,
    api_base: String,
    token: String,
}

impl std::fmt::Debug for GithubHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubHost")
            .field("api_base", &self.api_base)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl GithubHost {
    /// Client for api.github.com.
    pub fn new(token: impl Into<String>) -> HostResult<Self> {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    /// Client for a GitHub Enterprise server or a test double.
    pub fn with_api_base(token: impl Into<String>, api_base: impl Into<String>) -> HostResult<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HostError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn git_url(&self, repo: &RepoCoordinate, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/git/{}",
            self.api_base,
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.name),
            tail
        )
    }

    fn request(&self, method: reqwest::Method, url: String) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Send a request and decode a successful JSON body.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> HostResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| HostError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| HostError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| HostError::Decode(e.to_string()))
    }
}

/// Build a status error, preferring GitHub's `message` field over the raw body.
fn status_error(status: StatusCode, body: &str) -> HostError {
    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.message,
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string(),
        Err(_) => body.to_string(),
    };
    HostError::Status {
        status: status.as_u16(),
        message,
    }
}

/// Percent-encode a branch for use in a URL path, keeping `/` separators.
fn ref_path(branch: &str) -> String {
    branch
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl RepositoryHost for GithubHost {
    async fn branch_head(
        &self,
        repo: &RepoCoordinate,
        branch: &str,
    ) -> HostResult<Option<CommitId>> {
        // The singular `ref` endpoint matches exactly; `refs` would also
        // return every branch sharing the prefix.
        let url = self.git_url(repo, &format!("ref/heads/{}", ref_path(branch)));
        match self.send::<RefResponse>(self.request(reqwest::Method::GET, url)).await {
            Ok(r) => Ok(Some(CommitId::new(r.object.sha))),
            // Also what GitHub says for an unknown or invisible repository.
            Err(HostError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn commit_tree(&self, repo: &RepoCoordinate, commit: &CommitId) -> HostResult<TreeId> {
        let url = self.git_url(repo, &format!("commits/{}", commit));
        let response: CommitResponse = self.send(self.request(reqwest::Method::GET, url)).await?;
        Ok(TreeId::new(response.tree.sha))
    }

    async fn create_blob(&self, repo: &RepoCoordinate, content: &[u8]) -> HostResult<BlobId> {
        let encoded = STANDARD.encode(content);
        let body = CreateBlob {
            content: &encoded,
            encoding: "base64",
        };
        let url = self.git_url(repo, "blobs");
        let response: ObjectRef = self
            .send(self.request(reqwest::Method::POST, url).json(&body))
            .await?;
        Ok(BlobId::new(response.sha))
    }

    async fn create_tree(
        &self,
        repo: &RepoCoordinate,
        base: &TreeId,
        entries: &[TreeEntry],
    ) -> HostResult<TreeId> {
        let tree = entries
            .iter()
            .map(|entry| {
                let (content, sha) = match &entry.content {
                    TreeEntryContent::Inline(text) => (Some(text.as_str()), None),
                    TreeEntryContent::Blob(blob) => (None, Some(blob.as_str())),
                };
                GithubTreeEntry {
                    path: &entry.path,
                    mode: REGULAR_FILE_MODE,
                    kind: "blob",
                    content,
                    sha,
                }
            })
            .collect();
        let body = CreateTree {
            base_tree: base.as_str(),
            tree,
        };
        let url = self.git_url(repo, "trees");
        let response: ObjectRef = self
            .send(self.request(reqwest::Method::POST, url).json(&body))
            .await?;
        Ok(TreeId::new(response.sha))
    }

    async fn create_commit(
        &self,
        repo: &RepoCoordinate,
        tree: &TreeId,
        parents: &[CommitId],
        message: &str,
    ) -> HostResult<CommitId> {
        let body = CreateCommit {
            message,
            tree: tree.as_str(),
            parents: parents.iter().map(CommitId::as_str).collect(),
        };
        let url = self.git_url(repo, "commits");
        let response: ObjectRef = self
            .send(self.request(reqwest::Method::POST, url).json(&body))
            .await?;
        Ok(CommitId::new(response.sha))
    }

    async fn update_branch(
        &self,
        repo: &RepoCoordinate,
        branch: &str,
        expected: &CommitId,
        new: &CommitId,
    ) -> HostResult<RefUpdate> {
        // GitHub has no exact compare-and-swap on refs. A non-forced update
        // is refused unless `new` descends from the current head, and since
        // `new` has `expected` as its only parent that holds exactly when the
        // head is still `expected` (or an ancestor of it).
        tracing::debug!(%repo, branch, %expected, %new, "Updating branch");

        let body = UpdateRef {
            sha: new.as_str(),
            force: false,
        };
        let url = self.git_url(repo, &format!("refs/heads/{}", ref_path(branch)));
        match self
            .send::<serde_json::Value>(self.request(reqwest::Method::PATCH, url).json(&body))
            .await
        {
            Ok(_) => Ok(RefUpdate::Updated),
            Err(HostError::Status {
                status: 409 | 422,
                message,
            }) => Ok(RefUpdate::Rejected { message }),
            Err(e) => Err(e),
        }
    }
}
