//! HTTP double of the GitHub Git Data API.
//!
//! Realism level: **WIRE**: serves the same routes, bodies and status codes
//! the real API uses for refs, commits, blobs and trees, over the shared
//! [`ObjectStore`]. Non-forced ref updates are fast-forward checked, exactly
//! as GitHub does.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bridge_git::{CommitId, RepoCoordinate, TreeId};
use serde::Deserialize;
use serde_json::json;

use crate::server::TestServer;
use crate::store::ObjectStore;

/// Bearer token the fake accepts.
pub const TOKEN: &str = "test-token";

#[derive(Clone)]
struct FakeState {
    store: ObjectStore,
    requests: Arc<AtomicUsize>,
}

/// A running fake GitHub API.
pub struct FakeGithub {
    server: TestServer,
    store: ObjectStore,
    requests: Arc<AtomicUsize>,
}

impl FakeGithub {
    /// Serve `store` on an ephemeral localhost port.
    pub async fn start(store: ObjectStore) -> Self {
        let requests = Arc::new(AtomicUsize::new(0));
        let state = FakeState {
            store: store.clone(),
            requests: Arc::clone(&requests),
        };
        let router = Router::new()
            .route("/repos/{owner}/{repo}/git/ref/heads/{*branch}", get(get_ref))
            .route("/repos/{owner}/{repo}/git/refs/heads/{*branch}", patch(update_ref))
            .route("/repos/{owner}/{repo}/git/commits/{sha}", get(get_commit))
            .route("/repos/{owner}/{repo}/git/commits", post(create_commit))
            .route("/repos/{owner}/{repo}/git/blobs", post(create_blob))
            .route("/repos/{owner}/{repo}/git/trees", post(create_tree))
            .with_state(state);

        Self {
            server: TestServer::spawn(router).await,
            store,
            requests,
        }
    }

    /// API root to hand to `GithubHost::with_api_base`.
    pub fn base_url(&self) -> String {
        self.server.base_url()
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Requests received so far, including rejected ones.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({
            "message": message,
            "documentation_url": "https://docs.github.com/rest",
        })),
    )
        .into_response()
}

/// Count the request and check the bearer token.
fn admit(state: &FakeState, headers: &HeaderMap) -> Result<(), Response> {
    state.requests.fetch_add(1, Ordering::SeqCst);
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"));
    if authorized {
        Ok(())
    } else {
        Err(error(StatusCode::UNAUTHORIZED, "Bad credentials"))
    }
}

async fn get_ref(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Path((owner, repo, branch)): Path<(String, String, String)>,
) -> Response {
    if let Err(rejection) = admit(&state, &headers) {
        return rejection;
    }
    let coordinate = RepoCoordinate::new(owner, repo);
    match state.store.head(&coordinate, &branch) {
        Some(sha) => Json(json!({
            "ref": format!("refs/heads/{branch}"),
            "object": { "type": "commit", "sha": sha },
        }))
        .into_response(),
        None => error(StatusCode::NOT_FOUND, "Not Found"),
    }
}

async fn get_commit(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Path((_owner, _repo, sha)): Path<(String, String, String)>,
) -> Response {
    if let Err(rejection) = admit(&state, &headers) {
        return rejection;
    }
    match state.store.commit(&CommitId::new(sha.clone())) {
        Some(commit) => Json(json!({
            "sha": sha,
            "message": commit.message,
            "tree": { "sha": commit.tree },
            "parents": commit.parents.iter().map(|p| json!({ "sha": p })).collect::<Vec<_>>(),
        }))
        .into_response(),
        None => error(StatusCode::NOT_FOUND, "Not Found"),
    }
}

#[derive(Deserialize)]
struct BlobBody {
    content: String,
    #[serde(default = "default_blob_encoding")]
    encoding: String,
}

fn default_blob_encoding() -> String {
    "utf-8".into()
}

async fn create_blob(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(body): Json<BlobBody>,
) -> Response {
    if let Err(rejection) = admit(&state, &headers) {
        return rejection;
    }
    let bytes = match body.encoding.as_str() {
        "base64" => match STANDARD.decode(body.content.as_bytes()) {
            Ok(bytes) => bytes,
            Err(_) => return error(StatusCode::UNPROCESSABLE_ENTITY, "Invalid base64 content"),
        },
        "utf-8" | "utf8" => body.content.into_bytes(),
        _ => return error(StatusCode::UNPROCESSABLE_ENTITY, "Invalid encoding"),
    };
    let sha = state.store.put_blob(&bytes);
    (StatusCode::CREATED, Json(json!({ "sha": sha }))).into_response()
}

#[derive(Deserialize)]
struct TreeEntryBody {
    path: String,
    mode: String,
    #[serde(rename = "type")]
    kind: String,
    content: Option<String>,
    sha: Option<String>,
}

#[derive(Deserialize)]
struct TreeBody {
    base_tree: Option<String>,
    tree: Vec<TreeEntryBody>,
}

async fn create_tree(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(body): Json<TreeBody>,
) -> Response {
    if let Err(rejection) = admit(&state, &headers) {
        return rejection;
    }

    let mut overlay = Vec::with_capacity(body.tree.len());
    for entry in body.tree {
        if entry.mode != "100644" || entry.kind != "blob" {
            return error(StatusCode::UNPROCESSABLE_ENTITY, "Invalid tree entry mode or type");
        }
        if entry.path.is_empty() || entry.path.starts_with('/') {
            return error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "tree.path contains a malformed path component",
            );
        }
        let blob = match (entry.content, entry.sha) {
            (Some(text), None) => state.store.put_blob(text.as_bytes()).to_string(),
            (None, Some(sha)) => sha,
            _ => {
                return error(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "Must supply either tree.sha or tree.content",
                );
            }
        };
        overlay.push((entry.path, blob));
    }

    let tree = match body.base_tree {
        Some(base) => state.store.overlay_tree(&base, &overlay),
        None => state.store.put_tree(overlay.into_iter().collect::<BTreeMap<_, _>>()),
    };
    match tree {
        Some(sha) => (StatusCode::CREATED, Json(json!({ "sha": sha }))).into_response(),
        None => error(StatusCode::UNPROCESSABLE_ENTITY, "Invalid tree info"),
    }
}

#[derive(Deserialize)]
struct CommitBody {
    message: String,
    tree: String,
    #[serde(default)]
    parents: Vec<String>,
}

async fn create_commit(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(body): Json<CommitBody>,
) -> Response {
    if let Err(rejection) = admit(&state, &headers) {
        return rejection;
    }
    let parents: Vec<CommitId> = body.parents.into_iter().map(CommitId::new).collect();
    match state
        .store
        .put_commit(&TreeId::new(body.tree), &parents, &body.message)
    {
        Some(sha) => (StatusCode::CREATED, Json(json!({ "sha": sha }))).into_response(),
        None => error(StatusCode::UNPROCESSABLE_ENTITY, "Tree SHA or parent SHA does not exist"),
    }
}

#[derive(Deserialize)]
struct UpdateRefBody {
    sha: String,
    #[serde(default)]
    force: bool,
}

async fn update_ref(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Path((owner, repo, branch)): Path<(String, String, String)>,
    Json(body): Json<UpdateRefBody>,
) -> Response {
    if let Err(rejection) = admit(&state, &headers) {
        return rejection;
    }
    let coordinate = RepoCoordinate::new(owner, repo);
    let new = CommitId::new(body.sha);
    if state.store.commit(&new).is_none() {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "Object does not exist");
    }
    let Some(current) = state.store.head(&coordinate, &branch) else {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "Reference does not exist");
    };
    if !body.force && !state.store.is_ancestor(&current, &new) {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "Update is not a fast forward");
    }
    // Re-check under the store's own CAS so two fast-forwards cannot interleave.
    if state
        .store
        .compare_and_swap(&coordinate, &branch, &current, &new)
        .is_err()
    {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "Update is not a fast forward");
    }
    Json(json!({
        "ref": format!("refs/heads/{branch}"),
        "object": { "type": "commit", "sha": new },
    }))
    .into_response()
}
