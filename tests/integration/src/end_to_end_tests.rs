//! End-to-end tests
//!
//! The real server, configured from a TOML file and environment overrides,
//! listening on a local port and talking HTTP to fake GitHub and Render APIs.

use std::io::Write;

use bridge_config::BridgeConfig;
use bridge_git::CommitId;
use bridge_mcp::{AppState, router};
use bridge_test_utils::{FakeGithub, FakeRender, ObjectStore, TestServer, fake_github, fake_render, test_repo};
use serde_json::{Value, json};
use tempfile::NamedTempFile;

// =============================================================================
// Test Infrastructure
// =============================================================================

struct Bridge {
    server: TestServer,
    http: reqwest::Client,
    _config: NamedTempFile,
}

impl Bridge {
    /// Start a bridge wired to `github` and, optionally, `render`.
    async fn start(github: &FakeGithub, render: Option<&FakeRender>) -> Self {
        let mut toml = format!(
            "[github]\nowner = \"octo\"\nrepo = \"site\"\napi_base = \"{}\"\n\n[server]\ncommit_timeout_secs = 10\n",
            github.base_url()
        );
        if let Some(render) = render {
            toml.push_str(&format!(
                "\n[render]\nservice_id = \"srv-abc\"\napi_base = \"{}\"\n",
                render.base_url()
            ));
        }
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        // Secrets come from the environment, as in production.
        let config = BridgeConfig::load(Some(file.path()), |key| match key {
            "GITHUB_PAT" => Some(fake_github::TOKEN.to_string()),
            "RENDER_API_KEY" if render.is_some() => Some(fake_render::API_KEY.to_string()),
            _ => None,
        })
        .unwrap();

        let state = AppState::from_config(&config).unwrap();
        Self {
            server: TestServer::spawn(router(state)).await,
            http: reqwest::Client::new(),
            _config: file,
        }
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let response = self
            .http
            .post(format!("{}{}", self.server.base_url(), path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn rpc(&self, id: u64, method: &str, params: Value) -> Value {
        let (status, body) = self
            .post(
                "/mcp",
                json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }),
            )
            .await;
        assert_eq!(status, 200, "{body}");
        body
    }
}

async fn github_with_main() -> (FakeGithub, CommitId) {
    let store = ObjectStore::new();
    let c0 = store.seed_branch(&test_repo(), "main", &[("index.html", "<h1>v1</h1>")]);
    (FakeGithub::start(store).await, c0)
}

// =============================================================================
// Commits
// =============================================================================

#[tokio::test]
async fn test_rest_commit_reaches_github() {
    let (github, c0) = github_with_main().await;
    let bridge = Bridge::start(&github, None).await;

    let (status, body) = bridge
        .post(
            "/mcp/git_commit_and_push",
            json!({
                "commitMessage": "Publish v2",
                "files": [
                    { "path": "index.html", "content": "<h1>v2</h1>" },
                    { "path": "assets/app.js", "content": "console.log(2)" }
                ]
            }),
        )
        .await;

    assert_eq!(status, 200, "{body}");
    let sha = CommitId::new(body["commitSha"].as_str().unwrap());
    let store = github.store();
    assert_eq!(store.head(&test_repo(), "main"), Some(sha.clone()));
    assert_eq!(store.commit(&sha).unwrap().parents, vec![c0]);
    assert_eq!(store.read_file(&sha, "index.html"), Some(b"<h1>v2</h1>".to_vec()));
    assert_eq!(store.read_file(&sha, "assets/app.js"), Some(b"console.log(2)".to_vec()));
}

#[tokio::test]
async fn test_sequential_commits_stack() {
    let (github, _) = github_with_main().await;
    let bridge = Bridge::start(&github, None).await;

    let mut previous = None;
    for i in 0..3 {
        let (status, body) = bridge
            .post(
                "/mcp/git_commit_and_push",
                json!({
                    "commitMessage": format!("step {i}"),
                    "files": [{ "path": "counter.txt", "content": i.to_string() }]
                }),
            )
            .await;
        assert_eq!(status, 200, "{body}");
        if let Some(previous) = previous {
            assert_eq!(body["baseCommitSha"], previous);
        }
        previous = Some(body["commitSha"].clone());
    }
}

#[tokio::test]
async fn test_missing_branch_is_404_and_sends_one_request() {
    let (github, _) = github_with_main().await;
    let bridge = Bridge::start(&github, None).await;

    let (status, body) = bridge
        .post(
            "/mcp/git_commit_and_push",
            json!({
                "branch": "release",
                "commitMessage": "m",
                "files": [{ "path": "a", "content": "b" }]
            }),
        )
        .await;

    assert_eq!(status, 404);
    assert_eq!(body["kind"], "branch_not_found");
    assert_eq!(github.request_count(), 1);
}

#[tokio::test]
async fn test_mcp_session_commits_binary_file() {
    let (github, _) = github_with_main().await;
    let bridge = Bridge::start(&github, None).await;

    let init = bridge
        .rpc(1, "initialize", json!({ "protocolVersion": "2024-11-05", "capabilities": {} }))
        .await;
    assert_eq!(init["result"]["protocolVersion"], "2024-11-05");

    let call = bridge
        .rpc(
            2,
            "tools/call",
            json!({
                "name": "git_commit_and_push",
                "arguments": {
                    "commitMessage": "favicon",
                    "files": [{ "path": "favicon.ico", "content": "AAABAAEAEBA=", "encoding": "base64" }]
                }
            }),
        )
        .await;

    let result = &call["result"];
    assert!(result.get("isError").is_none(), "{result}");
    let sha = CommitId::new(result["structuredContent"]["commitSha"].as_str().unwrap());
    assert_eq!(
        github.store().read_file(&sha, "favicon.ico"),
        Some(vec![0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x10, 0x10])
    );
}

// =============================================================================
// Deploys
// =============================================================================

#[tokio::test]
async fn test_deploy_through_configured_render() {
    let (github, _) = github_with_main().await;
    let render = FakeRender::start(&["srv-abc"]).await;
    let bridge = Bridge::start(&github, Some(&render)).await;

    let (status, body) = bridge.post("/mcp/render_deploy", json!({})).await;

    assert_eq!(status, 200, "{body}");
    assert_eq!(body["deployId"], "dep-0001");
    assert_eq!(render.deploy_count(), 1);
}

#[tokio::test]
async fn test_deploy_tool_without_render_is_tool_error() {
    let (github, _) = github_with_main().await;
    let bridge = Bridge::start(&github, None).await;

    let call = bridge
        .rpc(3, "tools/call", json!({ "name": "render_deploy", "arguments": {} }))
        .await;

    assert_eq!(call["result"]["isError"], true);
}
