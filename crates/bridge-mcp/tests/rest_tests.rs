//! REST routes of the bridge, driven through the router in-process.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use bridge_deploy::RenderClient;
use bridge_git::{CommitBuilder, CommitId, HostError, RepositoryHost};
use bridge_mcp::{AppState, router};
use bridge_test_utils::fake_render::API_KEY;
use bridge_test_utils::{FakeRender, HostCall, InMemoryHost, ObjectStore, test_repo};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

fn state_for(host: InMemoryHost) -> AppState {
    let host: Arc<dyn RepositoryHost> = Arc::new(host);
    AppState::new(
        CommitBuilder::new(host, "main").with_timeout(Duration::from_secs(5)),
        test_repo(),
    )
}

fn seeded() -> (ObjectStore, CommitId) {
    let store = ObjectStore::new();
    let c0 = store.seed_branch(&test_repo(), "main", &[("a.txt", "1")]);
    (store, c0)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn commit_body(content: &str) -> Value {
    json!({
        "commitMessage": "update",
        "files": [{ "path": "a.txt", "content": content }]
    })
}

// ==========================================================================
// Banner and health
// ==========================================================================

#[tokio::test]
async fn test_banner_names_mcp_endpoint() {
    let (store, _) = seeded();
    let (status, body) = send(router(state_for(InMemoryHost::new(store))), get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap().contains("POST /mcp"));
}

#[tokio::test]
async fn test_health_reports_ok() {
    let (store, _) = seeded();
    let (status, body) = send(router(state_for(InMemoryHost::new(store))), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["status"], "ok");
    assert!(body["uptimeSeconds"].as_f64().unwrap() >= 0.0);
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}

// ==========================================================================
// git_commit_and_push
// ==========================================================================

#[tokio::test]
async fn test_commit_returns_sha_and_moves_branch() {
    let (store, c0) = seeded();
    let app = router(state_for(InMemoryHost::new(store.clone())));

    let (status, body) = send(app, post("/mcp/git_commit_and_push", &commit_body("2"))).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["ok"], true);
    assert_eq!(body["branch"], "main");
    assert_eq!(body["baseCommitSha"], c0.as_str());
    let sha = CommitId::new(body["commitSha"].as_str().unwrap());
    assert_eq!(store.head(&test_repo(), "main"), Some(sha.clone()));
    assert_eq!(store.read_file(&sha, "a.txt"), Some(b"2".to_vec()));
}

#[tokio::test]
async fn test_commit_accepts_base64_files() {
    let (store, _) = seeded();
    let app = router(state_for(InMemoryHost::new(store.clone())));
    let body = json!({
        "branch": "main",
        "commitMessage": "add binary",
        "files": [{ "path": "bin/x", "content": "AP8A/w==", "encoding": "base64" }]
    });

    let (status, body) = send(app, post("/mcp/git_commit_and_push", &body)).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let sha = CommitId::new(body["commitSha"].as_str().unwrap());
    assert_eq!(store.read_file(&sha, "bin/x"), Some(vec![0x00, 0xff, 0x00, 0xff]));
}

#[tokio::test]
async fn test_missing_message_is_400_without_host_calls() {
    let (store, _) = seeded();
    let host = Arc::new(InMemoryHost::new(store));
    let dyn_host: Arc<dyn RepositoryHost> = host.clone();
    let app = router(AppState::new(CommitBuilder::new(dyn_host, "main"), test_repo()));

    let body = json!({ "files": [{ "path": "a.txt", "content": "x" }] });
    let (status, body) = send(app, post("/mcp/git_commit_and_push", &body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert_eq!(body["kind"], "validation");
    assert_eq!(host.call_count(), 0);
}

#[tokio::test]
async fn test_empty_files_is_400() {
    let (store, _) = seeded();
    let app = router(state_for(InMemoryHost::new(store)));
    let body = json!({ "commitMessage": "m", "files": [] });

    let (status, body) = send(app, post("/mcp/git_commit_and_push", &body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn test_malformed_json_is_400_with_error_body() {
    let (store, _) = seeded();
    let app = router(state_for(InMemoryHost::new(store)));
    let request = Request::builder()
        .method("POST")
        .uri("/mcp/git_commit_and_push")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert_eq!(body["kind"], "invalid_body");
}

#[tokio::test]
async fn test_unknown_branch_is_404() {
    let (store, _) = seeded();
    let app = router(state_for(InMemoryHost::new(store)));
    let mut body = commit_body("2");
    body["branch"] = json!("ghost");

    let (status, body) = send(app, post("/mcp/git_commit_and_push", &body)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "branch_not_found");
    assert_eq!(body["step"], "resolve_head");
}

#[tokio::test]
async fn test_upstream_failure_is_502_with_step() {
    let (store, c0) = seeded();
    let host = InMemoryHost::new(store.clone()).fail_on(
        HostCall::CreateCommit,
        HostError::Status {
            status: 500,
            message: "Server Error".into(),
        },
    );
    let app = router(state_for(host));

    let (status, body) = send(app, post("/mcp/git_commit_and_push", &commit_body("2"))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "upstream");
    assert_eq!(body["step"], "create_commit");
    assert_eq!(body["retry"], "transient");
    assert_eq!(store.head(&test_repo(), "main"), Some(c0));
}

#[tokio::test]
async fn test_slow_host_is_504() {
    let (store, _) = seeded();
    let host = InMemoryHost::new(store).delay_on(HostCall::CreateTree, Duration::from_secs(5));
    let host: Arc<dyn RepositoryHost> = Arc::new(host);
    let app = router(AppState::new(
        CommitBuilder::new(host, "main").with_timeout(Duration::from_millis(100)),
        test_repo(),
    ));

    let (status, body) = send(app, post("/mcp/git_commit_and_push", &commit_body("2"))).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["kind"], "timeout");
    assert_eq!(body["step"], "create_tree");
}

#[tokio::test]
async fn test_racing_requests_yield_200_and_409() {
    let (store, _) = seeded();
    let app = router(state_for(InMemoryHost::new(store.clone()).hold_updates_until(2)));

    let (left, right) = tokio::join!(
        send(app.clone(), post("/mcp/git_commit_and_push", &commit_body("left"))),
        send(app, post("/mcp/git_commit_and_push", &commit_body("right"))),
    );

    let mut statuses = vec![left.0, right.0];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::CONFLICT]);

    let (winner, loser) = if left.0 == StatusCode::OK { (left.1, right.1) } else { (right.1, left.1) };
    assert_eq!(loser["kind"], "concurrent_update");
    assert_eq!(loser["retry"], "after_refresh");
    assert_eq!(
        store.head(&test_repo(), "main").unwrap().as_str(),
        winner["commitSha"].as_str().unwrap()
    );
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let (store, _) = seeded();
    let app = router(state_for(InMemoryHost::new(store)));
    let huge = "x".repeat(bridge_mcp::MAX_BODY_BYTES + 1);

    let (status, _) = send(app, post("/mcp/git_commit_and_push", &commit_body(&huge))).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

// ==========================================================================
// render_deploy
// ==========================================================================

#[tokio::test]
async fn test_deploy_without_render_is_400() {
    let (store, _) = seeded();
    let app = router(state_for(InMemoryHost::new(store)));

    let (status, body) = send(app, post("/mcp/render_deploy", &json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "not_configured");
}

#[tokio::test]
async fn test_deploy_uses_configured_service() {
    let fake = FakeRender::start(&["srv-abc"]).await;
    let (store, _) = seeded();
    let client = RenderClient::with_api_base(API_KEY, fake.base_url()).unwrap();
    let app = router(state_for(InMemoryHost::new(store)).with_render(client, Some("srv-abc".into())));

    // An empty body is accepted.
    let request = Request::builder()
        .method("POST")
        .uri("/mcp/render_deploy")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["ok"], true);
    assert_eq!(body["deployId"], "dep-0001");
    assert_eq!(body["deploy"]["serviceId"], "srv-abc");
    assert_eq!(fake.deploy_count(), 1);
}

#[tokio::test]
async fn test_deploy_without_service_id_is_400() {
    let fake = FakeRender::start(&["srv-abc"]).await;
    let (store, _) = seeded();
    let client = RenderClient::with_api_base(API_KEY, fake.base_url()).unwrap();
    let app = router(state_for(InMemoryHost::new(store)).with_render(client, None));

    let (status, body) = send(app, post("/mcp/render_deploy", &json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "not_configured");
    assert_eq!(fake.deploy_count(), 0);
}

#[tokio::test]
async fn test_deploy_rejected_by_render_is_502() {
    let fake = FakeRender::start(&["srv-abc"]).await;
    let (store, _) = seeded();
    let client = RenderClient::with_api_base(API_KEY, fake.base_url()).unwrap();
    let app = router(state_for(InMemoryHost::new(store)).with_render(client, Some("srv-abc".into())));

    let (status, body) = send(
        app,
        post("/mcp/render_deploy", &json!({ "serviceId": "srv-other" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "upstream");
    assert!(body["error"].as_str().unwrap().contains("service not found"));
}
