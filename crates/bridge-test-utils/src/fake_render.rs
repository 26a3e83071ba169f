//! HTTP double of Render's create-deploy endpoint.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;

use crate::server::TestServer;

/// API key the fake accepts.
pub const API_KEY: &str = "rnd_test_key";

#[derive(Clone)]
struct RenderState {
    services: Arc<HashSet<String>>,
    deploys: Arc<AtomicUsize>,
}

/// A running fake Render API that knows a fixed set of services.
pub struct FakeRender {
    server: TestServer,
    deploys: Arc<AtomicUsize>,
}

impl FakeRender {
    pub async fn start(services: &[&str]) -> Self {
        let deploys = Arc::new(AtomicUsize::new(0));
        let state = RenderState {
            services: Arc::new(services.iter().map(|s| s.to_string()).collect()),
            deploys: Arc::clone(&deploys),
        };
        let router = Router::new()
            .route("/v1/services/{service_id}/deploys", post(create_deploy))
            .with_state(state);
        Self {
            server: TestServer::spawn(router).await,
            deploys,
        }
    }

    pub fn base_url(&self) -> String {
        self.server.base_url()
    }

    /// Deploys accepted so far.
    pub fn deploy_count(&self) -> usize {
        self.deploys.load(Ordering::SeqCst)
    }
}

async fn create_deploy(
    State(state): State<RenderState>,
    headers: HeaderMap,
    Path(service_id): Path<String>,
) -> Response {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {API_KEY}"));
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "id": "unauthorized", "message": "unauthorized" })),
        )
            .into_response();
    }
    if !state.services.contains(&service_id) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "id": "not_found", "message": "service not found" })),
        )
            .into_response();
    }

    let n = state.deploys.fetch_add(1, Ordering::SeqCst) + 1;
    (
        StatusCode::CREATED,
        Json(json!({
            "id": format!("dep-{n:04}"),
            "status": "created",
            "trigger": "api",
            "serviceId": service_id,
        })),
    )
        .into_response()
}
