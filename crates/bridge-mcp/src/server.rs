//! HTTP server
//!
//! Routes:
//!
//! - `GET /`: plain-text banner
//! - `GET /health`: liveness
//! - `POST /mcp`: MCP JSON-RPC endpoint
//! - `POST /mcp/git_commit_and_push`: commit files (REST)
//! - `POST /mcp/render_deploy`: trigger a deploy (REST)

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::handlers::{
    CommitArgs, DeployArgs, commit_and_push, commit_body, deploy_body, handle_tool_call, health,
    render_deploy,
};
use crate::protocol::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, InitializeResult, JsonRpcRequest,
    JsonRpcResponse, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION, ServerCapabilities,
    ServerInfo, ToolCallParams, ToolsCapability,
};
use crate::state::AppState;
use crate::tools::{ToolResult, get_tool_definitions};
use crate::{Error, Result};

/// Largest request body accepted, matching what agents send for big batches.
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

pub const SERVER_NAME: &str = "commit-bridge";

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health_endpoint))
        .route("/mcp", post(mcp_endpoint))
        .route("/mcp/git_commit_and_push", post(commit_endpoint))
        .route("/mcp/render_deploy", post(deploy_endpoint))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Bridge listening, MCP endpoint: POST /mcp");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Bridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Cannot listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
}

async fn banner() -> &'static str {
    "Commit bridge is running. MCP endpoint: POST /mcp"
}

async fn health_endpoint(State(state): State<AppState>) -> Json<Value> {
    let report = health(&state);
    Json(json!({
        "ok": true,
        "status": report.status,
        "uptimeSeconds": report.uptime_seconds,
        "timestamp": report.timestamp,
    }))
}

fn body_error(rejection: JsonRejection) -> Error {
    Error::Body {
        status: rejection.status().as_u16(),
        message: rejection.body_text(),
    }
}

async fn commit_endpoint(
    State(state): State<AppState>,
    body: std::result::Result<Json<CommitArgs>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(args) = body.map_err(body_error)?;
    let outcome = commit_and_push(&state, args).await?;
    Ok(Json(commit_body(&outcome)))
}

/// The body is optional here; an empty POST deploys the configured service.
async fn deploy_endpoint(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>> {
    let args = if body.iter().all(u8::is_ascii_whitespace) {
        DeployArgs::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| Error::InvalidArguments {
            message: e.to_string(),
        })?
    };
    let receipt = render_deploy(&state, args).await?;
    Ok(Json(deploy_body(&receipt)))
}

async fn mcp_endpoint(State(state): State<AppState>, body: Bytes) -> Response {
    match handle_message(&state, &body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Handle one JSON-RPC message. Notifications produce no response.
pub async fn handle_message(state: &AppState, message: &[u8]) -> Option<JsonRpcResponse> {
    let value: Value = match serde_json::from_slice(message) {
        Ok(value) => value,
        Err(e) => {
            return Some(JsonRpcResponse::error(
                None,
                PARSE_ERROR,
                format!("Parse error: {e}"),
            ));
        }
    };
    let id = value.get("id").cloned().filter(|id| !id.is_null());

    let request: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            return Some(JsonRpcResponse::error(
                id,
                INVALID_REQUEST,
                format!("Invalid Request: {e}"),
            ));
        }
    };
    if request.jsonrpc != "2.0" {
        return Some(JsonRpcResponse::error(
            id,
            INVALID_REQUEST,
            "Invalid Request: jsonrpc must be \"2.0\"".to_string(),
        ));
    }

    tracing::debug!(method = %request.method, "Received message");

    if request.is_notification() {
        return None;
    }

    let response = match request.method.as_str() {
        "initialize" => handle_initialize(request.id),
        "ping" => JsonRpcResponse::success(request.id, json!({})),
        "tools/list" => handle_tools_list(request.id),
        "tools/call" => handle_tools_call(state, request.id, request.params).await,
        _ => JsonRpcResponse::error(
            request.id,
            METHOD_NOT_FOUND,
            format!("Method not found: {}", request.method),
        ),
    };
    Some(response)
}

fn handle_initialize(id: Option<Value>) -> JsonRpcResponse {
    let result = InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: Some(false),
            }),
        },
        server_info: ServerInfo {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    };
    to_response(id, &result)
}

fn handle_tools_list(id: Option<Value>) -> JsonRpcResponse {
    to_response(id, &json!({ "tools": get_tool_definitions() }))
}

async fn handle_tools_call(state: &AppState, id: Option<Value>, params: Value) -> JsonRpcResponse {
    let params: ToolCallParams = match serde_json::from_value(params) {
        Ok(params) => params,
        Err(e) => return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {e}")),
    };
    tracing::info!(tool = %params.name, "Tool call");

    let result = match handle_tool_call(state, &params.name, params.arguments).await {
        Ok(value) => ToolResult::structured(value),
        Err(Error::UnknownTool(name)) => {
            return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Unknown tool: {name}"));
        }
        Err(e) => {
            tracing::warn!(tool = %params.name, error = %e, kind = e.kind(), "Tool call failed");
            ToolResult::structured_error(e.to_string(), e.to_body())
        }
    };
    to_response(id, &result)
}

fn to_response<T: serde::Serialize>(id: Option<Value>, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, format!("Internal error: {e}")),
    }
}
