//! Tool handlers
//!
//! Each handler backs both an MCP tool and a plain REST route, so the two
//! surfaces cannot drift apart.

use bridge_deploy::DeployReceipt;
use bridge_git::{CommitOutcome, CommitRequest, FileChange};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::state::AppState;
use crate::{Error, Result};

/// Arguments of `git_commit_and_push`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitArgs {
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default, alias = "message")]
    pub commit_message: String,
    #[serde(default)]
    pub files: Vec<FileChange>,
}

/// Arguments of `render_deploy`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployArgs {
    #[serde(default)]
    pub service_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub uptime_seconds: f64,
    pub timestamp: String,
}

/// Handle a tool call by dispatching to the appropriate handler
pub async fn handle_tool_call(state: &AppState, tool_name: &str, arguments: Value) -> Result<Value> {
    match tool_name {
        "health_check" => Ok(serde_json::to_value(health(state))?),
        "git_commit_and_push" => {
            let args: CommitArgs = parse_arguments(arguments)?;
            let outcome = commit_and_push(state, args).await?;
            Ok(commit_body(&outcome))
        }
        "render_deploy" => {
            let args: DeployArgs = parse_arguments(arguments)?;
            let receipt = render_deploy(state, args).await?;
            Ok(deploy_body(&receipt))
        }
        _ => Err(Error::UnknownTool(tool_name.to_string())),
    }
}

/// Missing arguments are treated as an empty object.
fn parse_arguments<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| Error::InvalidArguments {
        message: e.to_string(),
    })
}

pub fn health(state: &AppState) -> HealthReport {
    HealthReport {
        status: "ok",
        uptime_seconds: state.uptime_seconds(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

/// Commit every file in `args` to the configured repository.
pub async fn commit_and_push(state: &AppState, args: CommitArgs) -> Result<CommitOutcome> {
    let request = CommitRequest {
        repository: state.repository().clone(),
        branch: args.branch,
        message: args.commit_message,
        files: args.files,
    };
    tracing::debug!(
        branch = request.branch.as_deref().unwrap_or(state.builder().default_branch()),
        files = request.files.len(),
        "Commit requested"
    );
    Ok(state.builder().build_and_push(&request).await?)
}

pub async fn render_deploy(state: &AppState, args: DeployArgs) -> Result<DeployReceipt> {
    let client = state.render().ok_or_else(|| {
        bridge_deploy::Error::NotConfigured("RENDER_API_KEY not set".to_string())
    })?;
    let service_id = args
        .service_id
        .filter(|s| !s.trim().is_empty())
        .or_else(|| state.render_service_id().map(str::to_string))
        .ok_or_else(|| {
            bridge_deploy::Error::NotConfigured("RENDER_SERVICE_ID not set".to_string())
        })?;
    Ok(client.trigger_deploy(&service_id).await?)
}

pub fn commit_body(outcome: &CommitOutcome) -> Value {
    json!({
        "ok": true,
        "commitSha": outcome.commit_id,
        "branch": outcome.branch,
        "baseCommitSha": outcome.base_commit_id,
        "treeSha": outcome.tree_id,
    })
}

pub fn deploy_body(receipt: &DeployReceipt) -> Value {
    json!({
        "ok": true,
        "deployId": receipt.id,
        "deploy": receipt.raw,
    })
}
