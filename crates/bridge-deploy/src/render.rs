//! Render API client.

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Public Render API root.
pub const DEFAULT_API_BASE: &str = "https://api.render.com";

const USER_AGENT: &str = concat!("commit-bridge/", env!("CARGO_PKG_VERSION"));

/// What Render answered when asked to deploy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployReceipt {
    /// Deploy id, when Render returned one.
    pub id: Option<String>,
    /// The full response body.
    pub raw: Value,
}

/// Client for `POST /v1/services/{id}/deploys`.
#[derive(Clone)]
pub struct RenderClient {
    http: Client,
    api_base: String,
    api_key: String,
}

impl std::fmt::Debug for RenderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderClient")
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl RenderClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_api_base(api_key, DEFAULT_API_BASE)
    }

    pub fn with_api_base(api_key: impl Into<String>, api_base: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::NotConfigured("RENDER_API_KEY is empty".into()));
        }
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Ask Render to deploy the latest commit of `service_id`.
    pub async fn trigger_deploy(&self, service_id: &str) -> Result<DeployReceipt> {
        if service_id.trim().is_empty() {
            return Err(Error::NotConfigured("no Render service id given".into()));
        }
        let url = format!(
            "{}/v1/services/{}/deploys",
            self.api_base,
            urlencoding::encode(service_id)
        );
        tracing::debug!(service_id, "Triggering deploy");

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(service_id, status = status.as_u16(), "Deploy rejected");
            return Err(upstream_error(status, &body));
        }

        let raw: Value = if body.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&body).map_err(|e| Error::Decode(e.to_string()))?
        };
        let id = raw.get("id").and_then(Value::as_str).map(str::to_string);
        tracing::info!(service_id, deploy_id = id.as_deref().unwrap_or("-"), "Deploy triggered");

        Ok(DeployReceipt { id, raw })
    }
}

fn upstream_error(status: StatusCode, body: &str) -> Error {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("no response body").to_string()
            } else {
                body.to_string()
            }
        });
    Error::Upstream {
        status: status.as_u16(),
        message,
    }
}
