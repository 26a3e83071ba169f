//! Error types for the bridge server

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use thiserror::Error;

/// Result type alias for bridge server operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving a request
#[derive(Debug, Error)]
pub enum Error {
    /// Commit pipeline failure
    #[error(transparent)]
    Commit(#[from] bridge_git::Error),

    /// Deploy trigger failure
    #[error(transparent)]
    Deploy(#[from] bridge_deploy::Error),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] bridge_config::Error),

    /// The GitHub client could not be built
    #[error("GitHub client error: {0}")]
    Host(#[from] bridge_git::HostError),

    /// Error during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid tool arguments or request body
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// The request body was refused before parsing
    #[error("{message}")]
    Body { status: u16, message: String },

    /// Unknown tool requested
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        use bridge_git::Error as Commit;

        match self {
            Error::Commit(Commit::Validation(_)) => StatusCode::BAD_REQUEST,
            Error::Commit(Commit::BranchNotFound { .. }) => StatusCode::NOT_FOUND,
            Error::Commit(Commit::ConcurrentUpdate { .. }) => StatusCode::CONFLICT,
            Error::Commit(Commit::Upstream { .. }) => StatusCode::BAD_GATEWAY,
            Error::Commit(Commit::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Error::Deploy(bridge_deploy::Error::NotConfigured(_)) => StatusCode::BAD_REQUEST,
            Error::Deploy(_) => StatusCode::BAD_GATEWAY,
            Error::InvalidArguments { .. } | Error::Json(_) => StatusCode::BAD_REQUEST,
            Error::Body { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST)
            }
            Error::UnknownTool(_) => StatusCode::NOT_FOUND,
            Error::Config(_) | Error::Host(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Commit(e) => e.kind(),
            Error::Deploy(e) => e.kind(),
            Error::InvalidArguments { .. } | Error::Json(_) => "invalid_arguments",
            Error::Body { .. } => "invalid_body",
            Error::UnknownTool(_) => "unknown_tool",
            Error::Config(_) | Error::Host(_) | Error::Io(_) => "internal",
        }
    }

    /// `{ ok: false, error, kind, step?, retry? }`
    pub fn to_body(&self) -> Value {
        let mut body = json!({
            "ok": false,
            "error": self.to_string(),
            "kind": self.kind(),
        });
        if let Error::Commit(e) = self {
            if let Some(step) = e.step() {
                body["step"] = json!(step.as_str());
            }
            body["retry"] = json!(e.retry_hint().as_str());
        }
        body
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "Request failed");
        } else {
            tracing::debug!(error = %self, kind = self.kind(), "Request rejected");
        }
        (status, Json(self.to_body())).into_response()
    }
}
