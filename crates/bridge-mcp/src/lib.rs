//! HTTP and MCP front end for the commit bridge
//!
//! Exposes atomic multi-file GitHub commits and Render deploys to agents,
//! both as MCP tools over JSON-RPC and as plain REST routes.
//!
//! ```text
//! [ MCP client / agent ]
//!        | (JSON-RPC or REST over HTTP)
//!        v
//! [ bridge-mcp (axum) ]
//!        |
//!        +--> [ bridge-git ]    --> GitHub Git Data API
//!        +--> [ bridge-deploy ] --> Render API
//! ```
//!
//! # Tools
//!
//! - `health_check`
//! - `git_commit_and_push`
//! - `render_deploy`

pub mod error;
pub mod handlers;
pub mod protocol;
pub mod server;
pub mod state;
pub mod tools;

pub use error::{Error, Result};
pub use server::{MAX_BODY_BYTES, handle_message, router, serve};
pub use state::{AppState, SharedBuilder};
pub use tools::{ToolContent, ToolDefinition, ToolResult, get_tool_definitions};
