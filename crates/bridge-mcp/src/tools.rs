//! MCP tool definitions and results
//!
//! - `health_check`: liveness, uptime and server time
//! - `git_commit_and_push`: write several files to a branch in one commit
//! - `render_deploy`: trigger a Render deploy

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool definition for MCP protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Result from a tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

/// Content types for tool results
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

impl ToolResult {
    /// Successful result carrying the value both as text and structured.
    pub fn structured(value: Value) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: pretty(&value),
            }],
            structured_content: Some(value),
            is_error: None,
        }
    }

    /// Create an error result
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            structured_content: None,
            is_error: Some(true),
        }
    }

    /// Error result with a machine-readable body.
    pub fn structured_error(message: impl Into<String>, body: Value) -> Self {
        Self {
            structured_content: Some(body),
            ..Self::error(message)
        }
    }
}

/// Get all available tool definitions
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "health_check".to_string(),
            description: "Returns basic status for the commit bridge.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolDefinition {
            name: "git_commit_and_push".to_string(),
            description: "Commit one or more files to a branch of the configured GitHub \
                          repository as a single atomic commit. Either every file lands \
                          or the branch is left untouched."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "branch": {
                        "type": "string",
                        "description": "Target branch (defaults to the configured default branch)"
                    },
                    "commitMessage": {
                        "type": "string",
                        "description": "Commit message"
                    },
                    "files": {
                        "type": "array",
                        "minItems": 1,
                        "description": "Files to create or replace",
                        "items": {
                            "type": "object",
                            "properties": {
                                "path": {
                                    "type": "string",
                                    "description": "Repository-relative path"
                                },
                                "content": {
                                    "type": "string",
                                    "description": "Full file content"
                                },
                                "encoding": {
                                    "type": "string",
                                    "enum": ["utf8", "base64"],
                                    "description": "How content is encoded (default utf8)"
                                }
                            },
                            "required": ["path", "content"]
                        }
                    }
                },
                "required": ["commitMessage", "files"]
            }),
        },
        ToolDefinition {
            name: "render_deploy".to_string(),
            description: "Trigger a new deploy of a Render service.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "serviceId": {
                        "type": "string",
                        "description": "Render service id (defaults to the configured service)"
                    }
                }
            }),
        },
    ]
}
