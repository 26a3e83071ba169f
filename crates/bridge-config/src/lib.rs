//! Configuration for the commit bridge
//!
//! Settings come from an optional TOML file, then environment variables
//! (which win), then command-line flags applied by the binary.
//!
//! ```toml
//! [github]
//! owner = "octo"
//! repo = "site"
//! default_branch = "main"
//!
//! [render]
//! service_id = "srv-abc"
//!
//! [server]
//! port = 3000
//! ```
//!
//! Secrets (`GITHUB_PAT`, `RENDER_API_KEY`) are normally supplied through the
//! environment and never appear in `Debug` output.

pub mod config;
pub mod error;

pub use config::{
    BridgeConfig, DEFAULT_BRANCH, DEFAULT_GITHUB_API, DEFAULT_PORT, DEFAULT_RENDER_API,
    GithubConfig, RenderConfig, ServerConfig,
};
pub use error::{Error, Result};
