//! Render deploy trigger
//!
//! A thin passthrough to Render's create-deploy endpoint. It keeps no state
//! and never retries; the caller sees Render's answer as-is.

pub mod error;
pub mod render;

pub use error::{Error, Result};
pub use render::{DEFAULT_API_BASE, DeployReceipt, RenderClient};
