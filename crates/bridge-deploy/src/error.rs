//! Error types for bridge-deploy

/// Result type for bridge-deploy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while triggering a deploy
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Render deploys are not configured: {0}")]
    NotConfigured(String),

    #[error("Render API returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Render API request failed: {0}")]
    Transport(String),

    #[error("Render API response could not be decoded: {0}")]
    Decode(String),
}

impl Error {
    /// Machine-readable error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotConfigured(_) => "not_configured",
            Error::Upstream { .. } => "upstream",
            Error::Transport(_) => "transport",
            Error::Decode(_) => "decode",
        }
    }
}
