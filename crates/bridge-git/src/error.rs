//! Error types for bridge-git

use std::fmt;
use std::time::Duration;

use crate::objects::CommitId;

/// Result type for bridge-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type returned by [`RepositoryHost`](crate::RepositoryHost) calls
pub type HostResult<T> = std::result::Result<T, HostError>;

/// A stage of the commit pipeline, used to pinpoint failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    ResolveHead,
    ResolveBaseTree,
    UploadBlobs,
    CreateTree,
    CreateCommit,
    UpdateRef,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::ResolveHead => "resolve_head",
            Step::ResolveBaseTree => "resolve_base_tree",
            Step::UploadBlobs => "upload_blobs",
            Step::CreateTree => "create_tree",
            Step::CreateCommit => "create_commit",
            Step::UpdateRef => "update_ref",
        }
    }

    /// Whether a failure at this step can leave a visible effect on the branch.
    pub fn may_have_landed(&self) -> bool {
        matches!(self, Step::UpdateRef)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Malformed request input. Raised before any remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("files must contain at least one entry")]
    NoFiles,

    #[error("commit message must not be empty")]
    EmptyMessage,

    #[error("repository owner and name must be non-empty and contain no '/'")]
    InvalidRepository,

    #[error("invalid branch name: {name:?}")]
    InvalidBranchName { name: String },

    #[error("file #{index} has an empty path")]
    EmptyPath { index: usize },

    #[error("path must be relative: {path:?}")]
    AbsolutePath { path: String },

    #[error("path must not contain '..' segments: {path:?}")]
    PathTraversal { path: String },

    #[error("path contains a backslash or control character: {path:?}")]
    IllegalPathCharacter { path: String },

    #[error("path {path:?} refers to the repository root")]
    RootPath { path: String },

    #[error("path {path:?} is given more than once (as {first:?} and {second:?})")]
    DuplicatePath {
        path: String,
        first: String,
        second: String,
    },

    #[error("path {file:?} is a file but {nested:?} needs it to be a directory")]
    PathConflict { file: String, nested: String },

    #[error("content of {path:?} is not valid base64: {reason}")]
    InvalidBase64 { path: String, reason: String },
}

/// Failure reported by a repository host for a single call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl HostError {
    pub fn status(&self) -> Option<u16> {
        match self {
            HostError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// How a caller may react to a failed commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryHint {
    /// Resubmitting the same request will fail the same way.
    Never,
    /// Re-resolve base state, then decide whether to resubmit.
    AfterRefresh,
    /// The failure may be transient; resubmitting as-is is safe because
    /// nothing became visible.
    Transient,
    /// The branch may or may not have moved; inspect before resubmitting.
    UnknownOutcome,
}

impl RetryHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryHint::Never => "never",
            RetryHint::AfterRefresh => "after_refresh",
            RetryHint::Transient => "transient",
            RetryHint::UnknownOutcome => "unknown_outcome",
        }
    }
}

/// Errors returned by the commit builder
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The host answered 404 for the branch. GitHub gives the same answer
    /// for a missing repository and for a token that cannot see it.
    #[error(
        "branch '{branch}' not found in {repository} (or the repository does not exist or is not visible to the token)"
    )]
    BranchNotFound { repository: String, branch: String },

    #[error("branch '{branch}' moved since {expected} was read; commit {attempted} was not applied")]
    ConcurrentUpdate {
        branch: String,
        expected: CommitId,
        attempted: CommitId,
        message: String,
    },

    #[error("{step} failed{}: {message}", fmt_status(.status))]
    Upstream {
        step: Step,
        status: Option<u16>,
        message: String,
    },

    #[error("{step} did not finish within {limit:?}")]
    Timeout { step: Step, limit: Duration },
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(s) => format!(" with HTTP {s}"),
        None => String::new(),
    }
}

impl Error {
    /// Wrap a host failure with the step that produced it.
    pub fn upstream(step: Step, err: HostError) -> Self {
        Error::Upstream {
            step,
            status: err.status(),
            message: match err {
                HostError::Status { message, .. } => message,
                HostError::Transport(message) => format!("transport error: {message}"),
                HostError::Decode(message) => format!("unexpected response body: {message}"),
            },
        }
    }

    /// The pipeline step that failed, if the failure happened after validation.
    pub fn step(&self) -> Option<Step> {
        match self {
            Error::Validation(_) => None,
            Error::BranchNotFound { .. } => Some(Step::ResolveHead),
            Error::ConcurrentUpdate { .. } => Some(Step::UpdateRef),
            Error::Upstream { step, .. } | Error::Timeout { step, .. } => Some(*step),
        }
    }

    /// Short machine-readable classification.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::BranchNotFound { .. } => "branch_not_found",
            Error::ConcurrentUpdate { .. } => "concurrent_update",
            Error::Upstream { .. } => "upstream",
            Error::Timeout { .. } => "timeout",
        }
    }

    pub fn retry_hint(&self) -> RetryHint {
        match self {
            Error::Validation(_) | Error::BranchNotFound { .. } => RetryHint::Never,
            Error::ConcurrentUpdate { .. } => RetryHint::AfterRefresh,
            Error::Upstream { step, status, .. } => {
                // A dropped connection or a server error on the ref update says
                // nothing about whether the host applied it.
                if step.may_have_landed() && status.is_none_or(|s| s >= 500) {
                    RetryHint::UnknownOutcome
                } else {
                    match status {
                        Some(s) if *s >= 500 || *s == 429 => RetryHint::Transient,
                        Some(_) => RetryHint::Never,
                        None => RetryHint::Transient,
                    }
                }
            }
            Error::Timeout { step, .. } => {
                if step.may_have_landed() {
                    RetryHint::UnknownOutcome
                } else {
                    RetryHint::Transient
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_keeps_status_and_message() {
        let err = Error::upstream(
            Step::CreateTree,
            HostError::Status {
                status: 422,
                message: "tree.path contains a malformed path component".into(),
            },
        );
        assert_eq!(err.step(), Some(Step::CreateTree));
        let text = err.to_string();
        assert!(text.contains("create_tree"), "{text}");
        assert!(text.contains("HTTP 422"), "{text}");
        assert!(text.contains("malformed path"), "{text}");
    }

    #[test]
    fn transport_failure_has_no_status() {
        let err = Error::upstream(Step::ResolveHead, HostError::Transport("refused".into()));
        assert!(matches!(err, Error::Upstream { status: None, .. }));
        assert_eq!(err.retry_hint(), RetryHint::Transient);
    }

    #[test]
    fn timeout_during_ref_update_is_unknown_outcome() {
        let err = Error::Timeout {
            step: Step::UpdateRef,
            limit: Duration::from_secs(1),
        };
        assert_eq!(err.retry_hint(), RetryHint::UnknownOutcome);

        let err = Error::Timeout {
            step: Step::CreateCommit,
            limit: Duration::from_secs(1),
        };
        assert_eq!(err.retry_hint(), RetryHint::Transient);
    }

    #[test]
    fn concurrent_update_requires_refresh() {
        let err = Error::ConcurrentUpdate {
            branch: "main".into(),
            expected: CommitId::new("c0"),
            attempted: CommitId::new("c1"),
            message: "Update is not a fast forward".into(),
        };
        assert_eq!(err.kind(), "concurrent_update");
        assert_eq!(err.retry_hint(), RetryHint::AfterRefresh);
    }

    #[test]
    fn client_errors_are_not_retryable() {
        let err = Error::upstream(
            Step::CreateCommit,
            HostError::Status {
                status: 403,
                message: "Resource not accessible by integration".into(),
            },
        );
        assert_eq!(err.retry_hint(), RetryHint::Never);
    }
}
