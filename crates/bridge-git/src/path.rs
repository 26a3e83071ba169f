//! Repository-relative path normalization
//!
//! Paths arrive from agents in loosely formatted POSIX style. Before they reach
//! the host they are reduced to a canonical form so that two spellings of the
//! same file (`./a.txt` and `a.txt`) are detected as duplicates.

use crate::error::ValidationError;

/// Normalize a repository-relative path.
///
/// - strips `.` segments and empty segments (`a//b`, trailing `/`)
/// - rejects absolute paths, `..` segments, backslashes and control characters
/// - rejects paths that reduce to the repository root
pub fn normalize_repo_path(raw: &str, index: usize) -> Result<String, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::EmptyPath { index });
    }
    if raw.starts_with('/') {
        return Err(ValidationError::AbsolutePath {
            path: raw.to_string(),
        });
    }
    if raw.chars().any(|c| c == '\\' || c.is_control()) {
        return Err(ValidationError::IllegalPathCharacter {
            path: raw.to_string(),
        });
    }

    let mut segments = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(ValidationError::PathTraversal {
                    path: raw.to_string(),
                });
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return Err(ValidationError::RootPath {
            path: raw.to_string(),
        });
    }

    Ok(segments.join("/"))
}
