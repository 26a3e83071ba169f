//! Commit requests and their validation

use std::collections::{HashMap, HashSet};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::naming::is_valid_branch_name;
use crate::objects::RepoCoordinate;
use crate::path::normalize_repo_path;

/// How the `content` of a [`FileChange`] is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    /// Text, committed byte-for-byte as given.
    #[default]
    Utf8,
    /// Arbitrary bytes carried as standard base64.
    Base64,
}

/// A single file to write in the new commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub encoding: ContentEncoding,
}

impl FileChange {
    pub fn text(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            encoding: ContentEncoding::Utf8,
        }
    }

    pub fn base64(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            encoding: ContentEncoding::Base64,
        }
    }
}

/// Request to commit a batch of files onto a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    pub repository: RepoCoordinate,
    /// Target branch; the builder's default branch when `None`.
    pub branch: Option<String>,
    pub message: String,
    pub files: Vec<FileChange>,
}

/// File content after decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilePayload {
    Text(String),
    Binary(Vec<u8>),
}

/// A file whose path has been normalized and whose content has been decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedFile {
    pub path: String,
    pub payload: FilePayload,
}

/// A request that passed every local check and is ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCommit {
    pub repository: RepoCoordinate,
    pub branch: String,
    pub message: String,
    pub files: Vec<ValidatedFile>,
}

impl CommitRequest {
    pub fn new(repository: RepoCoordinate, message: impl Into<String>) -> Self {
        Self {
            repository,
            branch: None,
            message: message.into(),
            files: Vec::new(),
        }
    }

    pub fn on_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_file(mut self, file: FileChange) -> Self {
        self.files.push(file);
        self
    }

    /// Check the request without touching the host.
    ///
    /// Files keep their submitted order. Paths are compared after
    /// normalization, so `./a.txt` and `a.txt` count as the same file.
    pub fn validate(&self, default_branch: &str) -> Result<ValidatedCommit, ValidationError> {
        let repo = &self.repository;
        if repo.owner.is_empty()
            || repo.name.is_empty()
            || repo.owner.contains('/')
            || repo.name.contains('/')
        {
            return Err(ValidationError::InvalidRepository);
        }

        let branch = self
            .branch
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(default_branch);
        if !is_valid_branch_name(branch) {
            return Err(ValidationError::InvalidBranchName {
                name: branch.to_string(),
            });
        }

        if self.message.trim().is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        if self.files.is_empty() {
            return Err(ValidationError::NoFiles);
        }

        let mut seen: HashMap<String, &str> = HashMap::with_capacity(self.files.len());
        let mut files = Vec::with_capacity(self.files.len());

        for (index, change) in self.files.iter().enumerate() {
            let path = normalize_repo_path(&change.path, index)?;

            if let Some(first) = seen.get(&path) {
                return Err(ValidationError::DuplicatePath {
                    path,
                    first: first.to_string(),
                    second: change.path.clone(),
                });
            }
            seen.insert(path.clone(), &change.path);

            let payload = match change.encoding {
                ContentEncoding::Utf8 => FilePayload::Text(change.content.clone()),
                ContentEncoding::Base64 => {
                    let bytes = decode_base64(&change.content).map_err(|reason| {
                        ValidationError::InvalidBase64 {
                            path: path.clone(),
                            reason,
                        }
                    })?;
                    FilePayload::Binary(bytes)
                }
            };

            files.push(ValidatedFile { path, payload });
        }

        if let Some((file, nested)) = file_directory_conflict(&files) {
            return Err(ValidationError::PathConflict { file, nested });
        }

        Ok(ValidatedCommit {
            repository: self.repository.clone(),
            branch: branch.to_string(),
            message: self.message.clone(),
            files,
        })
    }
}

/// First pair where one path is a parent directory of another, as in `a`
/// and `a/b.txt`. A Git tree cannot hold both.
fn file_directory_conflict(files: &[ValidatedFile]) -> Option<(String, String)> {
    let paths: HashSet<&str> = files.iter().map(|f| f.path.as_str()).collect();
    files.iter().find_map(|f| {
        f.path
            .match_indices('/')
            .map(|(i, _)| &f.path[..i])
            .find(|parent| paths.contains(parent))
            .map(|parent| (parent.to_string(), f.path.clone()))
    })
}

/// Decode standard base64, tolerating the line breaks many encoders insert.
fn decode_base64(content: &str) -> Result<Vec<u8>, String> {
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact).map_err(|e| e.to_string())
}
