//! Identifiers and object shapes exchanged with the repository host

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! object_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(sha: impl Into<String>) -> Self {
                Self(sha.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }
    };
}

object_id!(
    /// Content hash of a commit object.
    CommitId
);

object_id!(
    /// Content hash of a tree object.
    TreeId
);

object_id!(
    /// Content hash of a blob object.
    BlobId
);

/// Owner/name pair identifying a repository on the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoCoordinate {
    pub owner: String,
    pub name: String,
}

impl RepoCoordinate {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Git file mode for a regular, non-executable file.
pub const REGULAR_FILE_MODE: &str = "100644";

/// Payload of a single overlay entry in a new tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEntryContent {
    /// Text stored inline; the host creates the blob itself.
    Inline(String),
    /// A blob uploaded ahead of the tree.
    Blob(BlobId),
}

/// An overlay entry applied on top of a base tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub content: TreeEntryContent,
}

/// Outcome of a conditional ref update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefUpdate {
    /// The ref now points at the new commit.
    Updated,
    /// The host refused the update because the ref no longer matches the
    /// expected value.
    Rejected { message: String },
}
