//! Shared data structures for remote store operations.

use serde::{Deserialize, Serialize};

/// Opaque handle to a remote folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolderHandle(pub String);

impl FolderHandle {
    /// Handle from a raw folder id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw folder id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FolderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of resolving (or creating) a record's folder.
#[derive(Debug, Clone)]
pub struct FolderResolution {
    /// Handle of the resolved folder.
    pub handle: FolderHandle,
    /// Browser-viewable share link, when the service reported one.
    pub share_link: Option<String>,
    /// Whether the folder was created by this call. A freshly created
    /// folder is known to be empty, so callers can skip the file listing.
    pub was_created: bool,
}
