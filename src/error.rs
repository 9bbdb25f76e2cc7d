use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T, E = CleanerError> = std::result::Result<T, E>;

/// Failures raised while snapshotting or reconciling a tree.
///
/// None of these are retried. The first one raised ends the operation.
#[derive(Debug, Error)]
pub enum CleanerError {
    /// The root is unusable, or an entry to capture is missing.
    #[error("cannot track {}: {reason}", .path.display())]
    Construction {
        path: PathBuf,
        reason: &'static str,
    },

    /// A tracked entry no longer matches what the snapshot recorded.
    #[error("{} is inconsistent with its snapshot: {reason}", .path.display())]
    Inconsistency {
        path: PathBuf,
        reason: &'static str,
    },

    /// Permission bits could not be restored or granted.
    #[error("failed to {operation} permissions on {}: {source}", .path.display())]
    Permission {
        path: PathBuf,
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A file or an empty directory could not be deleted.
    #[error("failed to remove {}: {source}", .path.display())]
    Deletion {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tree could not be enumerated.
    #[error("failed to list {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

impl CleanerError {
    /// The path the failed operation was acting on.
    pub fn path(&self) -> &Path {
        match self {
            Self::Construction { path, .. }
            | Self::Inconsistency { path, .. }
            | Self::Permission { path, .. }
            | Self::Deletion { path, .. }
            | Self::Walk { path, .. } => path,
        }
    }

    pub fn is_construction(&self) -> bool {
        matches!(self, Self::Construction { .. })
    }

    pub fn is_inconsistency(&self) -> bool {
        matches!(self, Self::Inconsistency { .. })
    }

    pub fn is_permission(&self) -> bool {
        matches!(self, Self::Permission { .. })
    }

    pub fn is_deletion(&self) -> bool {
        matches!(self, Self::Deletion { .. })
    }

    pub fn is_walk(&self) -> bool {
        matches!(self, Self::Walk { .. })
    }
}
