//! Recorded state of a single entry and the two ways of acting on it:
//! put it back as it was, or get rid of it.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CleanerError, Result};
use crate::fs_ops;

/// A permission change made (or planned) to bring an entry back to its snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRepair {
    pub path: PathBuf,
    pub from: u32,
    pub to: u32,
}

/// What an entry looked like when it was captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathState {
    path: PathBuf,
    is_dir: bool,
    /// `None` when the platform has no meaningful bits for this entry.
    mode: Option<u32>,
}

impl PathState {
    /// Record the current type and permission bits of `path`.
    ///
    /// Fails with [`CleanerError::Construction`] if nothing exists there.
    pub fn capture(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let meta = fs_ops::probe(&path).map_err(|_| CleanerError::Construction {
            path: path.clone(),
            reason: "path does not exist",
        })?;

        Ok(Self {
            is_dir: meta.is_dir(),
            mode: fs_ops::mode_of(&meta),
            path,
        })
    }

    /// The path this state describes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the entry was a directory when captured.
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Captured permission bits, `None` when unavailable.
    pub fn mode(&self) -> Option<u32> {
        self.mode
    }

    /// Compare the live entry against this state without touching it.
    ///
    /// Returns the permission change [`reconcile`](Self::reconcile) would make,
    /// or an error if the entry vanished or changed type.
    pub fn drift(&self) -> Result<Option<PermissionRepair>> {
        let meta = fs_ops::probe(&self.path).map_err(|_| CleanerError::Inconsistency {
            path: self.path.clone(),
            reason: "tracked entry vanished",
        })?;

        if meta.is_dir() != self.is_dir {
            return Err(CleanerError::Inconsistency {
                path: self.path.clone(),
                reason: if self.is_dir {
                    "directory was replaced by a file"
                } else {
                    "file was replaced by a directory"
                },
            });
        }

        let Some(expected) = self.mode else {
            return Ok(None);
        };

        // A regular file swapped for a link keeps its type flag but loses its mode.
        let Some(current) = fs_ops::mode_of(&meta) else {
            return Err(CleanerError::Inconsistency {
                path: self.path.clone(),
                reason: "entry no longer carries permission bits",
            });
        };

        if current == expected {
            return Ok(None);
        }

        Ok(Some(PermissionRepair {
            path: self.path.clone(),
            from: current,
            to: expected,
        }))
    }

    /// Restore the captured permission bits if they have changed.
    pub fn reconcile(&self) -> Result<Option<PermissionRepair>> {
        let Some(repair) = self.drift()? else {
            return Ok(None);
        };

        fs_ops::set_mode(&self.path, repair.to).map_err(|source| CleanerError::Permission {
            path: self.path.clone(),
            operation: "restore",
            source,
        })?;

        tracing::info!(
            path = %self.path.display(),
            from = %fs_ops::display_mode(Some(repair.from)),
            "permission changed to {} on {}",
            fs_ops::display_mode(Some(repair.to)),
            self.path.display()
        );

        Ok(Some(repair))
    }

    /// Delete the entry, granting this process access first if it lacks it.
    ///
    /// Directories must already be empty. Returns `false` if the entry was
    /// already gone.
    pub fn remove(&self) -> Result<bool> {
        let Ok(meta) = fs_ops::probe(&self.path) else {
            return Ok(false);
        };

        if !meta.file_type().is_symlink() && !fs_ops::is_writable(&self.path) {
            let granted = fs_ops::grant_access(&self.path, self.is_dir).map_err(|source| {
                CleanerError::Permission {
                    path: self.path.clone(),
                    operation: "grant",
                    source,
                }
            })?;
            tracing::info!(
                path = %self.path.display(),
                "permission changed to {} on {}",
                fs_ops::display_mode(granted),
                self.path.display()
            );
        }

        let removed = if self.is_dir {
            fs::remove_dir(&self.path)
        } else {
            fs::remove_file(&self.path)
        };
        removed.map_err(|source| CleanerError::Deletion {
            path: self.path.clone(),
            source,
        })?;

        tracing::info!(path = %self.path.display(), "removed {}", self.path.display());
        Ok(true)
    }
}
