//! Snapshot a directory tree and reconcile it back to that snapshot.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CleanerError, Result};
use crate::fs_ops::{self, ListedEntry};
use crate::path_state::{PathState, PermissionRepair};

/// What a clean pass did, or what a scan found would be done.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Tracked entries whose permission bits were put back.
    pub restored: Vec<PermissionRepair>,
    /// Entries created since the snapshot, in deletion order.
    pub removed: Vec<PathBuf>,
}

impl CleanReport {
    /// True when the tree already matched the snapshot.
    pub fn is_empty(&self) -> bool {
        self.restored.is_empty() && self.removed.is_empty()
    }

    /// Total number of repairs.
    pub fn len(&self) -> usize {
        self.restored.len() + self.removed.len()
    }
}

/// Owns a directory and puts it back the way it was when last snapshotted.
///
/// Dropping an active cleaner runs one final [`clean`](Self::clean). A failure
/// there panics, unless the thread is already unwinding, in which case it is
/// logged instead.
#[derive(Debug)]
pub struct DirectoryCleaner {
    root: PathBuf,
    snapshot: HashMap<PathBuf, PathState>,
    active: bool,
}

impl DirectoryCleaner {
    /// Start managing `root`, which must be an existing directory, and take
    /// the initial snapshot.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let meta = fs::metadata(&root).map_err(|_| CleanerError::Construction {
            path: root.clone(),
            reason: "root does not exist",
        })?;
        if !meta.is_dir() {
            return Err(CleanerError::Construction {
                path: root,
                reason: "root is not a directory",
            });
        }

        // Stays inactive until the first snapshot succeeds, so a failed
        // construction never cleans anything on drop.
        let mut cleaner = Self {
            root,
            snapshot: HashMap::new(),
            active: false,
        };
        cleaner.reset()?;
        cleaner.active = true;
        Ok(cleaner)
    }

    /// The managed root.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Whether dropping the cleaner will still run the final clean.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Replace the snapshot with the tree as it is now. Anything created since
    /// the previous snapshot becomes part of the baseline.
    pub fn reset(&mut self) -> Result<()> {
        let snapshot = fs_ops::list_tree(&self.root)?
            .into_iter()
            .map(|entry| PathState::capture(entry.path).map(|s| (s.path().to_path_buf(), s)))
            .collect::<Result<HashMap<_, _>>>()?;

        tracing::debug!(
            root = %self.root.display(),
            tracked = snapshot.len(),
            "snapshot taken"
        );
        self.snapshot = snapshot;
        Ok(())
    }

    /// Reconcile the tree against the snapshot: restore permissions of tracked
    /// entries and delete everything else, files first, deepest directories
    /// next. The first failure aborts the pass.
    ///
    /// Directories that cannot be read are opened up so their contents can be
    /// listed; tracked ones get their own bits back later in the same pass.
    pub fn clean(&self) -> Result<CleanReport> {
        let mut entries = fs_ops::list_tree_opening(&self.root)?;
        sort_for_cleanup(&mut entries);
        self.process(entries, true)
    }

    /// Report what [`clean`](Self::clean) would do without changing anything.
    ///
    /// An unreadable directory makes the preview impossible and is reported
    /// as a walk error.
    pub fn scan(&self) -> Result<CleanReport> {
        let mut entries = fs_ops::list_tree(&self.root)?;
        sort_for_cleanup(&mut entries);
        self.process(entries, false)
    }

    /// Run the final clean if it has not run yet. Later calls are no-ops and
    /// return `Ok(None)`.
    pub fn teardown(&mut self) -> Result<Option<CleanReport>> {
        if !self.active {
            return Ok(None);
        }
        self.active = false;
        self.clean().map(Some)
    }

    /// Tear down now and surface the result instead of leaving it to `Drop`.
    pub fn finish(mut self) -> Result<Option<CleanReport>> {
        self.teardown()
    }

    /// Give up the final clean; the tree is left as it is on drop.
    pub fn disarm(&mut self) {
        self.active = false;
    }

    /// Number of entries in the current snapshot.
    pub fn tracked_len(&self) -> usize {
        self.snapshot.len()
    }

    /// Whether `path` was present at the last snapshot.
    pub fn is_tracked(&self, path: &Path) -> bool {
        self.snapshot.contains_key(path)
    }

    /// The captured state of `path`, if it is tracked.
    pub fn state(&self, path: &Path) -> Option<&PathState> {
        self.snapshot.get(path)
    }

    /// Tracked paths in sorted order.
    pub fn tracked_paths(&self) -> Vec<&Path> {
        let mut paths: Vec<&Path> = self.snapshot.keys().map(PathBuf::as_path).collect();
        paths.sort();
        paths
    }

    /// Act on entries already in cleanup order. With `apply` unset nothing
    /// is changed and the report describes what would have been done.
    fn process(&self, entries: Vec<ListedEntry>, apply: bool) -> Result<CleanReport> {
        let mut report = CleanReport::default();
        for entry in entries {
            if let Some(state) = self.snapshot.get(&entry.path) {
                let repair = if apply {
                    state.reconcile()?
                } else {
                    state.drift()?
                };
                report.restored.extend(repair);
                continue;
            }

            if !fs_ops::exists(&entry.path) {
                continue;
            }

            // Vanished between the check and the capture.
            let state = match PathState::capture(&entry.path) {
                Ok(state) => state,
                Err(err) if err.is_construction() => continue,
                Err(err) => return Err(err),
            };

            if !apply || state.remove()? {
                report.removed.push(entry.path);
            }
        }

        tracing::debug!(
            root = %self.root.display(),
            restored = report.restored.len(),
            removed = report.removed.len(),
            dry_run = !apply,
            "clean pass finished"
        );
        Ok(report)
    }
}

impl Drop for DirectoryCleaner {
    fn drop(&mut self) {
        match self.teardown() {
            Ok(_) => {}
            Err(err) if std::thread::panicking() => {
                tracing::error!(root = %self.root.display(), error = %err, "cleanup failed");
            }
            Err(err) => panic!("cleanup of {} failed: {err}", self.root.display()),
        }
    }
}

/// Order entries so that nothing is deleted before its contents: files before
/// directories, deeper directories before shallower ones, then by path.
pub fn sort_for_cleanup(entries: &mut [ListedEntry]) {
    entries.sort_by(|a, b| {
        (a.is_dir, Reverse(a.depth), a.path.as_os_str()).cmp(&(
            b.is_dir,
            Reverse(b.depth),
            b.path.as_os_str(),
        ))
    });
}
