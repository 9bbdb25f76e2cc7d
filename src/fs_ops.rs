//! Thin wrappers over the filesystem calls the snapshot engine needs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{CleanerError, Result};

/// Bits granted to a directory that has to be emptied and removed.
pub const DIR_GRANT_MODE: u32 = 0o777;

/// Bits granted to a file that has to be unlinked.
pub const FILE_GRANT_MODE: u32 = 0o666;

/// One path found under a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    pub path: PathBuf,
    pub is_dir: bool,
    /// Depth below the root; direct children are at depth 1.
    pub depth: usize,
}

/// List every file and directory below `root`, excluding `root` itself.
/// Links are not followed. Order is whatever the walk produces. Any walk
/// error aborts.
pub fn list_tree(root: &Path) -> Result<Vec<ListedEntry>> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|err| walk_error(root, err))?;
        entries.push(listed(entry, 0));
    }

    Ok(entries)
}

/// Like [`list_tree`], but a directory below `root` that cannot be read for
/// lack of permission is opened up with [`DIR_GRANT_MODE`] and walked again.
/// Errors on `root` itself, and any other walk error, abort.
pub fn list_tree_opening(root: &Path) -> Result<Vec<ListedEntry>> {
    let mut entries = Vec::new();
    walk_opening(root, 0, &mut entries)?;
    Ok(entries)
}

fn walk_opening(dir: &Path, base_depth: usize, entries: &mut Vec<ListedEntry>) -> Result<()> {
    for entry in WalkDir::new(dir).min_depth(1).follow_links(false) {
        let err = match entry {
            Ok(entry) => {
                entries.push(listed(entry, base_depth));
                continue;
            }
            Err(err) => err,
        };

        let denied = err.io_error().map(io::Error::kind) == Some(io::ErrorKind::PermissionDenied);
        let unreadable = err
            .path()
            .filter(|_| denied && err.depth() > 0)
            .map(Path::to_path_buf);
        let Some(unreadable) = unreadable else {
            return Err(walk_error(dir, err));
        };

        let granted = grant_access(&unreadable, true).map_err(|source| CleanerError::Permission {
            path: unreadable.clone(),
            operation: "open",
            source,
        })?;
        tracing::info!(
            path = %unreadable.display(),
            "permission changed to {} on {}",
            display_mode(granted),
            unreadable.display()
        );

        walk_opening(&unreadable, base_depth + err.depth(), entries)?;
    }

    Ok(())
}

fn listed(entry: walkdir::DirEntry, base_depth: usize) -> ListedEntry {
    ListedEntry {
        is_dir: entry.file_type().is_dir(),
        depth: base_depth + entry.depth(),
        path: entry.into_path(),
    }
}

fn walk_error(root: &Path, err: walkdir::Error) -> CleanerError {
    CleanerError::Walk {
        path: err.path().unwrap_or(root).to_path_buf(),
        source: err,
    }
}

/// Metadata of the entry itself, never of a link target.
pub fn probe(path: &Path) -> io::Result<fs::Metadata> {
    fs::symlink_metadata(path)
}

/// Whether anything, including a dangling link, sits at `path`.
pub fn exists(path: &Path) -> bool {
    probe(path).is_ok()
}

/// Permission bits carried by `meta`, or `None` where they mean nothing.
#[cfg(unix)]
pub fn mode_of(meta: &fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;

    if meta.file_type().is_symlink() {
        return None;
    }
    Some(meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
pub fn mode_of(_meta: &fs::Metadata) -> Option<u32> {
    None
}

/// Set the permission bits of `path` exactly to `mode`.
#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
pub fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "permission bits are not supported on this platform",
    ))
}

/// Open up an entry so the current process can delete it.
/// Returns the bits that were applied, if the platform has any.
#[cfg(unix)]
pub fn grant_access(path: &Path, is_dir: bool) -> io::Result<Option<u32>> {
    let mode = if is_dir { DIR_GRANT_MODE } else { FILE_GRANT_MODE };
    set_mode(path, mode)?;
    Ok(Some(mode))
}

#[cfg(not(unix))]
pub fn grant_access(path: &Path, _is_dir: bool) -> io::Result<Option<u32>> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(false);
    fs::set_permissions(path, perms)?;
    Ok(None)
}

/// Whether the current process may write to `path`, as judged by the kernel.
#[cfg(unix)]
pub fn is_writable(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}

#[cfg(not(unix))]
pub fn is_writable(path: &Path) -> bool {
    probe(path)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}

/// Render permission bits for diagnostics ("0644", or "unavailable").
pub fn display_mode(mode: Option<u32>) -> String {
    match mode {
        Some(bits) => format!("{bits:04o}"),
        None => "unavailable".to_string(),
    }
}
