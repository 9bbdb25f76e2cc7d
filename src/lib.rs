//! Slatekeeper - put a directory back the way you found it
//!
//! A [`DirectoryCleaner`] snapshots every entry under a root. Later, `clean`
//! walks the tree again, restores permission bits that changed on entries it
//! knows about, and deletes everything it does not know about, bottom-up.
//! Entries made unreadable or unwritable along the way are opened up before
//! they are deleted.
//!
//! ```no_run
//! use slatekeeper::DirectoryCleaner;
//!
//! # fn main() -> slatekeeper::Result<()> {
//! let cleaner = DirectoryCleaner::new("t.data")?;
//! std::fs::create_dir_all("t.data/dir1").ok();
//! let report = cleaner.finish()?.unwrap_or_default();
//! assert!(report.removed.iter().any(|p| p.ends_with("dir1")));
//! # Ok(())
//! # }
//! ```

pub mod cleaner;
pub mod error;
pub mod fs_ops;
pub mod path_state;

pub use cleaner::{sort_for_cleanup, CleanReport, DirectoryCleaner};
pub use error::{CleanerError, Result};
pub use path_state::{PathState, PermissionRepair};
