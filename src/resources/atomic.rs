//! Write-to-staging-then-rename primitives.
//!
//! The payload is produced inside a uniquely named staging directory on the
//! same filesystem as the final path, flushed, and then moved into place with
//! a single rename.  A reader never observes a partially written object at the
//! final path.
use std::io::Write as _;
use std::path::Path;

use super::fs::{TEMP_PREFIX, ensure_parent_dir, parent_or_cwd, roll_back};
use super::{EntryKind, ResourceError, Result};

/// Produce an object with `produce` and atomically move it to `final_path`.
///
/// `produce` receives a path inside a fresh directory under `staging_root`
/// and must create exactly one object (file, directory, or symlink) there.
/// `staging_root` must live on the same filesystem as `final_path`.
///
/// A regular file or symlink replaces an existing file or symlink in a single
/// rename.  When either side is a directory, the existing object is first
/// moved into the staging directory and restored if the final rename fails.
///
/// # Errors
///
/// Returns an error if staging, producing, or renaming fails.  Normally the
/// staging directory is removed and `final_path` holds either its previous
/// object or the complete new one.  If a displaced object cannot be moved
/// back, the staging directory is kept and [`ResourceError::Stranded`] says
/// where the object is.
pub fn atomic_replace<F>(final_path: &Path, staging_root: &Path, produce: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    ensure_parent_dir(final_path)?;
    std::fs::create_dir_all(staging_root)
        .map_err(|e| ResourceError::io("create staging dir", staging_root, e))?;
    let guard = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempdir_in(staging_root)
        .map_err(|e| ResourceError::io("create staging dir", staging_root, e))?;

    let payload = guard.path().join("payload");
    produce(&payload)?;

    let existing = EntryKind::detect(final_path)?;
    let produced = EntryKind::detect(&payload)?;
    let displace = matches!(existing, Some(EntryKind::Directory))
        || (existing.is_some() && produced == Some(EntryKind::Directory));

    if displace {
        let previous = guard.path().join("previous");
        std::fs::rename(final_path, &previous)
            .map_err(|e| ResourceError::io("move aside", final_path, e))?;
        if let Err(e) = std::fs::rename(&payload, final_path) {
            let failure = ResourceError::io("rename into place", final_path, e);
            return Err(roll_back(guard, &previous, final_path, failure));
        }
    } else {
        std::fs::rename(&payload, final_path)
            .map_err(|e| ResourceError::io("rename into place", final_path, e))?;
    }

    guard
        .close()
        .map_err(|e| ResourceError::io("remove staging dir", staging_root, e))
}

/// Atomically write `content` to `path`, staging next to it.
///
/// # Errors
///
/// Returns an error if the file cannot be written, flushed, or renamed.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    ensure_parent_dir(path)?;
    atomic_replace(path, parent_or_cwd(path), |payload| {
        let mut file =
            std::fs::File::create(payload).map_err(|e| ResourceError::io("create", payload, e))?;
        file.write_all(content)
            .map_err(|e| ResourceError::io("write", payload, e))?;
        file.sync_all()
            .map_err(|e| ResourceError::io("sync", payload, e))
    })
}
