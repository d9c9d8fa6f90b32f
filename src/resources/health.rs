//! Read-only health probes used by `status` and `doctor`.
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::fs::{TEMP_PREFIX, normalize};
use super::symlink::resolved_target;
use super::{EntryKind, ResourceError, Result};
use crate::platform::Platform;

/// What a path that is expected to be a managed link actually is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkHealth {
    /// Nothing exists at the path.
    Absent,
    /// A real file or directory exists at the path.
    NotALink(EntryKind),
    /// A link to the expected managed path, which exists.
    Healthy,
    /// A link whose target does not exist.
    Dangling {
        /// Resolved link target.
        target: PathBuf,
    },
    /// A link to an existing path outside the managed root.
    OutsideRoot {
        /// Resolved link target.
        target: PathBuf,
    },
    /// A link to some other existing path inside the managed root.
    WrongTarget {
        /// Resolved link target.
        target: PathBuf,
    },
}

/// Classify the object at `link`, which should be a symlink to `expected`
/// somewhere under `managed_root`.
///
/// # Errors
///
/// Returns an error if the path cannot be inspected.
pub fn inspect_link(link: &Path, expected: &Path, managed_root: &Path) -> Result<LinkHealth> {
    match EntryKind::detect(link)? {
        None => return Ok(LinkHealth::Absent),
        Some(EntryKind::Symlink) => {}
        Some(kind) => return Ok(LinkHealth::NotALink(kind)),
    }
    let target = resolved_target(link)?;
    if EntryKind::detect(&target)?.is_none() {
        return Ok(LinkHealth::Dangling { target });
    }
    if target == normalize(expected) {
        // A managed copy that is itself a link must still lead somewhere.
        if EntryKind::detect(&target)? == Some(EntryKind::Symlink) {
            match std::fs::metadata(&target) {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Ok(LinkHealth::Dangling {
                        target: resolved_target(&target)?,
                    });
                }
                Err(e) => return Err(ResourceError::io("inspect", &target, e)),
            }
        }
        Ok(LinkHealth::Healthy)
    } else if target.starts_with(normalize(managed_root)) {
        Ok(LinkHealth::WrongTarget { target })
    } else {
        Ok(LinkHealth::OutsideRoot { target })
    }
}

/// Closest ancestor of `path` (or `path` itself) that exists.
#[must_use]
pub fn nearest_existing_ancestor(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|p| !p.as_os_str().is_empty() && p.symlink_metadata().is_ok())
        .map(Path::to_path_buf)
}

/// Whether the current process can create, rename, or remove objects at
/// `path`, judged from the permission bits of the directory that would be
/// modified.
///
/// # Errors
///
/// Returns an error if that directory cannot be inspected.
pub fn is_writable(path: &Path, platform: &Platform) -> Result<bool> {
    let Some(dir) = path.parent().and_then(nearest_existing_ancestor) else {
        return Ok(true);
    };
    let meta = std::fs::metadata(&dir).map_err(|e| ResourceError::io("inspect", &dir, e))?;
    Ok(writable_by(&meta, platform))
}

#[cfg(unix)]
fn writable_by(meta: &std::fs::Metadata, platform: &Platform) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Some(id) = platform.identity else {
        return !meta.permissions().readonly();
    };
    if id.uid == 0 {
        return true;
    }
    let mode = meta.mode();
    if meta.uid() == id.uid {
        mode & 0o200 != 0
    } else if meta.gid() == id.gid {
        mode & 0o020 != 0
    } else {
        mode & 0o002 != 0
    }
}

#[cfg(not(unix))]
fn writable_by(meta: &std::fs::Metadata, _: &Platform) -> bool {
    !meta.permissions().readonly()
}

/// Objects under `root` that no tracked path accounts for.
///
/// Tracked paths are not descended into.  Directories that merely contain
/// tracked paths are walked; any other object is reported once, at its
/// topmost untracked level.  Names starting with the staging prefix and the
/// paths in `skip` are ignored.
///
/// # Errors
///
/// Returns an error if a directory cannot be read.
pub fn untracked_in_tree(
    root: &Path,
    tracked: &BTreeSet<PathBuf>,
    skip: &[&Path],
) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    if EntryKind::detect(root)? == Some(EntryKind::Directory) {
        walk_untracked(root, tracked, skip, &mut found)?;
    }
    found.sort();
    Ok(found)
}

fn walk_untracked(
    dir: &Path,
    tracked: &BTreeSet<PathBuf>,
    skip: &[&Path],
    found: &mut Vec<PathBuf>,
) -> Result<()> {
    for entry in std::fs::read_dir(dir).map_err(|e| ResourceError::io("read dir", dir, e))? {
        let entry = entry.map_err(|e| ResourceError::io("read dir", dir, e))?;
        let path = entry.path();
        if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX)
            || skip.iter().any(|s| *s == path)
            || tracked.contains(&path)
        {
            continue;
        }
        let is_dir = entry
            .file_type()
            .map_err(|e| ResourceError::io("inspect", &path, e))?
            .is_dir();
        if is_dir && tracked.iter().any(|t| t.starts_with(&path)) {
            walk_untracked(&path, tracked, skip, found)?;
        } else {
            found.push(path);
        }
    }
    Ok(())
}
