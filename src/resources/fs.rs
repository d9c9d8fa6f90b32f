//! File-system helpers shared by the resource primitives.
use std::io;
use std::path::{Component, Path, PathBuf};

use super::{EntryKind, ResourceError, Result};

/// Prefix of every transient name the filesystem layer creates.
pub const TEMP_PREFIX: &str = ".dotbak-";

/// Ensure the parent directory of `path` exists, creating it (and any
/// ancestors) if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| ResourceError::io("create parent", parent, e))?;
    }
    Ok(())
}

/// The directory containing `path`, or `.` for a bare file name.
#[must_use]
pub fn parent_or_cwd(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Remove whatever exists at `path` (file, symlink, or directory tree).
///
/// Does nothing if `path` does not exist.  Symlinks are removed, never
/// followed.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn remove_existing(path: &Path) -> Result<()> {
    let result = match EntryKind::detect(path)? {
        None => return Ok(()),
        Some(EntryKind::Directory) => std::fs::remove_dir_all(path),
        Some(EntryKind::Symlink) => return super::symlink::remove_symlink(path),
        Some(EntryKind::File) => std::fs::remove_file(path),
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ResourceError::io("remove", path, e)),
    }
}

/// Remove `dir` if it exists and is empty; any other outcome is ignored.
pub fn remove_dir_if_empty(dir: &Path) {
    let _ = std::fs::remove_dir(dir);
}

/// Undo a move-aside after a failed replace: rename `aside` back to
/// `original` and return `failure`.
///
/// If the rename back fails, `staging` is kept on disk so the displaced
/// object survives, and [`ResourceError::Stranded`] names where it is.
#[must_use]
pub fn roll_back(
    staging: tempfile::TempDir,
    aside: &Path,
    original: &Path,
    failure: ResourceError,
) -> ResourceError {
    match std::fs::rename(aside, original) {
        Ok(()) => failure,
        Err(source) => {
            let kept = staging.keep().join(aside.file_name().unwrap_or_default());
            tracing::error!(
                path = %original.display(),
                kept = %kept.display(),
                "previous object could not be moved back: {failure}"
            );
            ResourceError::Stranded {
                path: original.to_path_buf(),
                kept,
                source,
            }
        }
    }
}

/// Lexically normalize `path`: drop `.` components and fold `..` into the
/// preceding component.  Does not touch the filesystem.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Render a relative path with forward slashes regardless of platform.
#[must_use]
pub fn to_posix(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
