//! Symlink resource.
use std::path::{Path, PathBuf};

use super::fs::{TEMP_PREFIX, ensure_parent_dir, normalize, parent_or_cwd, roll_back};
use super::{EntryKind, Resource, ResourceChange, ResourceError, ResourceState, Result};

/// A symlink at `link` that should point to `target`.
///
/// Applying the resource only ever installs a link where nothing exists.
/// Relocating an object that is in the way is the caller's job; see
/// [`replace_with_symlink`] for the swap used once a managed copy is safe.
#[derive(Debug, Clone)]
pub struct SymlinkResource {
    /// Where the symlink lives.
    pub link: PathBuf,
    /// What the symlink points to.
    pub target: PathBuf,
}

impl SymlinkResource {
    /// Create a new symlink resource.
    #[must_use]
    pub const fn new(link: PathBuf, target: PathBuf) -> Self {
        Self { link, target }
    }
}

impl Resource for SymlinkResource {
    fn description(&self) -> String {
        format!("{} -> {}", self.link.display(), self.target.display())
    }

    fn current_state(&self) -> Result<ResourceState> {
        match EntryKind::detect(&self.link)? {
            None => Ok(ResourceState::Missing),
            Some(EntryKind::Symlink) => {
                if points_to(&self.link, &self.target)? {
                    Ok(ResourceState::Correct)
                } else {
                    let current = std::fs::read_link(&self.link)
                        .map_err(|e| ResourceError::io("read link", &self.link, e))?;
                    Ok(ResourceState::Incorrect {
                        current: format!("points to {}", current.display()),
                    })
                }
            }
            Some(kind) => Ok(ResourceState::Invalid {
                reason: format!("a {kind} is in the way"),
            }),
        }
    }

    fn apply(&self) -> Result<ResourceChange> {
        match self.current_state()? {
            ResourceState::Correct => Ok(ResourceChange::AlreadyCorrect),
            ResourceState::Missing => {
                ensure_parent_dir(&self.link)?;
                create_symlink(&self.target, &self.link)?;
                Ok(ResourceChange::Applied {
                    warnings: Vec::new(),
                })
            }
            ResourceState::Incorrect { current: reason } | ResourceState::Invalid { reason } => {
                Err(ResourceError::Occupied {
                    path: self.link.clone(),
                    reason,
                })
            }
        }
    }
}

/// Resolve the target of the symlink at `link` to an absolute, lexically
/// normalized path.  Relative targets are resolved against the link's
/// directory.
///
/// # Errors
///
/// Returns an error if `link` is not a readable symlink.
pub fn resolved_target(link: &Path) -> Result<PathBuf> {
    let raw = std::fs::read_link(link).map_err(|e| ResourceError::io("read link", link, e))?;
    let joined = if raw.is_absolute() {
        raw
    } else {
        parent_or_cwd(link).join(raw)
    };
    Ok(normalize(&joined))
}

/// Whether the symlink at `link` points to `target`.
///
/// # Errors
///
/// Returns an error if `link` is not a readable symlink.
pub fn points_to(link: &Path, target: &Path) -> Result<bool> {
    Ok(paths_equal(&resolved_target(link)?, &normalize(target)))
}

/// Replace whatever is at `path` with a symlink to `target`.
///
/// Files and symlinks are swapped with a single rename of a staged link.  A
/// directory is first moved aside into a sibling staging directory, and moved
/// back if the link cannot be put in place.
///
/// # Errors
///
/// Returns an error if staging, renaming, or link creation fails.  On error,
/// the object previously at `path` is still there, unless moving it back
/// failed too; then [`ResourceError::Stranded`] names where it was kept.
pub fn replace_with_symlink(path: &Path, target: &Path) -> Result<()> {
    let parent = parent_or_cwd(path);
    let staging = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempdir_in(parent)
        .map_err(|e| ResourceError::io("create staging dir", parent, e))?;
    let staged = staging.path().join("link");
    create_symlink(target, &staged)?;

    if EntryKind::detect(path)? == Some(EntryKind::Directory) {
        let aside = staging.path().join("previous");
        std::fs::rename(path, &aside).map_err(|e| ResourceError::io("move aside", path, e))?;
        if let Err(e) = std::fs::rename(&staged, path) {
            let failure = ResourceError::io("rename link into place", path, e);
            return Err(roll_back(staging, &aside, path, failure));
        }
    } else {
        std::fs::rename(&staged, path)
            .map_err(|e| ResourceError::io("rename link into place", path, e))?;
    }

    staging
        .close()
        .map_err(|e| ResourceError::io("remove staging dir", parent, e))
}

/// Compare two paths for equality, handling UNC prefix normalization on Windows.
fn paths_equal(a: &Path, b: &Path) -> bool {
    let normalize = |p: &Path| -> PathBuf {
        #[cfg(windows)]
        {
            let s = p.to_string_lossy();
            if let Some(stripped) = s.strip_prefix(r"\\?\") {
                return PathBuf::from(stripped);
            }
        }
        p.to_path_buf()
    };

    normalize(a) == normalize(b)
}

/// Create a symlink at `link` pointing to `target`.
///
/// # Errors
///
/// Returns an error if the link cannot be created.
pub fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    let result = std::os::unix::fs::symlink(target, link);

    #[cfg(windows)]
    let result = {
        let resolved = if target.is_absolute() {
            target.to_path_buf()
        } else {
            parent_or_cwd(link).join(target)
        };
        if resolved.is_dir() {
            std::os::windows::fs::symlink_dir(target, link)
        } else {
            std::os::windows::fs::symlink_file(target, link)
        }
    };

    result.map_err(|e| ResourceError::io("create symlink", link, e))
}

/// Remove a symlink, handling platform differences.
///
/// On Windows, directory symlinks must be removed with `remove_dir` (not `remove_file`).
/// Rust's `symlink_metadata().is_dir()` returns `false` for symlinks, so we check
/// the raw `FILE_ATTRIBUTE_DIRECTORY` flag to detect directory symlinks.
///
/// # Errors
///
/// Returns an error if the link cannot be inspected or removed.
pub fn remove_symlink(path: &Path) -> Result<()> {
    let meta =
        std::fs::symlink_metadata(path).map_err(|e| ResourceError::io("inspect", path, e))?;
    let result = if is_dir_like(&meta) {
        std::fs::remove_dir(path)
    } else {
        std::fs::remove_file(path)
    };
    result.map_err(|e| ResourceError::io("remove symlink", path, e))
}

/// Check if metadata represents a directory-like entry.
/// On Windows, `symlink_metadata().is_dir()` returns `false` for directory symlinks,
/// so we check the raw `FILE_ATTRIBUTE_DIRECTORY` bit instead.
fn is_dir_like(meta: &std::fs::Metadata) -> bool {
    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        meta.file_attributes() & 0x10 != 0 // FILE_ATTRIBUTE_DIRECTORY
    }
    #[cfg(not(windows))]
    {
        meta.is_dir()
    }
}
