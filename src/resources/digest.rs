//! SHA-256 content digests.
//!
//! Every digest uses the canonical format `sha256:<hex>`.  The hashed input
//! starts with the object's kind tag so a file and a symlink whose target
//! string equals the file's bytes never collide:
//!
//! - file: `file\0` followed by the file bytes
//! - symlink: `symlink\0` followed by the link target, resolved to an
//!   absolute path so a copy of a relative link hashes the same
//! - directory: `directory\0` followed by every descendant in sorted order,
//!   each as kind, relative path (forward slashes), then content or the
//!   verbatim target string of a nested link
//!
//! Permissions, ownership, and timestamps are not part of the digest.
use std::path::{Path, PathBuf};

use sha2::{Digest as _, Sha256};

use super::fs::to_posix;
use super::symlink::resolved_target;
use super::{EntryKind, ResourceError, Result};

/// Prefix for all digests produced by this module.
pub const PREFIX: &str = "sha256:";

/// Compute the digest of whatever exists at `path`.
///
/// # Errors
///
/// Returns [`ResourceError::NotFound`] if nothing exists at `path`, or an
/// I/O error if any part of it cannot be read.
pub fn digest_path(path: &Path) -> Result<String> {
    let kind = EntryKind::detect(path)?.ok_or_else(|| ResourceError::NotFound {
        path: path.to_path_buf(),
    })?;
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b"\0");
    match kind {
        EntryKind::File => hash_file(&mut hasher, path)?,
        EntryKind::Symlink => {
            let target = resolved_target(path)?;
            hasher.update(target.to_string_lossy().as_bytes());
        }
        EntryKind::Directory => {
            let mut listing = Vec::new();
            collect_tree(path, Path::new(""), &mut listing)?;
            for (relative, child_kind) in listing {
                let child = path.join(&relative);
                hasher.update(child_kind.as_str().as_bytes());
                hasher.update(b"\0");
                hasher.update(to_posix(&relative).as_bytes());
                hasher.update(b"\0");
                match child_kind {
                    EntryKind::File => {
                        let len = std::fs::symlink_metadata(&child)
                            .map_err(|e| ResourceError::io("inspect", &child, e))?
                            .len();
                        hasher.update(len.to_le_bytes());
                        hash_file(&mut hasher, &child)?;
                    }
                    EntryKind::Symlink => hash_link(&mut hasher, &child)?,
                    EntryKind::Directory => {}
                }
                hasher.update(b"\0");
            }
        }
    }
    Ok(format!("{PREFIX}{:x}", hasher.finalize()))
}

fn hash_file(hasher: &mut Sha256, path: &Path) -> Result<()> {
    let mut file = std::fs::File::open(path).map_err(|e| ResourceError::io("open", path, e))?;
    std::io::copy(&mut file, hasher).map_err(|e| ResourceError::io("read", path, e))?;
    Ok(())
}

fn hash_link(hasher: &mut Sha256, path: &Path) -> Result<()> {
    let target = std::fs::read_link(path).map_err(|e| ResourceError::io("read link", path, e))?;
    hasher.update(target.to_string_lossy().as_bytes());
    Ok(())
}

/// Depth-first listing of every descendant of `root`, children sorted by name.
fn collect_tree(root: &Path, relative: &Path, out: &mut Vec<(PathBuf, EntryKind)>) -> Result<()> {
    let dir = root.join(relative);
    let mut children = Vec::new();
    for entry in std::fs::read_dir(&dir).map_err(|e| ResourceError::io("read dir", &dir, e))? {
        let entry = entry.map_err(|e| ResourceError::io("read dir", &dir, e))?;
        let meta = std::fs::symlink_metadata(entry.path())
            .map_err(|e| ResourceError::io("inspect", entry.path(), e))?;
        children.push((entry.file_name(), EntryKind::from_metadata(&meta)));
    }
    children.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, kind) in children {
        let child = relative.join(&name);
        out.push((child.clone(), kind));
        if kind == EntryKind::Directory {
            collect_tree(root, &child, out)?;
        }
    }
    Ok(())
}
