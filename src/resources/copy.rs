//! Metadata-preserving copy, and the managed copy as a [`Resource`].
use std::fs::File;
use std::path::{Path, PathBuf};

use super::atomic::atomic_replace;
use super::digest::digest_path;
use super::metadata::{self, MetadataSnapshot};
use super::symlink::{create_symlink, resolved_target};
use super::{EntryKind, Resource, ResourceChange, ResourceError, ResourceState, Result};
use crate::platform::Platform;

/// Outcome of a successful [`copy_preserving_metadata`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyReport {
    /// Kind of the object that was copied.
    pub kind: EntryKind,
    /// Metadata that could not be applied for lack of privilege.
    pub warnings: Vec<String>,
}

/// Copy `src` to `dst`, preserving permission bits, ownership (best-effort),
/// modification times, and nested symlinks.
///
/// When `src` itself is a symlink, the copy points to its absolute target so
/// a relative target still resolves from the copy's location.  Links nested
/// in a directory are copied verbatim.
///
/// The copy is assembled under `staging_root` and renamed into place, so
/// `dst` is either left untouched or fully replaced.  Re-running overwrites
/// rather than merges: stale files inside a destination directory disappear.
///
/// # Errors
///
/// Returns an error if `src` does not exist or any read, write, or rename
/// fails.
pub fn copy_preserving_metadata(
    src: &Path,
    dst: &Path,
    staging_root: &Path,
    platform: &Platform,
) -> Result<CopyReport> {
    let kind = EntryKind::detect(src)?.ok_or_else(|| ResourceError::NotFound {
        path: src.to_path_buf(),
    })?;
    let mut warnings = Vec::new();
    atomic_replace(dst, staging_root, |payload| {
        if kind == EntryKind::Symlink {
            create_symlink(&resolved_target(src)?, payload)?;
            copy_metadata(src, payload, kind, platform, &mut warnings)
        } else {
            mirror(src, payload, kind, platform, &mut warnings)
        }
    })?;
    Ok(CopyReport { kind, warnings })
}

fn mirror(
    src: &Path,
    dst: &Path,
    kind: EntryKind,
    platform: &Platform,
    warnings: &mut Vec<String>,
) -> Result<()> {
    match kind {
        EntryKind::File => copy_file(src, dst)?,
        EntryKind::Symlink => {
            let target =
                std::fs::read_link(src).map_err(|e| ResourceError::io("read link", src, e))?;
            create_symlink(&target, dst)?;
        }
        EntryKind::Directory => {
            std::fs::create_dir(dst).map_err(|e| ResourceError::io("create dir", dst, e))?;
            let mut children = Vec::new();
            for entry in std::fs::read_dir(src).map_err(|e| ResourceError::io("read dir", src, e))? {
                let entry = entry.map_err(|e| ResourceError::io("read dir", src, e))?;
                let meta = std::fs::symlink_metadata(entry.path())
                    .map_err(|e| ResourceError::io("inspect", entry.path(), e))?;
                children.push((entry.file_name(), EntryKind::from_metadata(&meta)));
            }
            children.sort_by(|a, b| a.0.cmp(&b.0));
            for (name, child_kind) in children {
                mirror(&src.join(&name), &dst.join(&name), child_kind, platform, warnings)?;
            }
        }
    }

    // Directories last: writing children would bump their mtime.
    copy_metadata(src, dst, kind, platform, warnings)
}

fn copy_metadata(
    src: &Path,
    dst: &Path,
    kind: EntryKind,
    platform: &Platform,
    warnings: &mut Vec<String>,
) -> Result<()> {
    let snapshot = metadata::capture(src, kind)?;
    for warning in metadata::apply(dst, &snapshot, kind, platform)? {
        if !warnings.contains(&warning) {
            warnings.push(warning);
        }
    }
    Ok(())
}

/// Stream `src` into a new file at `dst` and flush it to disk.
fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    let mut reader = File::open(src).map_err(|e| ResourceError::io("open", src, e))?;
    let mut writer = File::create(dst).map_err(|e| ResourceError::io("create", dst, e))?;
    std::io::copy(&mut reader, &mut writer).map_err(|e| ResourceError::io("copy", src, e))?;
    writer
        .sync_all()
        .map_err(|e| ResourceError::io("sync", dst, e))
}

/// The copy of `source` kept at `managed`: content matching `digest`,
/// metadata matching `snapshot`.
///
/// Applying it copies only when the content differs and otherwise just
/// re-applies metadata, so an unchanged entry costs one digest.
#[derive(Debug)]
pub struct ManagedCopy<'a> {
    /// The object being managed.
    pub source: PathBuf,
    /// Where its copy lives.
    pub managed: PathBuf,
    /// Staging directory on the managed copy's filesystem.
    pub staging_root: PathBuf,
    /// Kind of `source`.
    pub kind: EntryKind,
    /// Digest of `source`.
    pub digest: String,
    /// Metadata of `source`.
    pub snapshot: MetadataSnapshot,
    platform: &'a Platform,
}

enum CopyDrift {
    Absent,
    Content,
    Metadata(Vec<String>),
    InSync,
}

impl<'a> ManagedCopy<'a> {
    /// Describe the managed copy of `source`, digesting and capturing it now.
    ///
    /// # Errors
    ///
    /// Returns an error if `source` does not exist or cannot be read.
    pub fn of(
        source: PathBuf,
        managed: PathBuf,
        staging_root: PathBuf,
        platform: &'a Platform,
    ) -> Result<Self> {
        let kind = EntryKind::detect(&source)?.ok_or_else(|| ResourceError::NotFound {
            path: source.clone(),
        })?;
        let digest = digest_path(&source)?;
        let snapshot = metadata::capture(&source, kind)?;
        Ok(Self {
            source,
            managed,
            staging_root,
            kind,
            digest,
            snapshot,
            platform,
        })
    }

    fn drift(&self) -> Result<CopyDrift> {
        if EntryKind::detect(&self.managed)?.is_none() {
            return Ok(CopyDrift::Absent);
        }
        if digest_path(&self.managed)? != self.digest {
            return Ok(CopyDrift::Content);
        }
        let differences =
            metadata::differences(&self.managed, &self.snapshot, self.kind, self.platform)?;
        Ok(if differences.is_empty() {
            CopyDrift::InSync
        } else {
            CopyDrift::Metadata(differences)
        })
    }

    fn copy(&self) -> Result<Vec<String>> {
        let report =
            copy_preserving_metadata(&self.source, &self.managed, &self.staging_root, self.platform)?;
        if digest_path(&self.managed)? != self.digest {
            return Err(ResourceError::Integrity {
                path: self.managed.clone(),
                reason: "managed copy does not match the source after copying".to_string(),
            });
        }
        Ok(report.warnings)
    }
}

impl Resource for ManagedCopy<'_> {
    fn description(&self) -> String {
        format!("{} -> {}", self.source.display(), self.managed.display())
    }

    fn current_state(&self) -> Result<ResourceState> {
        Ok(match self.drift()? {
            CopyDrift::Absent => ResourceState::Missing,
            CopyDrift::Content => ResourceState::Incorrect {
                current: "content differs from the source".to_string(),
            },
            CopyDrift::Metadata(differences) => ResourceState::Incorrect {
                current: differences.join("; "),
            },
            CopyDrift::InSync => ResourceState::Correct,
        })
    }

    fn apply(&self) -> Result<ResourceChange> {
        let warnings = match self.drift()? {
            CopyDrift::InSync => return Ok(ResourceChange::AlreadyCorrect),
            CopyDrift::Absent | CopyDrift::Content => self.copy()?,
            CopyDrift::Metadata(_) => {
                metadata::apply(&self.managed, &self.snapshot, self.kind, self.platform)?
            }
        };
        Ok(ResourceChange::Applied { warnings })
    }
}
