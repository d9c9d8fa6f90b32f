//! Capture and re-apply filesystem metadata.
//!
//! A [`MetadataSnapshot`] records the fields a plain copy would drop.
//! Re-applying one is ordered: ownership, then permission bits (a `chown` may
//! clear set-id bits), then the modification time (any write would bump it).
use std::path::Path;

use filetime::FileTime;
use serde::{Deserialize, Serialize};

use super::{EntryKind, ResourceError, Result};
use crate::platform::Platform;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Metadata captured from a source object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    /// Permission bits (`0o7777` mask on Unix).
    pub mode: u32,
    /// Owner user id, when the platform exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    /// Owner group id, when the platform exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
    /// Modification time in nanoseconds since the Unix epoch.
    pub mtime_ns: i64,
    /// Size in bytes as reported by the filesystem.
    pub size: u64,
    /// Link target string, for symlinks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symlink_target: Option<String>,
}

impl MetadataSnapshot {
    /// Modification time as a [`FileTime`].
    #[must_use]
    pub fn mtime(&self) -> FileTime {
        let secs = self.mtime_ns.div_euclid(NANOS_PER_SEC);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let nanos = self.mtime_ns.rem_euclid(NANOS_PER_SEC) as u32;
        FileTime::from_unix_time(secs, nanos)
    }
}

/// Capture metadata from `path` without following a trailing symlink.
///
/// # Errors
///
/// Returns an error if the path cannot be inspected.
pub fn capture(path: &Path, kind: EntryKind) -> Result<MetadataSnapshot> {
    let meta = std::fs::symlink_metadata(path).map_err(|e| ResourceError::io("inspect", path, e))?;
    let mtime = FileTime::from_last_modification_time(&meta);
    let symlink_target = if kind == EntryKind::Symlink {
        let target =
            std::fs::read_link(path).map_err(|e| ResourceError::io("read link", path, e))?;
        Some(target.to_string_lossy().into_owned())
    } else {
        None
    };
    let (mode, uid, gid) = owner_and_mode(&meta);
    let mtime_ns = mtime_to_ns(mtime).ok_or_else(|| ResourceError::Integrity {
        path: path.to_path_buf(),
        reason: format!(
            "modification time {}s is outside the representable range",
            mtime.unix_seconds()
        ),
    })?;
    Ok(MetadataSnapshot {
        mode,
        uid,
        gid,
        mtime_ns,
        size: meta.len(),
        symlink_target,
    })
}

/// Nanoseconds since the Unix epoch, or `None` if that overflows an `i64`.
fn mtime_to_ns(mtime: FileTime) -> Option<i64> {
    mtime
        .unix_seconds()
        .checked_mul(NANOS_PER_SEC)?
        .checked_add(i64::from(mtime.nanoseconds()))
}

/// Fields of the object at `path` that no longer match `snapshot`.
///
/// Only permission bits and the modification time are compared, and only
/// where the platform supports them.  Symlinks are never compared.
///
/// # Errors
///
/// Returns an error if the path cannot be inspected.
pub fn differences(
    path: &Path,
    snapshot: &MetadataSnapshot,
    kind: EntryKind,
    platform: &Platform,
) -> Result<Vec<String>> {
    if kind == EntryKind::Symlink {
        return Ok(Vec::new());
    }
    let current = capture(path, kind)?;
    let mut found = Vec::new();
    if platform.metadata.permissions && current.mode != snapshot.mode {
        found.push(format!(
            "mode {:04o}, recorded {:04o}",
            current.mode, snapshot.mode
        ));
    }
    if platform.metadata.timestamps && current.mtime_ns != snapshot.mtime_ns {
        found.push("modification time differs from the recorded one".to_string());
    }
    Ok(found)
}

#[cfg(unix)]
fn owner_and_mode(meta: &std::fs::Metadata) -> (u32, Option<u32>, Option<u32>) {
    use std::os::unix::fs::MetadataExt;
    (meta.mode() & 0o7777, Some(meta.uid()), Some(meta.gid()))
}

#[cfg(not(unix))]
fn owner_and_mode(meta: &std::fs::Metadata) -> (u32, Option<u32>, Option<u32>) {
    let mode = if meta.permissions().readonly() { 0o444 } else { 0o644 };
    (mode, None, None)
}

/// Apply `snapshot` to the object at `path`.
///
/// Returns warnings for fields that could not be applied for lack of
/// privilege; those never fail the call.
///
/// # Errors
///
/// Returns an error if permissions or timestamps cannot be applied for a
/// reason other than privilege.
pub fn apply(
    path: &Path,
    snapshot: &MetadataSnapshot,
    kind: EntryKind,
    platform: &Platform,
) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    if platform.metadata.ownership
        && let (Some(uid), Some(gid)) = (snapshot.uid, snapshot.gid)
        && let Some(warning) = apply_ownership(path, uid, gid, platform)?
    {
        warnings.push(warning);
    }

    if platform.metadata.permissions && kind != EntryKind::Symlink {
        set_mode(path, snapshot.mode)?;
    }

    if platform.metadata.timestamps {
        let mtime = snapshot.mtime();
        if kind == EntryKind::Symlink {
            if let Err(e) = filetime::set_symlink_file_times(path, mtime, mtime) {
                warnings.push(format!(
                    "cannot set timestamp on symlink {}: {e}",
                    path.display()
                ));
            }
        } else {
            filetime::set_file_mtime(path, mtime)
                .map_err(|e| ResourceError::io("set mtime", path, e))?;
        }
    }

    Ok(warnings)
}

#[cfg(unix)]
fn apply_ownership(path: &Path, uid: u32, gid: u32, platform: &Platform) -> Result<Option<String>> {
    use std::os::unix::fs::MetadataExt;

    let meta = std::fs::symlink_metadata(path).map_err(|e| ResourceError::io("inspect", path, e))?;
    if meta.uid() == uid && meta.gid() == gid {
        return Ok(None);
    }
    let denied = || {
        format!(
            "ownership {uid}:{gid} not applied to {} (insufficient privilege)",
            path.display()
        )
    };
    if !platform.can_chown_to(uid) {
        return Ok(Some(denied()));
    }
    match std::os::unix::fs::lchown(path, Some(uid), Some(gid)) {
        Ok(()) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied || e.raw_os_error() == Some(1) => {
            Ok(Some(denied()))
        }
        Err(e) => Err(ResourceError::io("chown", path, e)),
    }
}

#[cfg(not(unix))]
fn apply_ownership(_: &Path, _: u32, _: u32, _: &Platform) -> Result<Option<String>> {
    Ok(None)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| ResourceError::io("chmod", path, e))
}

#[cfg(not(unix))]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    let mut perms = std::fs::metadata(path)
        .map_err(|e| ResourceError::io("inspect", path, e))?
        .permissions();
    perms.set_readonly(mode & 0o222 == 0);
    std::fs::set_permissions(path, perms).map_err(|e| ResourceError::io("chmod", path, e))
}
