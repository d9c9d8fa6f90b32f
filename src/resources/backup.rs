//! Restore a managed copy to its original location without losing data.
use std::path::{Path, PathBuf};

use super::atomic::atomic_replace;
use super::copy::copy_preserving_metadata;
use super::fs::{ensure_parent_dir, parent_or_cwd};
use super::metadata::{self, MetadataSnapshot};
use super::symlink::{create_symlink, points_to};
use super::{EntryKind, ResourceError, Result};
use crate::platform::Platform;

/// Suffix appended to an object moved aside during restore.
pub const BACKUP_SUFFIX: &str = ".dotbak-backup";

/// Outcome of a successful [`restore_with_backup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    /// Where a foreign object found at the destination was moved to.
    pub backup: Option<PathBuf>,
    /// Metadata that could not be applied for lack of privilege.
    pub warnings: Vec<String>,
}

/// First free backup name for `dest`: `name.dotbak-backup`, then
/// `name.dotbak-backup.1`, `name.dotbak-backup.2`, and so on.
#[must_use]
pub fn backup_path_for(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    let base = dest.with_file_name(format!("{name}{BACKUP_SUFFIX}"));
    if base.symlink_metadata().is_err() {
        return base;
    }
    (1u32..)
        .map(|n| dest.with_file_name(format!("{name}{BACKUP_SUFFIX}.{n}")))
        .find(|candidate| candidate.symlink_metadata().is_err())
        .unwrap_or(base)
}

/// Copy `managed` back to `dest`.
///
/// A symlink at `dest` that points to `managed` is simply replaced.  Any
/// other object at `dest` is first renamed to a free [`backup_path_for`]
/// name.  After the copy, `recorded` (if given) is applied to the top-level
/// object so the restored entry carries the metadata captured when it was
/// first managed.  A symlink entry with a recorded target string is
/// recreated with that exact string, relative or not.
///
/// # Errors
///
/// Returns an error if the backup rename or the copy fails.  If the copy
/// fails after a backup was taken, the backup is moved back to `dest`.
pub fn restore_with_backup(
    managed: &Path,
    dest: &Path,
    recorded: Option<&MetadataSnapshot>,
    platform: &Platform,
) -> Result<RestoreOutcome> {
    let kind = EntryKind::detect(managed)?.ok_or_else(|| ResourceError::NotFound {
        path: managed.to_path_buf(),
    })?;

    let backup = match EntryKind::detect(dest)? {
        None => None,
        Some(EntryKind::Symlink) if points_to(dest, managed)? => None,
        Some(_) => {
            let backup = backup_path_for(dest);
            std::fs::rename(dest, &backup).map_err(|e| ResourceError::io("back up", dest, e))?;
            tracing::debug!("moved {} aside to {}", dest.display(), backup.display());
            Some(backup)
        }
    };

    ensure_parent_dir(dest)?;
    let produced = match recorded.and_then(|s| s.symlink_target.as_deref()) {
        Some(target) if kind == EntryKind::Symlink => {
            atomic_replace(dest, parent_or_cwd(dest), |payload| {
                create_symlink(Path::new(target), payload)
            })
            .map(|()| Vec::new())
        }
        _ => copy_preserving_metadata(managed, dest, parent_or_cwd(dest), platform)
            .map(|report| report.warnings),
    };
    let copied = produced.and_then(|mut warnings| {
        if let Some(snapshot) = recorded {
            warnings.extend(metadata::apply(dest, snapshot, kind, platform)?);
        }
        Ok(warnings)
    });

    match copied {
        Ok(warnings) => Ok(RestoreOutcome { backup, warnings }),
        Err(e) => {
            if let Some(backup) = &backup
                && EntryKind::detect(dest).ok().flatten().is_none()
                && let Err(rename_err) = std::fs::rename(backup, dest)
            {
                tracing::warn!(
                    "previous {} left at {}: {rename_err}",
                    dest.display(),
                    backup.display()
                );
            }
            Err(e)
        }
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use filetime::FileTime;

    #[test]
    fn backup_path_increments_when_taken() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join(".zshrc");
        assert_eq!(backup_path_for(&dest), dir.path().join(".zshrc.dotbak-backup"));

        std::fs::write(dir.path().join(".zshrc.dotbak-backup"), "").unwrap();
        assert_eq!(
            backup_path_for(&dest),
            dir.path().join(".zshrc.dotbak-backup.1")
        );

        std::fs::write(dir.path().join(".zshrc.dotbak-backup.1"), "").unwrap();
        assert_eq!(
            backup_path_for(&dest),
            dir.path().join(".zshrc.dotbak-backup.2")
        );
    }

    #[test]
    fn replaces_expected_symlink_without_backup() {
        let dir = tempfile::tempdir().unwrap();
        let managed = dir.path().join("managed");
        std::fs::write(&managed, "managed content").unwrap();
        let dest = dir.path().join("dest");
        std::os::unix::fs::symlink(&managed, &dest).unwrap();

        let outcome = restore_with_backup(&managed, &dest, None, &Platform::detect()).unwrap();

        assert_eq!(outcome.backup, None);
        assert!(!dest.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "managed content");
    }

    #[test]
    fn foreign_file_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let managed = dir.path().join("managed");
        std::fs::write(&managed, "managed content").unwrap();
        let dest = dir.path().join("dest");
        std::fs::write(&dest, "user edits").unwrap();

        let outcome = restore_with_backup(&managed, &dest, None, &Platform::detect()).unwrap();

        let backup = outcome.backup.unwrap();
        assert_eq!(backup, dir.path().join("dest.dotbak-backup"));
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "user edits");
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "managed content");
    }

    #[test]
    fn recorded_metadata_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let managed = dir.path().join("managed");
        std::fs::write(&managed, "x").unwrap();
        let mut recorded = metadata::capture(&managed, EntryKind::File).unwrap();
        recorded.mode = 0o640;
        recorded.mtime_ns = 1_500_000_000 * 1_000_000_000;

        let dest = dir.path().join("dest");
        restore_with_backup(&managed, &dest, Some(&recorded), &Platform::detect()).unwrap();

        let after = metadata::capture(&dest, EntryKind::File).unwrap();
        assert_eq!(after.mode, 0o640);
        assert_eq!(after.mtime(), FileTime::from_unix_time(1_500_000_000, 0));
    }

    #[test]
    fn symlink_entry_gets_its_recorded_target_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("themes")).unwrap();
        std::fs::write(dir.path().join("themes/dark.toml"), "bg = 'black'").unwrap();
        let dest = dir.path().join("theme");
        std::os::unix::fs::symlink("themes/dark.toml", &dest).unwrap();
        let recorded = metadata::capture(&dest, EntryKind::Symlink).unwrap();

        let managed = dir.path().join("managed-theme");
        std::os::unix::fs::symlink(dir.path().join("themes/dark.toml"), &managed).unwrap();
        std::fs::remove_file(&dest).unwrap();
        std::os::unix::fs::symlink(&managed, &dest).unwrap();

        let outcome =
            restore_with_backup(&managed, &dest, Some(&recorded), &Platform::detect()).unwrap();

        assert_eq!(outcome.backup, None);
        assert_eq!(
            std::fs::read_link(&dest).unwrap(),
            Path::new("themes/dark.toml")
        );
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "bg = 'black'");
    }

    #[test]
    fn missing_managed_copy_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("dest");
        std::fs::write(&dest, "keep").unwrap();

        let err = restore_with_backup(
            &dir.path().join("gone"),
            &dest,
            None,
            &Platform::detect(),
        )
        .unwrap_err();

        assert!(matches!(err, ResourceError::NotFound { .. }));
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "keep");
    }
}
