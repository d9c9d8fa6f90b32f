//! `restore`: copy managed entries back to their original locations.
use std::path::PathBuf;

use super::{EntryFailure, EntryOutcome, Manager, RestoreReport, RestoreResult};
use crate::config::Entry;
use crate::error::DotbakError;
use crate::manifest::{Manifest, ManifestRecord};
use crate::resources::backup::restore_with_backup;
use crate::resources::digest::digest_path;
use crate::resources::fs::remove_existing;
use crate::resources::symlink::points_to;
use crate::resources::{self, EntryKind};

impl Manager<'_> {
    /// Put every selected managed entry back in place as a real object.
    ///
    /// Configured entries come first, then records that are no longer
    /// configured, which are restored to the source path they recorded.
    ///
    /// A foreign object at the destination is moved aside first, never
    /// overwritten.  With `forget`, the record and the managed copy are
    /// removed once the entry is back; otherwise the record stays so a later
    /// `apply` relinks without copying.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown group, an unreadable or unwritable
    /// manifest, or an interrupted pass.
    pub fn restore(&self, groups: &[String], forget: bool) -> Result<RestoreReport, DotbakError> {
        let selected = self.select(groups)?;
        let original = self.load_manifest()?;
        let mut manifest = original.clone();
        let mut report = RestoreReport::default();

        for group in selected {
            for entry in group.entries(&self.config.settings.managed_root) {
                if self.interrupted() {
                    return Err(DotbakError::Interrupted);
                }
                let Some(record) = manifest.get(&entry.key).cloned() else {
                    continue;
                };
                let outcome = self.restore_one(entry, &record, forget, &mut manifest);
                report.outcomes.push(outcome);
            }
        }

        // Records no longer configured still know where they came from.
        for key in self.stale_keys(&manifest, groups) {
            if self.interrupted() {
                return Err(DotbakError::Interrupted);
            }
            let Some(record) = manifest.get(&key).cloned() else {
                continue;
            };
            let entry = Entry {
                relative: PathBuf::from(&key.relative_path),
                source: record.source_path.clone(),
                managed: record.managed_path.clone(),
                key,
            };
            let outcome = self.restore_one(entry, &record, forget, &mut manifest);
            report.outcomes.push(outcome);
        }

        let any_success = report
            .outcomes
            .iter()
            .any(|o| {
                matches!(
                    o.result,
                    RestoreResult::Restored { .. } | RestoreResult::Unchanged
                )
            });
        if any_success && manifest != original {
            manifest.save(&self.config.settings.manifest_path)?;
            self.log.debug(&format!(
                "wrote manifest: {}",
                self.config.settings.manifest_path.display()
            ));
            report.manifest_written = true;
        }
        Ok(report)
    }

    fn restore_one(
        &self,
        entry: Entry,
        record: &ManifestRecord,
        forget: bool,
        manifest: &mut Manifest,
    ) -> EntryOutcome<RestoreResult> {
        let mut warnings = Vec::new();
        let result = self
            .restore_entry(&entry, record, forget, manifest, &mut warnings)
            .unwrap_or_else(|e| RestoreResult::Failed(EntryFailure::from(e)));
        self.warn_all(&entry.key, &warnings);
        EntryOutcome {
            key: entry.key,
            result,
            warnings,
        }
    }

    fn restore_entry(
        &self,
        entry: &Entry,
        record: &ManifestRecord,
        forget: bool,
        manifest: &mut Manifest,
        warnings: &mut Vec<String>,
    ) -> resources::Result<RestoreResult> {
        if EntryKind::detect(&entry.managed)?.is_none() {
            return Ok(RestoreResult::Skipped {
                reason: format!("managed copy {} is missing", entry.managed.display()),
            });
        }

        let in_place = match EntryKind::detect(&entry.source)? {
            None => false,
            Some(EntryKind::Symlink) if points_to(&entry.source, &entry.managed)? => false,
            Some(_) => digest_path(&entry.source)? == digest_path(&entry.managed)?,
        };

        let result = if in_place {
            RestoreResult::Unchanged
        } else {
            let outcome = restore_with_backup(
                &entry.managed,
                &entry.source,
                Some(&record.metadata),
                self.platform,
            )?;
            warnings.extend(outcome.warnings);
            self.log.debug(&format!(
                "restored {} from {}",
                entry.source.display(),
                entry.managed.display()
            ));
            if let Some(backup) = &outcome.backup {
                self.log.info(&format!(
                    "{}: moved existing {} aside to {}",
                    entry.key,
                    entry.source.display(),
                    backup.display()
                ));
            }
            RestoreResult::Restored {
                backup: outcome.backup,
            }
        };

        if forget {
            // The record goes only once its managed copy is really gone.
            remove_existing(&entry.managed)?;
            manifest.remove(&entry.key);
            self.log.debug(&format!(
                "forgot {}, removed {}",
                entry.key,
                entry.managed.display()
            ));
        }
        Ok(result)
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::os::unix::fs::PermissionsExt as _;

    use filetime::FileTime;

    use super::*;
    use crate::manager::DriftState;
    use crate::manager::testing::Fixture;
    use crate::manifest::EntryKey;

    fn key(relative: &str) -> EntryKey {
        EntryKey::new("user_config", relative)
    }

    #[test]
    fn restore_replaces_link_with_real_file() {
        let fx = Fixture::new(&["wezterm.lua"]);
        let source = fx.write_source("wezterm.lua", "return {}\n");
        std::fs::set_permissions(&source, std::fs::Permissions::from_mode(0o600)).unwrap();
        let mtime = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&source, mtime).unwrap();
        fx.manager().sync(&[]).unwrap();

        let report = fx.manager().restore(&[], false).unwrap();
        assert_eq!(
            report.outcomes[0].result,
            RestoreResult::Restored { backup: None }
        );
        let meta = std::fs::symlink_metadata(&source).unwrap();
        assert!(meta.is_file());
        assert_eq!(meta.permissions().mode() & 0o7777, 0o600);
        assert_eq!(FileTime::from_last_modification_time(&meta), mtime);
        assert_eq!(std::fs::read_to_string(&source).unwrap(), "return {}\n");

        // The record stays, so status reports the entry as unlinked.
        assert!(!report.manifest_written);
        let status = fx.manager().status(&[]).unwrap();
        assert_eq!(status.entries[0].state, DriftState::Unlinked);
    }

    #[test]
    fn restore_keeps_foreign_object_aside() {
        let fx = Fixture::new(&["wezterm.lua"]);
        fx.write_source("wezterm.lua", "return {}\n");
        fx.manager().sync(&[]).unwrap();
        std::fs::remove_file(fx.source("wezterm.lua")).unwrap();
        std::fs::write(fx.source("wezterm.lua"), "user recreated this\n").unwrap();

        let report = fx.manager().restore(&[], false).unwrap();
        let backup = fx.source("wezterm.lua.dotbak-backup");
        assert_eq!(
            report.outcomes[0].result,
            RestoreResult::Restored {
                backup: Some(backup.clone())
            }
        );
        assert_eq!(
            std::fs::read_to_string(&backup).unwrap(),
            "user recreated this\n"
        );
        assert_eq!(
            std::fs::read_to_string(fx.source("wezterm.lua")).unwrap(),
            "return {}\n"
        );
    }

    #[test]
    fn forget_removes_record_and_managed_copy() {
        let fx = Fixture::new(&["zsh"]);
        fx.write_source("zsh/.zshrc", "setopt autocd\n");
        fx.manager().sync(&[]).unwrap();

        let report = fx.manager().restore(&[], true).unwrap();
        assert!(report.manifest_written);
        assert!(std::fs::symlink_metadata(fx.source("zsh")).unwrap().is_dir());
        assert!(!fx.managed("zsh").exists());
        let manifest = Manifest::load(fx.manifest_path()).unwrap().unwrap();
        assert!(manifest.get(&key("zsh")).is_none());
    }

    #[test]
    fn forget_keeps_record_when_managed_copy_cannot_be_removed() {
        let fx = Fixture::new(&["nvim/init.lua", "wezterm.lua"]);
        fx.write_source("nvim/init.lua", "require('core')\n");
        fx.write_source("wezterm.lua", "return {}\n");
        fx.manager().sync(&[]).unwrap();
        if fx.platform.is_privileged() {
            return;
        }
        let locked = fx.managed("nvim");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

        let report = fx.manager().restore(&[], true);
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        let report = report.unwrap();

        assert!(matches!(
            report.outcomes[0].result,
            RestoreResult::Failed(_)
        ));
        assert_eq!(
            report.outcomes[1].result,
            RestoreResult::Restored { backup: None }
        );
        assert!(report.manifest_written);
        assert!(fx.managed("nvim/init.lua").is_file());
        let manifest = Manifest::load(fx.manifest_path()).unwrap().unwrap();
        assert!(manifest.get(&key("nvim/init.lua")).is_some());
        assert!(manifest.get(&key("wezterm.lua")).is_none());
    }

    #[test]
    fn restore_is_idempotent() {
        let fx = Fixture::new(&["wezterm.lua"]);
        fx.write_source("wezterm.lua", "return {}\n");
        fx.manager().sync(&[]).unwrap();
        fx.manager().restore(&[], false).unwrap();

        let report = fx.manager().restore(&[], false).unwrap();
        assert_eq!(report.outcomes[0].result, RestoreResult::Unchanged);
        assert!(!fx.source("wezterm.lua.dotbak-backup").exists());
    }

    #[test]
    fn missing_managed_copy_is_skipped() {
        let fx = Fixture::new(&["wezterm.lua"]);
        fx.write_source("wezterm.lua", "return {}\n");
        fx.manager().sync(&[]).unwrap();
        std::fs::remove_file(fx.managed("wezterm.lua")).unwrap();

        let report = fx.manager().restore(&[], true).unwrap();
        assert!(matches!(
            report.outcomes[0].result,
            RestoreResult::Skipped { .. }
        ));
        let manifest = Manifest::load(fx.manifest_path()).unwrap().unwrap();
        assert!(manifest.get(&key("wezterm.lua")).is_some());
    }

    #[test]
    fn unmanaged_entries_are_not_reported() {
        let fx = Fixture::new(&["zsh"]);
        let report = fx.manager().restore(&[], false).unwrap();
        assert!(report.outcomes.is_empty());
    }
}
