//! `apply`: copy each entry into the managed tree and link it back.
use std::io;

use super::{EntryFailure, EntryOutcome, FailureKind, Manager, SyncReport, SyncResult};
use crate::config::{Entry, GroupConfig};
use crate::error::DotbakError;
use crate::manifest::{Manifest, ManifestRecord, RecordStatus};
use crate::resources::copy::ManagedCopy;
use crate::resources::digest::digest_path;
use crate::resources::fs::remove_dir_if_empty;
use crate::resources::metadata;
use crate::resources::symlink::{SymlinkResource, points_to, replace_with_symlink};
use crate::resources::{self, EntryKind, Resource as _, ResourceChange, ResourceError};

impl Manager<'_> {
    /// Bring every selected entry under management.
    ///
    /// An empty `groups` selects all groups.  The manifest is written once,
    /// after the pass, and only if at least one entry succeeded and a record
    /// changed.  Failed entries keep their previous record.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown group, an unreadable manifest, a
    /// manifest that cannot be written, or an interrupted pass.
    pub fn sync(&self, groups: &[String]) -> Result<SyncReport, DotbakError> {
        let selected = self.select(groups)?;
        let original = self.load_manifest()?;
        let mut manifest = original.clone();
        let mut report = SyncReport::default();
        let staging = self.config.settings.staging_dir();

        for group in selected {
            let base_error = unreadable_base(group);
            for entry in group.entries(&self.config.settings.managed_root) {
                if self.interrupted() {
                    remove_dir_if_empty(&staging);
                    return Err(DotbakError::Interrupted);
                }
                let outcome = base_error.as_ref().map_or_else(
                    || self.sync_entry(&entry, &mut manifest),
                    |message| EntryOutcome {
                        key: entry.key.clone(),
                        result: SyncResult::Failed(EntryFailure::new(
                            FailureKind::Config,
                            message.clone(),
                        )),
                        warnings: Vec::new(),
                    },
                );
                self.warn_all(&outcome.key, &outcome.warnings);
                report.outcomes.push(outcome);
            }
        }

        for key in self.stale_keys(&manifest, groups) {
            if manifest.set_status(&key, RecordStatus::Orphaned) {
                self.log
                    .debug(&format!("{key}: no longer configured, marked orphaned"));
            }
        }

        let any_success = report.outcomes.iter().any(|o| o.result.is_success());
        if any_success && manifest != original {
            manifest.save(&self.config.settings.manifest_path)?;
            self.log.debug(&format!(
                "wrote manifest: {}",
                self.config.settings.manifest_path.display()
            ));
            report.manifest_written = true;
        }
        remove_dir_if_empty(&staging);
        Ok(report)
    }

    fn sync_entry(&self, entry: &Entry, manifest: &mut Manifest) -> EntryOutcome<SyncResult> {
        let mut warnings = Vec::new();
        let result = self
            .try_sync_entry(entry, manifest, &mut warnings)
            .unwrap_or_else(|e| SyncResult::Failed(EntryFailure::from(e)));
        EntryOutcome {
            key: entry.key.clone(),
            result,
            warnings,
        }
    }

    fn try_sync_entry(
        &self,
        entry: &Entry,
        manifest: &mut Manifest,
        warnings: &mut Vec<String>,
    ) -> resources::Result<SyncResult> {
        let recorded = manifest.get(&entry.key).cloned();
        let Some(source_kind) = EntryKind::detect(&entry.source)? else {
            return self.relink_missing_source(entry, recorded.as_ref());
        };
        if source_kind == EntryKind::Symlink && points_to(&entry.source, &entry.managed)? {
            return self.confirm_linked(entry, recorded.as_ref(), manifest, warnings);
        }

        let copy = ManagedCopy::of(
            entry.source.clone(),
            entry.managed.clone(),
            self.config.settings.staging_dir(),
            self.platform,
        )?;
        if let ResourceChange::Applied { warnings: applied } = copy.apply()? {
            warnings.extend(applied);
            self.log.debug(&format!("copied {}", copy.description()));
        }

        replace_with_symlink(&entry.source, &entry.managed)?;
        self.log.debug(&format!(
            "linked {} -> {}",
            entry.source.display(),
            entry.managed.display()
        ));

        manifest.upsert(
            entry.key.clone(),
            ManifestRecord {
                source_path: entry.source.clone(),
                managed_path: entry.managed.clone(),
                kind: copy.kind,
                digest: copy.digest,
                metadata: copy.snapshot,
                status: RecordStatus::Clean,
            },
        );
        Ok(if recorded.is_some() {
            SyncResult::Updated
        } else {
            SyncResult::Created
        })
    }

    /// The source is already a link to the managed copy.  Refresh the record
    /// if the managed content changed through the link, and put back recorded
    /// metadata that drifted; write nothing else.
    fn confirm_linked(
        &self,
        entry: &Entry,
        recorded: Option<&ManifestRecord>,
        manifest: &mut Manifest,
        warnings: &mut Vec<String>,
    ) -> resources::Result<SyncResult> {
        let Some(kind) = EntryKind::detect(&entry.managed)? else {
            return Err(ResourceError::Integrity {
                path: entry.managed.clone(),
                reason: "linked, but the managed copy is missing".to_string(),
            });
        };
        let digest = digest_path(&entry.managed)?;
        if let Some(record) = recorded
            && record.digest == digest
            && record.status == RecordStatus::Clean
            && record.source_path == entry.source
        {
            let differences =
                metadata::differences(&entry.managed, &record.metadata, kind, self.platform)?;
            if differences.is_empty() {
                return Ok(SyncResult::Unchanged);
            }
            warnings.extend(metadata::apply(
                &entry.managed,
                &record.metadata,
                kind,
                self.platform,
            )?);
            self.log.debug(&format!(
                "{}: re-applied recorded metadata ({})",
                entry.key,
                differences.join("; ")
            ));
            return Ok(SyncResult::Updated);
        }
        manifest.upsert(
            entry.key.clone(),
            ManifestRecord {
                source_path: entry.source.clone(),
                managed_path: entry.managed.clone(),
                kind,
                digest,
                metadata: metadata::capture(&entry.managed, kind)?,
                status: RecordStatus::Clean,
            },
        );
        Ok(if recorded.is_some() {
            SyncResult::Updated
        } else {
            SyncResult::Created
        })
    }

    /// The source path is gone.  A recorded entry whose managed copy survives
    /// is linked again; anything else has nothing to manage.
    fn relink_missing_source(
        &self,
        entry: &Entry,
        recorded: Option<&ManifestRecord>,
    ) -> resources::Result<SyncResult> {
        if recorded.is_none() {
            return Ok(SyncResult::Skipped {
                reason: "source does not exist".to_string(),
            });
        }
        if EntryKind::detect(&entry.managed)?.is_none() {
            return Err(ResourceError::Integrity {
                path: entry.managed.clone(),
                reason: "both the source and the managed copy are missing".to_string(),
            });
        }
        SymlinkResource::new(entry.source.clone(), entry.managed.clone()).apply()?;
        self.log.debug(&format!(
            "relinked {} -> {}",
            entry.source.display(),
            entry.managed.display()
        ));
        Ok(SyncResult::Updated)
    }
}

/// Why a group's base cannot be used, if it cannot.  A missing base is fine.
fn unreadable_base(group: &GroupConfig) -> Option<String> {
    match std::fs::read_dir(&group.base) {
        Ok(_) => None,
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => Some(format!(
            "cannot read base {} of group '{}': {e}",
            group.base.display(),
            group.name
        )),
    }
}
