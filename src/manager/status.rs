//! `status`: read-only drift classification.
use super::{DriftEntry, DriftReport, DriftState, Manager};
use crate::config::Entry;
use crate::error::DotbakError;
use crate::manifest::{Manifest, ManifestRecord};
use crate::resources::digest::digest_path;
use crate::resources::health::{LinkHealth, inspect_link};
use crate::resources::{self, EntryKind, ResourceError, metadata};

impl Manager<'_> {
    /// Classify every selected entry without writing anything.
    ///
    /// Configured entries come first, in processing order, followed by
    /// records that are no longer configured.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown group or an unreadable manifest.
    pub fn status(&self, groups: &[String]) -> Result<DriftReport, DotbakError> {
        let selected = self.select(groups)?;
        let manifest = self.load_manifest()?;
        let mut report = DriftReport::default();

        for group in selected {
            for entry in group.entries(&self.config.settings.managed_root) {
                let (state, detail) = self.classify(&entry, &manifest);
                report.entries.push(DriftEntry {
                    key: entry.key,
                    state,
                    detail,
                });
            }
        }
        for key in self.stale_keys(&manifest, groups) {
            report.entries.push(DriftEntry {
                key,
                state: DriftState::Orphaned,
                detail: Some("recorded but no longer configured".to_string()),
            });
        }
        Ok(report)
    }

    pub(super) fn classify(
        &self,
        entry: &Entry,
        manifest: &Manifest,
    ) -> (DriftState, Option<String>) {
        let Some(record) = manifest.get(&entry.key) else {
            return (DriftState::Untracked, None);
        };
        self.classify_recorded(entry, record)
            .unwrap_or_else(|e| (DriftState::Unreadable, Some(e.to_string())))
    }

    fn classify_recorded(
        &self,
        entry: &Entry,
        record: &ManifestRecord,
    ) -> resources::Result<(DriftState, Option<String>)> {
        if EntryKind::detect(&entry.managed)?.is_none() {
            return Ok((
                DriftState::Missing,
                Some(format!("managed copy {} is gone", entry.managed.display())),
            ));
        }
        if record.kind == EntryKind::Symlink
            && EntryKind::detect(&entry.source)? == Some(EntryKind::Symlink)
            && let Some(recorded) = &record.metadata.symlink_target
        {
            let current = std::fs::read_link(&entry.source)
                .map_err(|e| ResourceError::io("read link", &entry.source, e))?;
            if current.to_string_lossy() == recorded.as_str() {
                return Ok((
                    DriftState::Unlinked,
                    Some(format!(
                        "{} is its original link again, not a link to the managed copy",
                        entry.source.display()
                    )),
                ));
            }
        }
        let health = inspect_link(
            &entry.source,
            &entry.managed,
            &self.config.settings.managed_root,
        )?;
        Ok(match health {
            LinkHealth::Absent => (
                DriftState::Missing,
                Some(format!("{} is gone", entry.source.display())),
            ),
            LinkHealth::NotALink(kind) => (
                DriftState::Unlinked,
                Some(format!("{} is a {kind}, not a link", entry.source.display())),
            ),
            LinkHealth::Dangling { target } => (
                DriftState::BrokenLink,
                Some(format!("dangling link to {}", target.display())),
            ),
            LinkHealth::OutsideRoot { target } | LinkHealth::WrongTarget { target } => (
                DriftState::BrokenLink,
                Some(format!("links to {}", target.display())),
            ),
            LinkHealth::Healthy => {
                if digest_path(&entry.managed)? != record.digest {
                    return Ok((
                        DriftState::Modified,
                        Some("managed copy differs from the recorded digest".to_string()),
                    ));
                }
                let differences = metadata::differences(
                    &entry.managed,
                    &record.metadata,
                    record.kind,
                    self.platform,
                )?;
                if differences.is_empty() {
                    (DriftState::Clean, None)
                } else {
                    (DriftState::MetadataDiffers, Some(differences.join("; ")))
                }
            }
        })
    }
}
