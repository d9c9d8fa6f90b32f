//! The Manager: orchestrates passes over configured groups and entries.
//!
//! Each command builds a [`Manager`] around an already-validated [`Config`],
//! loads the manifest once, walks the selected entries in a fixed order
//! (group order, then relative path), and persists the manifest at most once
//! at the end.  Per-entry failures are reported as values; only
//! configuration errors, manifest errors, and interruption abort a pass.
mod doctor;
mod report;
mod restore;
mod status;
mod sync;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub use report::{
    DriftEntry, DriftReport, DriftState, EntryFailure, EntryOutcome, FailureKind, Issue,
    RestoreReport, RestoreResult, Severity, SyncReport, SyncResult,
};

use crate::config::{Config, GroupConfig};
use crate::error::DotbakError;
use crate::logging::Log;
use crate::manifest::{EntryKey, Manifest};
use crate::platform::Platform;

/// Drives the filesystem layer for one command.
pub struct Manager<'a> {
    config: &'a Config,
    platform: &'a Platform,
    log: &'a dyn Log,
    interrupt: Option<Arc<AtomicBool>>,
}

impl std::fmt::Debug for Manager<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("config", &self.config.path)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

impl<'a> Manager<'a> {
    /// Create a manager.
    #[must_use]
    pub fn new(config: &'a Config, platform: &'a Platform, log: &'a dyn Log) -> Self {
        Self {
            config,
            platform,
            log,
            interrupt: None,
        }
    }

    /// Check `flag` between entries; once it is set, mutating passes stop
    /// with [`DotbakError::Interrupted`] without writing the manifest.
    #[must_use]
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Create the managed root and an empty manifest if none exists.
    ///
    /// Returns `true` if a new manifest was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the managed root cannot be created or an existing
    /// manifest is unreadable.
    pub fn init(&self) -> Result<bool, DotbakError> {
        let root = &self.config.settings.managed_root;
        std::fs::create_dir_all(root)
            .map_err(|e| crate::resources::ResourceError::io("create managed root", root, e))?;
        let path = &self.config.settings.manifest_path;
        if Manifest::load(path)?.is_some() {
            self.log.debug(&format!("manifest exists: {}", path.display()));
            return Ok(false);
        }
        Manifest::default().save(path)?;
        self.log
            .debug(&format!("wrote empty manifest: {}", path.display()));
        Ok(true)
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn select(&self, groups: &[String]) -> Result<Vec<&'a GroupConfig>, DotbakError> {
        Ok(self.config.select(groups)?)
    }

    fn load_manifest(&self) -> Result<Manifest, DotbakError> {
        Ok(Manifest::load_or_default(
            &self.config.settings.manifest_path,
        )?)
    }

    /// Records that belong to the selection but have no configured entry.
    ///
    /// With no group filter, records of groups that are no longer configured
    /// count too.
    fn stale_keys(&self, manifest: &Manifest, groups: &[String]) -> Vec<EntryKey> {
        let root = &self.config.settings.managed_root;
        manifest
            .iter()
            .filter(|(key, _)| groups.is_empty() || groups.contains(&key.group))
            .filter(|(key, _)| {
                self.config.group(&key.group).is_none_or(|group| {
                    !group.entries(root).iter().any(|entry| &entry.key == *key)
                })
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn warn_all(&self, key: &EntryKey, warnings: &[String]) {
        for warning in warnings {
            self.log.warn(&format!("{key}: {warning}"));
        }
    }
}
