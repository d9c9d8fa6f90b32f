//! The manifest: durable record of every managed entry.
//!
//! On disk the manifest is a version-tagged TOML document with one
//! `[[entries]]` table per record, sorted by group and relative path so that
//! diffs stay readable:
//!
//! ```toml
//! version = 1
//!
//! [[entries]]
//! group = "user_config"
//! relative_path = "zsh"
//! source_path = "/home/me/.config/zsh"
//! managed_path = "/home/me/dotfiles/managed/user_config/zsh"
//! type = "directory"
//! digest = "sha256:…"
//! status = "clean"
//! mode = 493
//! uid = 1000
//! gid = 1000
//! mtime_ns = 1700000000000000000
//! size = 4096
//! ```
//!
//! The in-memory [`Manifest`] is built at command start, mutated only by the
//! Manager, and written back once with [`Manifest::save`].
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ManifestError;
use crate::resources::EntryKind;
use crate::resources::atomic::atomic_write;
use crate::resources::metadata::MetadataSnapshot;

/// Current on-disk format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Identity of an entry: its group and its relative path (forward slashes).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryKey {
    /// Group name.
    pub group: String,
    /// Path relative to the group's base, `/`-separated.
    pub relative_path: String,
}

impl EntryKey {
    /// Create a key.
    #[must_use]
    pub fn new(group: impl Into<String>, relative_path: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            relative_path: relative_path.into(),
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.relative_path)
    }
}

/// Persisted status tag of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordStatus {
    /// Source is linked and the managed copy matches the digest.
    #[default]
    Clean,
    /// The managed copy no longer matches the digest.
    Modified,
    /// The source or the managed copy is gone.
    Missing,
    /// The entry is no longer configured.
    Orphaned,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Clean => "clean",
            Self::Modified => "modified",
            Self::Missing => "missing",
            Self::Orphaned => "orphaned",
        };
        f.write_str(s)
    }
}

/// Persisted state of one managed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRecord {
    /// Original location the entry is linked from and restored to.
    pub source_path: PathBuf,
    /// Location of the managed copy.
    pub managed_path: PathBuf,
    /// Kind of the managed object.
    pub kind: EntryKind,
    /// Content digest (`sha256:<hex>`).
    pub digest: String,
    /// Metadata captured from the source when it was copied.
    pub metadata: MetadataSnapshot,
    /// Status tag.
    pub status: RecordStatus,
}

/// Ordered mapping from [`EntryKey`] to [`ManifestRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Format version this manifest will be written with.
    pub version: u32,
    records: BTreeMap<EntryKey, ManifestRecord>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            records: BTreeMap::new(),
        }
    }
}

/// Flat row as stored in the TOML document.
#[derive(Debug, Serialize, Deserialize)]
struct RecordRow {
    group: String,
    relative_path: String,
    source_path: PathBuf,
    managed_path: PathBuf,
    #[serde(rename = "type")]
    kind: EntryKind,
    digest: String,
    #[serde(default)]
    status: RecordStatus,
    #[serde(flatten)]
    metadata: MetadataSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestFile {
    version: Option<u32>,
    #[serde(default)]
    entries: Vec<RecordRow>,
}

impl Manifest {
    /// Look up a record.
    #[must_use]
    pub fn get(&self, key: &EntryKey) -> Option<&ManifestRecord> {
        self.records.get(key)
    }

    /// Insert or replace a record; returns the previous one.
    pub fn upsert(&mut self, key: EntryKey, record: ManifestRecord) -> Option<ManifestRecord> {
        self.records.insert(key, record)
    }

    /// Remove a record; returns it if it existed.
    pub fn remove(&mut self, key: &EntryKey) -> Option<ManifestRecord> {
        self.records.remove(key)
    }

    /// Set the status tag of an existing record.  Returns `true` if it changed.
    pub fn set_status(&mut self, key: &EntryKey, status: RecordStatus) -> bool {
        match self.records.get_mut(key) {
            Some(record) if record.status != status => {
                record.status = status;
                true
            }
            _ => false,
        }
    }

    /// Records in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntryKey, &ManifestRecord)> {
        self.records.iter()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Load the manifest at `path`.  Returns `Ok(None)` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, is not a
    /// valid manifest, or has an unsupported version.  A corrupt manifest is
    /// never silently replaced by an empty one.
    pub fn load(path: &Path) -> Result<Option<Self>, ManifestError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ManifestError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_toml(&text, path).map(Some)
    }

    /// Load the manifest at `path`, or an empty one if it does not exist.
    ///
    /// # Errors
    ///
    /// See [`Manifest::load`].
    pub fn load_or_default(path: &Path) -> Result<Self, ManifestError> {
        Ok(Self::load(path)?.unwrap_or_default())
    }

    /// Atomically write the manifest to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the atomic write fails.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let text = self.to_toml()?;
        atomic_write(path, text.as_bytes()).map_err(ManifestError::Write)
    }

    /// Parse a manifest document.  `path` is only used for error messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed, contains duplicate
    /// keys, or has a missing or unsupported version.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ManifestError> {
        let corrupt = |message: String| ManifestError::Corrupt {
            path: path.to_path_buf(),
            message,
        };
        let file: ManifestFile = toml::from_str(text).map_err(|e| corrupt(e.to_string()))?;
        let version = file
            .version
            .ok_or_else(|| corrupt("missing 'version' key".to_string()))?;
        if version == 0 || version > MANIFEST_VERSION {
            return Err(ManifestError::UnsupportedVersion {
                path: path.to_path_buf(),
                found: version,
                supported: MANIFEST_VERSION,
            });
        }

        let mut records = BTreeMap::new();
        for row in file.entries {
            let key = EntryKey::new(row.group, row.relative_path);
            let record = ManifestRecord {
                source_path: row.source_path,
                managed_path: row.managed_path,
                kind: row.kind,
                digest: row.digest,
                metadata: row.metadata,
                status: row.status,
            };
            if records.insert(key.clone(), record).is_some() {
                return Err(corrupt(format!("duplicate entry '{key}'")));
            }
        }
        Ok(Self {
            version: MANIFEST_VERSION,
            records,
        })
    }

    /// Serialize to the on-disk TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be represented in TOML.
    pub fn to_toml(&self) -> Result<String, ManifestError> {
        let file = ManifestFile {
            version: Some(self.version),
            entries: self
                .records
                .iter()
                .map(|(key, record)| RecordRow {
                    group: key.group.clone(),
                    relative_path: key.relative_path.clone(),
                    source_path: record.source_path.clone(),
                    managed_path: record.managed_path.clone(),
                    kind: record.kind,
                    digest: record.digest.clone(),
                    status: record.status,
                    metadata: record.metadata.clone(),
                })
                .collect(),
        };
        toml::to_string_pretty(&file).map_err(|e| ManifestError::Serialize(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn record(managed: &str) -> ManifestRecord {
        let name = Path::new(managed).file_name().unwrap();
        ManifestRecord {
            source_path: Path::new("/home/me/.config").join(name),
            managed_path: PathBuf::from(managed),
            kind: EntryKind::File,
            digest: "sha256:abc".to_string(),
            metadata: MetadataSnapshot {
                mode: 0o644,
                uid: Some(1000),
                gid: Some(1000),
                mtime_ns: 1_700_000_000_123_456_789,
                size: 12,
                symlink_target: None,
            },
            status: RecordStatus::Clean,
        }
    }

    #[test]
    fn entry_key_display_and_order() {
        let a = EntryKey::new("a", "z");
        let b = EntryKey::new("b", "a");
        assert!(a < b);
        assert_eq!(a.to_string(), "a/z");
    }

    #[test]
    fn load_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Manifest::load(&dir.path().join("manifest.toml")).unwrap().is_none());
        assert!(Manifest::load_or_default(&dir.path().join("manifest.toml"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn save_then_load_preserves_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.toml");
        let mut manifest = Manifest::default();
        manifest.upsert(EntryKey::new("user", "zsh"), record("/m/user/zsh"));
        let mut link = record("/m/user/link");
        link.kind = EntryKind::Symlink;
        link.metadata.symlink_target = Some("../target".to_string());
        link.status = RecordStatus::Orphaned;
        manifest.upsert(EntryKey::new("user", "link"), link);

        manifest.save(&path).unwrap();
        let loaded = Manifest::load(&path).unwrap().unwrap();

        assert_eq!(loaded, manifest);
    }

    #[test]
    fn document_is_sorted_and_version_tagged() {
        let mut manifest = Manifest::default();
        manifest.upsert(EntryKey::new("user", "zsh"), record("/m/user/zsh"));
        manifest.upsert(EntryKey::new("user", "alacritty"), record("/m/user/alacritty"));

        let text = manifest.to_toml().unwrap();
        assert!(text.starts_with("version = 1"));
        let first = text.find("alacritty").unwrap();
        let second = text.find("\"zsh\"").unwrap();
        assert!(first < second);
        assert!(text.contains("type = \"file\""));
        assert!(text.contains("source_path = \"/home/me/.config/zsh\""));
        assert!(!text.contains("symlink_target"));
    }

    #[test]
    fn corrupt_document_is_an_error() {
        let err = Manifest::from_toml("version = [", Path::new("m.toml")).unwrap_err();
        assert!(matches!(err, ManifestError::Corrupt { .. }));
    }

    #[test]
    fn missing_version_is_corrupt() {
        let err = Manifest::from_toml("entries = []", Path::new("m.toml")).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn newer_version_is_unsupported() {
        let err = Manifest::from_toml("version = 2", Path::new("m.toml")).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::UnsupportedVersion { found: 2, .. }
        ));
    }

    #[test]
    fn duplicate_rows_are_corrupt() {
        let mut manifest = Manifest::default();
        manifest.upsert(EntryKey::new("user", "zsh"), record("/m/user/zsh"));
        let text = manifest.to_toml().unwrap();
        let body = text.trim_start_matches("version = 1").to_string();
        let doubled = format!("version = 1{body}{body}");

        let err = Manifest::from_toml(&doubled, Path::new("m.toml")).unwrap_err();
        assert!(err.to_string().contains("duplicate entry 'user/zsh'"));
    }

    #[test]
    fn set_status_reports_change() {
        let mut manifest = Manifest::default();
        let key = EntryKey::new("user", "zsh");
        manifest.upsert(key.clone(), record("/m/user/zsh"));

        assert!(!manifest.set_status(&key, RecordStatus::Clean));
        assert!(manifest.set_status(&key, RecordStatus::Orphaned));
        assert_eq!(manifest.get(&key).unwrap().status, RecordStatus::Orphaned);
        assert!(!manifest.set_status(&EntryKey::new("x", "y"), RecordStatus::Clean));
    }
}
