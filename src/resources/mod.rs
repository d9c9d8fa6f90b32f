//! Filesystem layer: idempotent primitives over paths (check + apply pattern).
//!
//! Nothing in this module knows about groups or manifests.  Every function
//! takes explicit paths and returns a typed [`ResourceError`] on failure;
//! the only state it creates is transient staging data that it removes again
//! before returning.
pub mod atomic;
pub mod backup;
pub mod copy;
pub mod digest;
pub mod error;
pub mod fs;
pub mod health;
pub mod metadata;
pub mod symlink;

use std::fmt;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use error::{ResourceError, Result};

/// Kind of filesystem object an entry refers to.
///
/// Symlinks are never followed: a link is its own kind and is mirrored as a
/// link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A regular file.
    File,
    /// A directory.
    Directory,
    /// A symbolic link.
    Symlink,
}

impl EntryKind {
    /// Classify `metadata` obtained via `symlink_metadata`.
    #[must_use]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        if meta.file_type().is_symlink() {
            Self::Symlink
        } else if meta.is_dir() {
            Self::Directory
        } else {
            Self::File
        }
    }

    /// Inspect `path` without following a trailing symlink.
    ///
    /// Returns `Ok(None)` if nothing exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path exists but cannot be inspected.
    pub fn detect(path: &Path) -> Result<Option<Self>> {
        match std::fs::symlink_metadata(path) {
            Ok(meta) => Ok(Some(Self::from_metadata(&meta))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ResourceError::io("inspect", path, e)),
        }
    }

    /// Lowercase tag used in digests and the manifest.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Symlink => "symlink",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a resource on disk.
///
/// # Examples
///
/// ```
/// use dotbak::resources::ResourceState;
///
/// let missing = ResourceState::Missing;
/// let correct = ResourceState::Correct;
/// let wrong = ResourceState::Incorrect { current: "/other/path".into() };
/// let occupied = ResourceState::Invalid { reason: "a regular file is in the way".into() };
///
/// assert_ne!(missing, correct);
/// assert_eq!(correct, ResourceState::Correct);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Resource does not exist.
    Missing,
    /// Resource exists and matches the desired state.
    Correct,
    /// Resource exists but does not match the desired state and may be
    /// replaced.
    Incorrect {
        /// The current value of the resource.
        current: String,
    },
    /// Something this resource must not clobber occupies its location.
    Invalid {
        /// Reason why the resource cannot be applied.
        reason: String,
    },
}

/// Result of applying a resource change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceChange {
    /// Resource was created or updated.
    Applied {
        /// Metadata that could not be applied for lack of privilege.
        warnings: Vec<String>,
    },
    /// Resource was already correct (no change needed).
    AlreadyCorrect,
}

/// An object on disk with a desired state that can be checked and enforced.
///
/// [`apply`](Self::apply) re-checks the state before touching anything, so
/// applying a correct resource is a no-op.  See [`symlink::SymlinkResource`]
/// and [`copy::ManagedCopy`].
pub trait Resource {
    /// Human-readable description of this resource.
    fn description(&self) -> String;

    /// Check the current state of the resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be determined.
    fn current_state(&self) -> Result<ResourceState>;

    /// Bring the resource into the desired state.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be made, including when the
    /// location is occupied by something the resource refuses to replace.
    fn apply(&self) -> Result<ResourceChange>;
}
