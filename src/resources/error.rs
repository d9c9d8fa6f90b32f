//! Typed error variants for filesystem-layer operations.
//!
//! This module provides [`ResourceError`], a structured error type for the
//! copy, link, restore, and persistence primitives.  The Manager classifies
//! these variants into per-entry failures; callers at the CLI boundary
//! convert them to [`anyhow::Error`] via `?`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that arise from filesystem-layer primitives.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// An I/O operation failed.
    #[error("{op} {}: {source}", .path.display())]
    Io {
        /// Short description of the failed operation (e.g. `"copy"`).
        op: &'static str,
        /// Path the operation was acting on.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The operation was denied due to insufficient privileges.
    #[error("permission denied: {op} {}", .path.display())]
    PermissionDenied {
        /// Short description of the failed operation.
        op: &'static str,
        /// Path for which permission was denied.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A path is occupied by an object this primitive refuses to replace.
    #[error("{} is occupied: {reason}", .path.display())]
    Occupied {
        /// The occupied path.
        path: PathBuf,
        /// What currently occupies it.
        reason: String,
    },

    /// A path that must exist is absent.
    #[error("not found: {}", .path.display())]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// Content on disk does not match what was expected.
    #[error("integrity check failed for {}: {reason}", .path.display())]
    Integrity {
        /// Path whose content failed verification.
        path: PathBuf,
        /// Human-readable explanation.
        reason: String,
    },

    /// A replacement failed and the displaced object could not be moved
    /// back; it was left in a kept staging directory.
    #[error(
        "{} could not be restored after a failed replace; the previous object was kept at {}: {source}",
        .path.display(),
        .kept.display()
    )]
    Stranded {
        /// Path the previous object belongs at.
        path: PathBuf,
        /// Where the previous object now lives.
        kept: PathBuf,
        /// Why moving it back failed.
        #[source]
        source: io::Error,
    },
}

impl ResourceError {
    /// Wrap an [`io::Error`], routing permission failures to
    /// [`ResourceError::PermissionDenied`].
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { op, path, source },
            _ => Self::Io { op, path, source },
        }
    }

    /// Whether this error was caused by missing privileges.
    #[must_use]
    pub const fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }
}

/// Shorthand used throughout the filesystem layer.
pub type Result<T> = std::result::Result<T, ResourceError>;
