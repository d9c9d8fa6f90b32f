//! Domain-specific error types for dotbak.
//!
//! This module provides a structured error hierarchy using [`thiserror`].
//! Internal modules return typed errors (e.g., [`ConfigError`],
//! [`ManifestError`]) while command handlers at the CLI boundary convert them
//! to [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! DotbakError
//! ├── Config(ConfigError)       — parsing, expansion, validation, group selection
//! ├── Manifest(ManifestError)   — unreadable, corrupt, or unwritable manifest
//! ├── Resource(ResourceError)   — filesystem failures outside any single entry
//! └── Interrupted               — the pass was cancelled between entries
//! ```
//!
//! Only these abort a whole command.  Failures confined to one entry are
//! reported as [`EntryFailure`](crate::manager::EntryFailure) values instead.

use std::path::PathBuf;

use thiserror::Error;

pub use crate::resources::error::ResourceError;

/// Top-level error type for dotbak.
#[derive(Error, Debug)]
pub enum DotbakError {
    /// Configuration-related error; raised before any filesystem mutation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The manifest could not be read, parsed, or written.
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// A filesystem failure that is not attributable to a single entry.
    #[error("Filesystem error: {0}")]
    Resource(#[from] ResourceError),

    /// The pass was interrupted; the manifest was left untouched.
    #[error("Interrupted; the manifest was not updated")]
    Interrupted,
}

/// Errors that arise from configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("Configuration file '{}' does not exist", .path.display())]
    NotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The configuration file already exists (raised by `init` without `--force`).
    #[error("Configuration '{}' already exists; use --force to overwrite", .path.display())]
    AlreadyExists {
        /// Path of the existing file.
        path: PathBuf,
    },

    /// An I/O error occurred while reading or writing the configuration.
    #[error("IO error on config file {}: {source}", .path.display())]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The document is not valid TOML or does not match the schema.
    #[error("Invalid TOML in {}: {message}", .path.display())]
    Parse {
        /// Path of the document.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// No `[groups.<name>]` table was defined.
    #[error("Configuration must define at least one [groups.<name>] table")]
    NoGroups,

    /// A group has neither a `base` key nor a matching `[paths]` entry.
    #[error("Group '{group}' must define a 'base' setting or have a matching entry under [paths]")]
    MissingBase {
        /// Group name.
        group: String,
    },

    /// A group lists no entries.
    #[error("Group '{group}' must define at least one entry")]
    EmptyGroup {
        /// Group name.
        group: String,
    },

    /// A group name cannot be used as a managed-tree directory.
    #[error("Invalid group name '{group}': {reason}")]
    InvalidGroupName {
        /// Group name.
        group: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An entry path is not a clean relative path.
    #[error("Group '{group}' entry '{entry}' {reason}")]
    InvalidEntry {
        /// Group name.
        group: String,
        /// Entry as written in the configuration.
        entry: String,
        /// Why it was rejected.
        reason: String,
    },

    /// One entry is nested inside another entry of the same group.
    #[error("Group '{group}' entry '{inner}' is nested inside entry '{outer}'")]
    OverlappingEntries {
        /// Group name.
        group: String,
        /// The enclosing entry.
        outer: String,
        /// The nested entry.
        inner: String,
    },

    /// Two entries resolve to the same managed path.
    #[error("Entries '{first}' and '{second}' map to the same managed path {}", .path.display())]
    ManagedPathCollision {
        /// Key of the first entry.
        first: String,
        /// Key of the colliding entry.
        second: String,
        /// Shared managed path.
        path: PathBuf,
    },

    /// A base path exists but is not a directory.
    #[error("Base path for group '{group}' is not a directory: {}", .path.display())]
    BaseNotDirectory {
        /// Group name.
        group: String,
        /// Offending path.
        path: PathBuf,
    },

    /// A `--group` filter named a group that is not configured.
    #[error("Unknown group '{0}'")]
    UnknownGroup(String),

    /// A `$VAR` reference could not be resolved.
    #[error("Environment variable '{variable}' referenced by '{value}' is not set")]
    UnresolvedVariable {
        /// The raw value containing the reference.
        value: String,
        /// Name of the missing variable.
        variable: String,
    },

    /// `~` was used but no home directory could be determined.
    #[error("Cannot expand '~': neither HOME nor USERPROFILE is set")]
    HomeNotSet,
}

/// Errors that arise from reading or writing the manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The manifest exists but could not be read.
    #[error("cannot read manifest {}: {source}", .path.display())]
    Io {
        /// Manifest path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The manifest is not a well-formed manifest document.
    #[error("manifest {} is corrupt: {message}", .path.display())]
    Corrupt {
        /// Manifest path.
        path: PathBuf,
        /// What is wrong with it.
        message: String,
    },

    /// The manifest was written by a newer or unknown format version.
    #[error("manifest {} has unsupported format version {found} (supported: {supported})", .path.display())]
    UnsupportedVersion {
        /// Manifest path.
        path: PathBuf,
        /// Version found in the document.
        found: u32,
        /// Highest version this build understands.
        supported: u32,
    },

    /// The in-memory manifest could not be serialized.
    #[error("cannot serialize manifest: {0}")]
    Serialize(String),

    /// The atomic write of the manifest failed.
    #[error("cannot write manifest: {0}")]
    Write(#[source] ResourceError),
}
