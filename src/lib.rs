//! Dotfile backup and linking engine.
//!
//! Mirrors configured files and directories into a managed tree, replaces the
//! originals with symlinks into that tree, and records what is managed in a
//! versioned manifest so the tree can be inspected, repaired, and restored.
//!
//! The public API is organised into four layers:
//!
//! - **[`config`]**: load, expand, and validate `dotbak.toml`
//! - **[`resources`]**: metadata-preserving copy, atomic replace, symlinks,
//!   digests, and restore-with-backup over plain paths
//! - **[`manager`]**: per-entry state inspection and transitions, backed by the
//!   [`manifest`]
//! - **[`commands`]**: top-level subcommand orchestration (`init`, `apply`,
//!   `status`, `restore`, `doctor`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod manifest;
pub mod platform;
pub mod resources;
