//! Configuration validation.
//!
//! Every check here runs before any filesystem mutation; a failure aborts the
//! command with a [`ConfigError`].
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use super::Config;
use crate::error::ConfigError;
use crate::resources::fs::to_posix;

/// Check that `name` can be used as a directory directly under the managed
/// root.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidGroupName`] describing the problem.
pub fn validate_group_name(name: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| {
        Err(ConfigError::InvalidGroupName {
            group: name.to_string(),
            reason: reason.to_string(),
        })
    };
    if name.trim().is_empty() {
        return invalid("must not be empty");
    }
    if name.contains(['/', '\\']) {
        return invalid("must not contain a path separator");
    }
    if name.starts_with('.') {
        return invalid("must not start with '.'");
    }
    Ok(())
}

/// Check a raw entry and return it as a normalized relative path.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEntry`] if the entry is empty, absolute, or
/// escapes its base.
pub fn validate_entry(group: &str, raw: &str) -> Result<PathBuf, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidEntry {
        group: group.to_string(),
        entry: raw.to_string(),
        reason: reason.to_string(),
    };
    let path = Path::new(raw);
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(invalid("must not escape its base path")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("must be relative to the base path"));
            }
        }
    }
    if normalized.as_os_str().is_empty() {
        return Err(invalid("must name a path below the base"));
    }
    Ok(normalized)
}

/// Cross-entry and cross-group checks on a parsed configuration.
///
/// # Errors
///
/// Returns the first [`ConfigError`] found.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.groups.is_empty() {
        return Err(ConfigError::NoGroups);
    }

    let mut seen_names: BTreeMap<String, &str> = BTreeMap::new();
    for group in &config.groups {
        validate_group_name(&group.name)?;
        if let Some(previous) = seen_names.insert(group.name.to_lowercase(), &group.name) {
            return Err(ConfigError::InvalidGroupName {
                group: group.name.clone(),
                reason: format!("duplicates group '{previous}' (names are case-insensitive)"),
            });
        }
        if group.entries.is_empty() {
            return Err(ConfigError::EmptyGroup {
                group: group.name.clone(),
            });
        }
        // A missing base is fine; it is created on first restore.
        if group.base.symlink_metadata().is_ok() && !group.base.is_dir() {
            return Err(ConfigError::BaseNotDirectory {
                group: group.name.clone(),
                path: group.base.clone(),
            });
        }
        check_nesting(&group.name, &group.entries)?;
    }

    // Compared case-insensitively so the mapping stays injective on
    // case-insensitive filesystems too.
    let mut managed: BTreeMap<String, String> = BTreeMap::new();
    for group in &config.groups {
        for entry in group.entries(&config.settings.managed_root) {
            let folded = to_posix(&entry.managed).to_lowercase();
            let label = entry.key.to_string();
            if let Some(first) = managed.insert(folded, label.clone()) {
                return Err(ConfigError::ManagedPathCollision {
                    first,
                    second: label,
                    path: entry.managed,
                });
            }
        }
    }
    Ok(())
}

fn check_nesting(group: &str, entries: &[PathBuf]) -> Result<(), ConfigError> {
    for (i, outer) in entries.iter().enumerate() {
        for inner in entries.iter().skip(i + 1) {
            let (outer, inner) = if inner.starts_with(outer) {
                (outer, inner)
            } else if outer.starts_with(inner) {
                (inner, outer)
            } else {
                continue;
            };
            if outer == inner {
                continue;
            }
            return Err(ConfigError::OverlappingEntries {
                group: group.to_string(),
                outer: to_posix(outer),
                inner: to_posix(inner),
            });
        }
    }
    Ok(())
}
