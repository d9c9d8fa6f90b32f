//! TOML configuration file parsing.
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::paths::{EnvLookup, expand_path};
use super::validation::validate_entry;
use super::{Config, GroupConfig, Settings};
use crate::error::ConfigError;

const DEFAULT_MANAGED_ROOT: &str = "./managed";
const DEFAULT_MANIFEST_NAME: &str = "manifest.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    paths: toml::Table,
    #[serde(default)]
    groups: toml::Table,
    #[serde(default)]
    settings: RawSettings,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGroup {
    base: Option<String>,
    #[serde(default)]
    entries: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    managed_root: Option<String>,
    manifest_path: Option<String>,
}

/// Parse a configuration document located at `config_path`.
///
/// Relative paths resolve against the directory containing `config_path`.
/// Groups keep the order in which they appear in the document.  Only
/// per-value checks happen here; see [`super::validation::validate`] for the
/// cross-entry checks.
///
/// # Errors
///
/// Returns an error if the document is not valid TOML, does not match the
/// schema, or contains a value that cannot be expanded.
pub fn parse(text: &str, config_path: &Path, env: EnvLookup<'_>) -> Result<Config, ConfigError> {
    let parse_error = |message: String| ConfigError::Parse {
        path: config_path.to_path_buf(),
        message,
    };
    let raw: RawConfig = toml::from_str(text).map_err(|e| parse_error(e.to_string()))?;
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    if raw.groups.is_empty() {
        return Err(ConfigError::NoGroups);
    }

    let mut groups = Vec::with_capacity(raw.groups.len());
    for (name, value) in raw.groups {
        let body: RawGroup = value
            .try_into()
            .map_err(|e: toml::de::Error| parse_error(format!("group '{name}': {e}")))?;
        let base_raw = match (body.base, raw.paths.get(&name)) {
            (Some(base), _) => base,
            (None, Some(value)) => value
                .as_str()
                .ok_or_else(|| parse_error(format!("paths.{name} must be a string")))?
                .to_string(),
            (None, None) => return Err(ConfigError::MissingBase { group: name }),
        };
        let base = expand_path(&base_raw, base_dir, env)?;
        let entries = body
            .entries
            .iter()
            .map(|entry| validate_entry(&name, entry))
            .collect::<Result<Vec<PathBuf>, _>>()?;
        groups.push(GroupConfig {
            name,
            base,
            entries,
        });
    }

    let managed_root = expand_path(
        raw.settings
            .managed_root
            .as_deref()
            .unwrap_or(DEFAULT_MANAGED_ROOT),
        base_dir,
        env,
    )?;
    let manifest_path = match raw.settings.manifest_path.as_deref() {
        Some(path) => expand_path(path, base_dir, env)?,
        None => managed_root.join(DEFAULT_MANIFEST_NAME),
    };

    Ok(Config {
        path: config_path.to_path_buf(),
        settings: Settings {
            managed_root,
            manifest_path,
        },
        groups,
    })
}
