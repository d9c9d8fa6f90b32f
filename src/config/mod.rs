//! Configuration: `dotbak.toml` loading, path expansion, and validation.
//!
//! The rest of the crate only sees the already-expanded, already-validated
//! [`Config`]; nothing outside this module parses TOML or resolves `~`.
pub mod paths;
pub mod toml_loader;
pub mod validation;

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::manifest::EntryKey;
use crate::resources::fs::to_posix;

/// File name looked up when no configuration path is given.
pub const DEFAULT_CONFIG_FILENAME: &str = "dotbak.toml";

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "DOTBAK_CONFIG";

/// Directory under the managed root holding in-flight staging data.
pub const STAGING_DIR_NAME: &str = ".dotbak-staging";

/// Global settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Root of the managed tree.
    pub managed_root: PathBuf,
    /// Location of the manifest file.
    pub manifest_path: PathBuf,
}

impl Settings {
    /// Staging directory used for atomic copies into the managed tree.
    #[must_use]
    pub fn staging_dir(&self) -> PathBuf {
        self.managed_root.join(STAGING_DIR_NAME)
    }
}

/// A named collection of entries sharing one base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupConfig {
    /// Group name; also the group's directory under the managed root.
    pub name: String,
    /// Absolute base path.
    pub base: PathBuf,
    /// Normalized relative entry paths, in document order.
    pub entries: Vec<PathBuf>,
}

/// One configured entry with its computed paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Manifest key.
    pub key: EntryKey,
    /// Path relative to the group base.
    pub relative: PathBuf,
    /// Original location (base + relative).
    pub source: PathBuf,
    /// Location in the managed tree (root + group + relative).
    pub managed: PathBuf,
}

impl GroupConfig {
    /// Source path for `relative`.
    #[must_use]
    pub fn source_path(&self, relative: &Path) -> PathBuf {
        self.base.join(relative)
    }

    /// Managed path for `relative`.
    #[must_use]
    pub fn managed_path(&self, managed_root: &Path, relative: &Path) -> PathBuf {
        managed_root.join(&self.name).join(relative)
    }

    /// Entries in processing order: relative path, lexically.
    #[must_use]
    pub fn entries(&self, managed_root: &Path) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self
            .entries
            .iter()
            .map(|relative| Entry {
                key: EntryKey::new(&self.name, to_posix(relative)),
                relative: relative.clone(),
                source: self.source_path(relative),
                managed: self.managed_path(managed_root, relative),
            })
            .collect();
        entries.sort_by(|a, b| a.key.relative_path.cmp(&b.key.relative_path));
        entries
    }
}

/// Fully loaded configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the configuration file.
    pub path: PathBuf,
    /// Global settings.
    pub settings: Settings,
    /// Groups in document order.
    pub groups: Vec<GroupConfig>,
}

impl Config {
    /// Where the configuration lives: `explicit` (a file, or a directory
    /// containing [`DEFAULT_CONFIG_FILENAME`]), else `$DOTBAK_CONFIG`, else
    /// `./dotbak.toml`.  The path need not exist.
    #[must_use]
    pub fn default_path(explicit: Option<&Path>) -> PathBuf {
        let candidate = explicit.map_or_else(
            || {
                std::env::var_os(CONFIG_ENV_VAR)
                    .filter(|v| !v.is_empty())
                    .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME), PathBuf::from)
            },
            Path::to_path_buf,
        );
        if candidate.is_dir() {
            candidate.join(DEFAULT_CONFIG_FILENAME)
        } else {
            candidate
        }
    }

    /// Resolve and canonicalize the configuration path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file does not exist.
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let path = Self::default_path(explicit);
        if !path.is_file() {
            return Err(ConfigError::NotFound { path });
        }
        dunce::canonicalize(&path).map_err(|source| ConfigError::Io { path, source })
    }

    /// Discover, load, and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be found, read, parsed, or
    /// validated.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load(&Self::resolve_path(explicit)?)
    }

    /// Load and validate the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str_with_env(&text, path, &paths::process_env)
    }

    /// Parse and validate a document as if it were stored at `path`, using
    /// `env` for `~` and `$VAR` expansion.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed or validated.
    pub fn from_str_with_env(
        text: &str,
        path: &Path,
        env: paths::EnvLookup<'_>,
    ) -> Result<Self, ConfigError> {
        let config = toml_loader::parse(text, path, env)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Look up a group by name.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&GroupConfig> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Groups selected by `names`, in configuration order.  An empty filter
    /// selects every group.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownGroup`] for a name that is not
    /// configured.
    pub fn select(&self, names: &[String]) -> Result<Vec<&GroupConfig>, ConfigError> {
        if let Some(unknown) = names.iter().find(|n| self.group(n).is_none()) {
            return Err(ConfigError::UnknownGroup(unknown.clone()));
        }
        Ok(self
            .groups
            .iter()
            .filter(|g| names.is_empty() || names.contains(&g.name))
            .collect())
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config::from_str_with_env(
            r#"
            [groups.user_config]
            base = "/home/me/.config"
            entries = ["zsh", "wezterm.lua", "alacritty/alacritty.toml"]

            [groups.home]
            base = "/home/me"
            entries = [".gitconfig"]
            "#,
            Path::new("/conf/dotbak.toml"),
            &|_: &str| -> Option<String> { None },
        )
        .unwrap()
    }

    #[test]
    fn entries_are_sorted_and_mapped() {
        let config = sample();
        let entries = config.groups[0].entries(&config.settings.managed_root);
        let keys: Vec<String> = entries.iter().map(|e| e.key.to_string()).collect();
        assert_eq!(
            keys,
            vec![
                "user_config/alacritty/alacritty.toml",
                "user_config/wezterm.lua",
                "user_config/zsh"
            ]
        );
        assert_eq!(entries[2].source, PathBuf::from("/home/me/.config/zsh"));
        assert_eq!(
            entries[2].managed,
            PathBuf::from("/conf/managed/user_config/zsh")
        );
    }

    #[test]
    fn select_keeps_config_order() {
        let config = sample();
        let selected = config
            .select(&["home".to_string(), "user_config".to_string()])
            .unwrap();
        assert_eq!(selected[0].name, "user_config");
        assert_eq!(selected[1].name, "home");
        assert_eq!(config.select(&[]).unwrap().len(), 2);
    }

    #[test]
    fn select_rejects_unknown_group() {
        let err = sample().select(&["fonts".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownGroup(ref g) if g == "fonts"));
    }

    #[test]
    fn staging_dir_is_under_managed_root() {
        assert_eq!(
            sample().settings.staging_dir(),
            PathBuf::from("/conf/managed/.dotbak-staging")
        );
    }

    #[test]
    fn resolve_path_accepts_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_CONFIG_FILENAME), "").unwrap();
        let resolved = Config::resolve_path(Some(dir.path())).unwrap();
        assert!(resolved.ends_with(DEFAULT_CONFIG_FILENAME));
    }

    #[test]
    fn resolve_path_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::resolve_path(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }
}
