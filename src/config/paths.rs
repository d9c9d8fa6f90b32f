//! Path expansion for configuration values.
//!
//! Supports a leading `~`, `$VAR` and `${VAR}`.  Relative results are joined
//! onto the configuration file's directory and lexically normalized.
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::resources::fs::normalize;

/// Environment lookup used during expansion.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Look a variable up in the process environment.
#[must_use]
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Expand `raw` into an absolute path, resolving relative paths against
/// `base_dir`.
///
/// # Errors
///
/// Returns an error if a referenced variable is unset or `~` is used without
/// a home directory.
pub fn expand_path(raw: &str, base_dir: &Path, env: EnvLookup<'_>) -> Result<PathBuf, ConfigError> {
    let text = expand_vars(raw, env)?;
    let expanded = expand_tilde(&text, env)?;
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        base_dir.join(expanded)
    };
    Ok(normalize(&absolute))
}

fn expand_tilde(text: &str, env: EnvLookup<'_>) -> Result<PathBuf, ConfigError> {
    let rest = if text == "~" {
        ""
    } else if let Some(rest) = text.strip_prefix("~/").or_else(|| text.strip_prefix("~\\")) {
        rest
    } else {
        return Ok(PathBuf::from(text));
    };
    let home = ["HOME", "USERPROFILE"]
        .iter()
        .find_map(|var| env(var).filter(|v| !v.is_empty()))
        .ok_or(ConfigError::HomeNotSet)?;
    Ok(PathBuf::from(home).join(rest))
}

fn expand_vars(raw: &str, env: EnvLookup<'_>) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some((before, after)) = rest.split_once('$') {
        out.push_str(before);
        let (name, remainder) = if let Some(braced) = after.strip_prefix('{') {
            braced.split_once('}').unwrap_or(("", after))
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            after.split_at(end)
        };
        if name.is_empty() {
            out.push('$');
            rest = after;
            continue;
        }
        let value = env(name).ok_or_else(|| ConfigError::UnresolvedVariable {
            value: raw.to_string(),
            variable: name.to_string(),
        })?;
        out.push_str(&value);
        rest = remainder;
    }
    out.push_str(rest);
    Ok(out)
}
