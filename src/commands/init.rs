//! Init command implementation.
use std::path::Path;

use anyhow::{Context as _, Result};

use super::CommandSetup;
use crate::cli::{GlobalOpts, InitOpts};
use crate::config::Config;
use crate::error::ConfigError;
use crate::logging::Logger;
use crate::resources::atomic::atomic_write;

/// Run the init command.
///
/// Writes a starter configuration unless one exists (or `--force` is given),
/// then creates the managed root and an empty manifest.
///
/// # Errors
///
/// Returns an error if the configuration already exists without `--force`,
/// cannot be written, or the managed tree cannot be created.
pub fn run(global: &GlobalOpts, opts: &InitOpts, log: &Logger) -> Result<()> {
    let path = Config::default_path(global.config.as_deref());
    log.stage("Writing configuration");
    write_config(&path, opts, log)?;

    let global = GlobalOpts {
        config: Some(path),
        ..global.clone()
    };
    let setup = CommandSetup::init(&global, log)?;

    log.stage("Creating managed tree");
    if setup.manager(log).init()? {
        log.info(&format!(
            "created {}",
            setup.config.settings.manifest_path.display()
        ));
    } else {
        log.info("manifest already exists");
    }
    Ok(())
}

fn write_config(path: &Path, opts: &InitOpts, log: &Logger) -> Result<()> {
    if path.symlink_metadata().is_ok() {
        if !opts.force {
            return Err(ConfigError::AlreadyExists {
                path: path.to_path_buf(),
            }
            .into());
        }
        log.warn(&format!("overwriting {}", path.display()));
    }
    atomic_write(path, template(opts.managed_root.as_deref()).as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    log.info(&format!("wrote {}", path.display()));
    Ok(())
}

/// Starter configuration document.
#[must_use]
pub fn template(managed_root: Option<&str>) -> String {
    let managed_root = toml::Value::String(managed_root.unwrap_or("./managed").to_string());
    format!(
        "# dotbak configuration\n\
         \n\
         [paths]\n\
         user_config = \"~/.config\"\n\
         \n\
         [groups.user_config]\n\
         entries = [\"zsh\", \"wezterm.lua\"]\n\
         \n\
         [settings]\n\
         managed_root = {managed_root}\n"
    )
}
