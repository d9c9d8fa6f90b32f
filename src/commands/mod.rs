pub mod apply;
pub mod doctor;
pub mod init;
pub mod restore;
pub mod status;
pub mod version;

use anyhow::Result;

use crate::cli::GlobalOpts;
use crate::config::Config;
use crate::logging::{Log, Logger};
use crate::manager::Manager;
use crate::platform::Platform;

/// Shared state produced by the common command setup sequence.
///
/// Encapsulates platform detection and configuration loading so that each
/// command does not have to repeat the boilerplate.
#[derive(Debug)]
pub struct CommandSetup {
    pub platform: Platform,
    pub config: Config,
}

impl CommandSetup {
    /// Detect the platform and load the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be found, parsed, or
    /// validated.
    pub fn init(global: &GlobalOpts, log: &Logger) -> Result<Self> {
        let platform = Platform::detect();
        log.debug(&format!(
            "platform: {} (permissions: {}, ownership: {}, timestamps: {})",
            platform.os,
            platform.metadata.permissions,
            platform.metadata.ownership,
            platform.metadata.timestamps
        ));

        log.stage("Loading configuration");
        let config = Config::discover(global.config.as_deref())?;
        log.info(&format!("config: {}", config.path.display()));
        for group in &config.groups {
            log.debug(&format!(
                "group {}: {} entries under {}",
                group.name,
                group.entries.len(),
                group.base.display()
            ));
        }
        log.debug(&format!(
            "managed root: {}",
            config.settings.managed_root.display()
        ));

        Ok(Self { platform, config })
    }

    /// Build a manager over this setup.
    #[must_use]
    pub fn manager<'a>(&'a self, log: &'a dyn Log) -> Manager<'a> {
        Manager::new(&self.config, &self.platform, log)
    }
}

/// Print the summary and bail if any entry failed.
///
/// # Errors
///
/// Returns an error if one or more entries recorded a failure.
pub fn finish(log: &Logger) -> Result<()> {
    log.print_summary();

    let count = log.failure_count();
    if count > 0 {
        anyhow::bail!("{count} entr{} failed", if count == 1 { "y" } else { "ies" });
    }
    Ok(())
}
