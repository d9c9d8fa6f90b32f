//! Command-line interface definitions.
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI entry point for dotbak.
#[derive(Parser, Debug)]
#[command(
    name = "dotbak",
    about = "Mirror dotfiles into a managed tree and link them back",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Configuration file, or a directory containing dotbak.toml [env: DOTBAK_CONFIG]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Restrict the command to these groups (repeatable)
    #[arg(short, long = "group", global = true, value_name = "GROUP")]
    pub groups: Vec<String>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a starter configuration and create the managed tree
    Init(InitOpts),
    /// Copy configured entries into the managed tree and link them back
    Apply,
    /// Report drift between the manifest and the filesystem
    Status,
    /// Copy managed entries back to their original locations
    Restore(RestoreOpts),
    /// Check the managed tree for problems
    Doctor,
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::Apply => "apply",
            Self::Status => "status",
            Self::Restore(_) => "restore",
            Self::Doctor => "doctor",
            Self::Version => "version",
        }
    }
}

/// Options for the `init` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct InitOpts {
    /// Managed root to write into the new configuration
    #[arg(long, value_name = "DIR")]
    pub managed_root: Option<String>,

    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

/// Options for the `restore` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct RestoreOpts {
    /// Stop managing restored entries: drop their records and managed copies
    #[arg(long)]
    pub forget: bool,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_apply_with_config() {
        let cli = Cli::parse_from(["dotbak", "--config", "/tmp/dotbak.toml", "apply"]);
        assert_eq!(cli.global.config, Some(PathBuf::from("/tmp/dotbak.toml")));
        assert!(matches!(cli.command, Command::Apply));
    }

    #[test]
    fn parse_config_short_after_subcommand() {
        let cli = Cli::parse_from(["dotbak", "status", "-c", "conf"]);
        assert_eq!(cli.global.config, Some(PathBuf::from("conf")));
        assert!(matches!(cli.command, Command::Status));
    }

    #[test]
    fn parse_repeated_groups() {
        let cli = Cli::parse_from(["dotbak", "apply", "-g", "user_config", "--group", "home"]);
        assert_eq!(cli.global.groups, vec!["user_config", "home"]);
    }

    #[test]
    fn parse_restore_forget() {
        let cli = Cli::parse_from(["dotbak", "restore", "--forget"]);
        assert!(
            matches!(&cli.command, Command::Restore(_)),
            "Expected Restore command"
        );
        if let Command::Restore(opts) = cli.command {
            assert!(opts.forget);
        }
    }

    #[test]
    fn parse_restore_defaults_to_keeping_records() {
        let cli = Cli::parse_from(["dotbak", "restore"]);
        if let Command::Restore(opts) = cli.command {
            assert!(!opts.forget);
        }
    }

    #[test]
    fn parse_init_options() {
        let cli = Cli::parse_from(["dotbak", "init", "--managed-root", "~/dots", "--force"]);
        assert!(
            matches!(&cli.command, Command::Init(_)),
            "Expected Init command"
        );
        if let Command::Init(opts) = cli.command {
            assert_eq!(opts.managed_root.as_deref(), Some("~/dots"));
            assert!(opts.force);
        }
    }

    #[test]
    fn parse_doctor() {
        let cli = Cli::parse_from(["dotbak", "doctor"]);
        assert!(matches!(cli.command, Command::Doctor));
        assert_eq!(cli.command.name(), "doctor");
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["dotbak", "version"]);
        assert!(matches!(cli.command, Command::Version));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::parse_from(["dotbak", "-v", "apply"]);
        assert!(cli.verbose);
    }

    #[test]
    fn forget_is_only_valid_for_restore() {
        assert!(Cli::try_parse_from(["dotbak", "apply", "--forget"]).is_err());
    }
}
