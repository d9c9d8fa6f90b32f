use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context as _, Result};
use clap::Parser;

use dotbak::{cli, commands, logging};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();

    if matches!(args.command, cli::Command::Version) {
        commands::version::run();
        return Ok(());
    }

    logging::init_subscriber(args.verbose, args.command.name());
    let log = logging::Logger::new(args.command.name());

    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupt);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("failed to install the interrupt handler")?;

    match args.command {
        cli::Command::Init(opts) => commands::init::run(&args.global, &opts, &log),
        cli::Command::Apply => commands::apply::run(&args.global, &log, interrupt),
        cli::Command::Status => commands::status::run(&args.global, &log),
        cli::Command::Restore(opts) => {
            commands::restore::run(&args.global, &opts, &log, interrupt)
        }
        cli::Command::Doctor => commands::doctor::run(&args.global, &log),
        cli::Command::Version => Ok(()),
    }
}
