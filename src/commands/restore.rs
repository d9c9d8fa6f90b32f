//! Restore command implementation.
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Result;

use super::CommandSetup;
use crate::cli::{GlobalOpts, RestoreOpts};
use crate::logging::{Log, Logger};
use crate::manager::RestoreReport;

/// Run the restore command.
///
/// # Errors
///
/// Returns an error if configuration loading fails, the manifest cannot be
/// read or written, the pass is interrupted, or any entry failed.
pub fn run(
    global: &GlobalOpts,
    opts: &RestoreOpts,
    log: &Logger,
    interrupt: Arc<AtomicBool>,
) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    log.stage(if opts.forget {
        "Restoring and forgetting"
    } else {
        "Restoring"
    });
    let report = setup
        .manager(log)
        .with_interrupt(interrupt)
        .restore(&global.groups, opts.forget)?;
    if report.outcomes.is_empty() {
        log.info("nothing to restore");
    }
    record(&report, log);
    super::finish(log)
}

/// Record one summary line per entry.
pub fn record(report: &RestoreReport, log: &dyn Log) {
    for outcome in &report.outcomes {
        log.record(
            &outcome.key.to_string(),
            outcome.result.summary_status(),
            outcome.result.detail().as_deref(),
        );
    }
}
