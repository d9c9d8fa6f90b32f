//! Apply command implementation.
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Result;

use super::CommandSetup;
use crate::cli::GlobalOpts;
use crate::logging::{Log, Logger};
use crate::manager::SyncReport;

/// Run the apply command.
///
/// # Errors
///
/// Returns an error if configuration loading fails, the manifest cannot be
/// read or written, the pass is interrupted, or any entry failed.
pub fn run(global: &GlobalOpts, log: &Logger, interrupt: Arc<AtomicBool>) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    log.stage("Applying");
    let report = setup
        .manager(log)
        .with_interrupt(interrupt)
        .sync(&global.groups)?;
    record(&report, log);
    if report.manifest_written {
        log.debug("manifest updated");
    }
    super::finish(log)
}

/// Record one summary line per entry.
pub fn record(report: &SyncReport, log: &dyn Log) {
    for outcome in &report.outcomes {
        log.record(
            &outcome.key.to_string(),
            outcome.result.summary_status(),
            outcome.result.detail().as_deref(),
        );
    }
}
