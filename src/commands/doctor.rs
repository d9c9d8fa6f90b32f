//! Doctor command implementation.
use anyhow::Result;

use super::CommandSetup;
use crate::cli::GlobalOpts;
use crate::logging::Logger;
use crate::manager::{Issue, Severity};

/// Run the doctor command.
///
/// # Errors
///
/// Returns an error if configuration loading fails, the manifest cannot be
/// read, or any issue was found.
pub fn run(global: &GlobalOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    log.stage("Checking managed tree");
    let issues = setup.manager(log).doctor(&global.groups)?;
    for issue in &issues {
        match issue.severity {
            Severity::Error => log.error(&issue.to_string()),
            Severity::Warning => log.warn(&issue.to_string()),
        }
    }
    log.info(&render(&issues));
    if !issues.is_empty() {
        anyhow::bail!("doctor found {} issue(s)", issues.len());
    }
    Ok(())
}

/// Closing line of a doctor run.
#[must_use]
pub fn render(issues: &[Issue]) -> String {
    if issues.is_empty() {
        return "no issues found".to_string();
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == Severity::Error)
        .count();
    format!(
        "{} issue(s): {errors} error(s), {} warning(s)",
        issues.len(),
        issues.len() - errors
    )
}
