//! Core logging types: summary entries, status, and the [`Log`] trait.

/// Per-entry result for summary reporting.
#[derive(Debug, Clone)]
pub struct SummaryEntry {
    /// Entry label, usually `group/relative/path`.
    pub name: String,
    /// Final status of the entry.
    pub status: SummaryStatus,
    /// Optional detail message (e.g., skip reason or error description).
    pub message: Option<String>,
}

/// Status of a processed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryStatus {
    /// The entry was created, updated, or restored.
    Ok,
    /// The entry was already in the desired state.
    Unchanged,
    /// The entry was skipped (e.g., nothing to manage).
    Skipped,
    /// The entry could not be processed.
    Failed,
}

/// Abstraction over logging backends.
///
/// The Manager logs through this trait so it never needs to know whether
/// output goes to the console, a log file, or a test buffer.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Record an entry result for the summary.
    fn record(&self, name: &str, status: SummaryStatus, message: Option<&str>);
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn summary_status_equality() {
        assert_eq!(SummaryStatus::Ok, SummaryStatus::Ok);
        assert_ne!(SummaryStatus::Ok, SummaryStatus::Failed);
        assert_ne!(SummaryStatus::Skipped, SummaryStatus::Unchanged);
    }

    #[test]
    fn summary_entry_clone() {
        let entry = SummaryEntry {
            name: "user_config/zsh".to_string(),
            status: SummaryStatus::Skipped,
            message: Some("source missing".to_string()),
        };
        let cloned = entry.clone();
        assert_eq!(cloned.name, entry.name);
        assert_eq!(cloned.status, entry.status);
        assert_eq!(cloned.message, entry.message);
    }
}
