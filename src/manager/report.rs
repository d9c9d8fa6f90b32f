//! Per-entry outcomes returned by the Manager.
//!
//! Nothing here is persisted.  Commands turn these values into console
//! output, summary lines, and an exit status.
use std::fmt;
use std::path::PathBuf;

use crate::logging::SummaryStatus;
use crate::manifest::EntryKey;
use crate::resources::ResourceError;

/// Classification of a per-entry failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The group's configuration could not be acted on (e.g. unreadable base).
    Config,
    /// The process lacks the rights to perform the operation.
    Privilege,
    /// The destination is occupied by an unexpected object.
    Conflict,
    /// Content on disk does not match what the manifest expects.
    Integrity,
    /// Any other filesystem failure.
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Privilege => "privilege",
            Self::Conflict => "conflict",
            Self::Integrity => "integrity",
            Self::Io => "io",
        };
        f.write_str(s)
    }
}

/// A failure confined to one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFailure {
    /// What went wrong, broadly.
    pub kind: FailureKind,
    /// Human-readable cause.
    pub message: String,
}

impl EntryFailure {
    /// Create a failure.
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for EntryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

impl From<ResourceError> for EntryFailure {
    fn from(e: ResourceError) -> Self {
        let kind = match &e {
            ResourceError::PermissionDenied { .. } => FailureKind::Privilege,
            ResourceError::Occupied { .. } => FailureKind::Conflict,
            ResourceError::Integrity { .. } | ResourceError::NotFound { .. } => {
                FailureKind::Integrity
            }
            ResourceError::Io { .. } | ResourceError::Stranded { .. } => FailureKind::Io,
        };
        Self::new(kind, e.to_string())
    }
}

/// The result of one entry, plus any warnings raised while processing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryOutcome<R> {
    /// Which entry.
    pub key: EntryKey,
    /// What happened.
    pub result: R,
    /// Downgraded privilege problems (e.g. ownership not applied).
    pub warnings: Vec<String>,
}

/// Outcome of one entry in an `apply` pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    /// First copy and link.
    Created,
    /// Copied again, relinked, or re-recorded.
    Updated,
    /// Already linked and recorded; nothing was written.
    Unchanged,
    /// Nothing to manage.
    Skipped {
        /// Why.
        reason: String,
    },
    /// The entry could not be processed; its record is unchanged.
    Failed(EntryFailure),
}

impl SyncResult {
    /// Short label used in console output.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Skipped { .. } => "skipped",
            Self::Failed(_) => "failed",
        }
    }

    /// Whether the entry ended up managed (written or confirmed).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Unchanged)
    }

    /// Summary bucket for this result.
    #[must_use]
    pub const fn summary_status(&self) -> SummaryStatus {
        match self {
            Self::Created | Self::Updated => SummaryStatus::Ok,
            Self::Unchanged => SummaryStatus::Unchanged,
            Self::Skipped { .. } => SummaryStatus::Skipped,
            Self::Failed(_) => SummaryStatus::Failed,
        }
    }

    /// Detail shown next to the entry, if any.
    #[must_use]
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Skipped { reason } => Some(reason.clone()),
            Self::Failed(failure) => Some(failure.to_string()),
            _ => None,
        }
    }
}

/// Everything an `apply` pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// One outcome per processed entry, in processing order.
    pub outcomes: Vec<EntryOutcome<SyncResult>>,
    /// Whether the manifest was written.
    pub manifest_written: bool,
}

impl SyncReport {
    /// Number of failed entries.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, SyncResult::Failed(_)))
            .count()
    }
}

/// Drift classification of one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftState {
    /// Linked, and the managed copy matches the recorded digest.
    Clean,
    /// The managed copy no longer matches the recorded digest.
    Modified,
    /// Content matches, but mode or modification time no longer match the
    /// recorded snapshot.
    MetadataDiffers,
    /// The source path or the managed copy is gone.
    Missing,
    /// The source is a symlink, but to the wrong place or to nothing.
    BrokenLink,
    /// The source is a real object again (e.g. restored without forgetting).
    Unlinked,
    /// Configured but never applied.
    Untracked,
    /// Recorded in the manifest but no longer configured.
    Orphaned,
    /// The entry could not be inspected.
    Unreadable,
}

impl DriftState {
    /// Whether this state should make `status` exit non-zero.
    #[must_use]
    pub const fn is_drift(self) -> bool {
        !matches!(self, Self::Clean | Self::Untracked)
    }
}

impl fmt::Display for DriftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Clean => "clean",
            Self::Modified => "modified",
            Self::MetadataDiffers => "metadata-differs",
            Self::Missing => "missing",
            Self::BrokenLink => "broken-link",
            Self::Unlinked => "unlinked",
            Self::Untracked => "untracked",
            Self::Orphaned => "orphaned",
            Self::Unreadable => "unreadable",
        };
        f.pad(s)
    }
}

/// One line of a [`DriftReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftEntry {
    /// Which entry.
    pub key: EntryKey,
    /// Its classification.
    pub state: DriftState,
    /// Extra context (e.g. where a broken link points).
    pub detail: Option<String>,
}

/// Result of a read-only `status` inspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftReport {
    /// Configured entries in processing order, then orphaned records.
    pub entries: Vec<DriftEntry>,
}

impl DriftReport {
    /// Whether any entry has drifted.
    #[must_use]
    pub fn has_drift(&self) -> bool {
        self.entries.iter().any(|e| e.state.is_drift())
    }

    /// Entries in `state`.
    pub fn in_state(&self, state: DriftState) -> impl Iterator<Item = &DriftEntry> {
        self.entries.iter().filter(move |e| e.state == state)
    }
}

/// Outcome of one entry in a `restore` pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreResult {
    /// The managed copy was copied back to the source path.
    Restored {
        /// Where a foreign object at the source path was moved.
        backup: Option<PathBuf>,
    },
    /// The source path already holds identical content.
    Unchanged,
    /// Nothing to restore.
    Skipped {
        /// Why.
        reason: String,
    },
    /// The entry could not be restored.
    Failed(EntryFailure),
}

impl RestoreResult {
    /// Short label used in console output.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Restored { .. } => "restored",
            Self::Unchanged => "unchanged",
            Self::Skipped { .. } => "skipped",
            Self::Failed(_) => "failed",
        }
    }

    /// Summary bucket for this result.
    #[must_use]
    pub const fn summary_status(&self) -> SummaryStatus {
        match self {
            Self::Restored { .. } => SummaryStatus::Ok,
            Self::Unchanged => SummaryStatus::Unchanged,
            Self::Skipped { .. } => SummaryStatus::Skipped,
            Self::Failed(_) => SummaryStatus::Failed,
        }
    }

    /// Detail shown next to the entry, if any.
    #[must_use]
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Restored {
                backup: Some(backup),
            } => Some(format!("previous content kept at {}", backup.display())),
            Self::Skipped { reason } => Some(reason.clone()),
            Self::Failed(failure) => Some(failure.to_string()),
            _ => None,
        }
    }
}

/// Everything a `restore` pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// One outcome per managed entry, in processing order.
    pub outcomes: Vec<EntryOutcome<RestoreResult>>,
    /// Whether the manifest was written.
    pub manifest_written: bool,
}

impl RestoreReport {
    /// Number of failed entries.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, RestoreResult::Failed(_)))
            .count()
    }
}

/// How serious a doctor finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Worth fixing; nothing is broken yet.
    Warning,
    /// Something is broken or will fail.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// One finding of the doctor sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// How serious it is.
    pub severity: Severity,
    /// What it is about: an entry key or a path.
    pub subject: String,
    /// What is wrong.
    pub cause: String,
    /// What to do about it.
    pub guidance: Option<String>,
}

impl Issue {
    /// Create an issue without guidance.
    #[must_use]
    pub fn new(severity: Severity, subject: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            severity,
            subject: subject.into(),
            cause: cause.into(),
            guidance: None,
        }
    }

    /// Attach guidance.
    #[must_use]
    pub fn with_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.guidance = Some(guidance.into());
        self
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.subject, self.cause)?;
        if let Some(guidance) = &self.guidance {
            write!(f, " ({guidance})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn resource_errors_are_classified() {
        let denied = ResourceError::io(
            "rename",
            "/x",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert_eq!(EntryFailure::from(denied).kind, FailureKind::Privilege);

        let occupied = ResourceError::Occupied {
            path: PathBuf::from("/x"),
            reason: "a file is in the way".to_string(),
        };
        assert_eq!(EntryFailure::from(occupied).kind, FailureKind::Conflict);

        let missing = ResourceError::NotFound {
            path: PathBuf::from("/x"),
        };
        assert_eq!(EntryFailure::from(missing).kind, FailureKind::Integrity);

        let io = ResourceError::io("copy", "/x", std::io::Error::other("disk full"));
        assert_eq!(EntryFailure::from(io).kind, FailureKind::Io);

        let stranded = EntryFailure::from(ResourceError::Stranded {
            path: PathBuf::from("/home/u/.config/nvim"),
            kept: PathBuf::from("/home/u/.config/.dotbak-x1/previous"),
            source: std::io::Error::other("directory not empty"),
        });
        assert_eq!(stranded.kind, FailureKind::Io);
        assert!(stranded.message.contains("/home/u/.config/.dotbak-x1/previous"));
    }

    #[test]
    fn failure_display_includes_kind() {
        let failure = EntryFailure::new(FailureKind::Integrity, "managed copy is missing");
        assert_eq!(failure.to_string(), "integrity error: managed copy is missing");
    }

    #[test]
    fn sync_results_map_to_summary_buckets() {
        assert_eq!(SyncResult::Created.summary_status(), SummaryStatus::Ok);
        assert_eq!(SyncResult::Updated.summary_status(), SummaryStatus::Ok);
        assert_eq!(
            SyncResult::Unchanged.summary_status(),
            SummaryStatus::Unchanged
        );
        assert!(SyncResult::Unchanged.is_success());
        assert!(
            !SyncResult::Skipped {
                reason: String::new()
            }
            .is_success()
        );
    }

    #[test]
    fn untracked_is_not_drift() {
        assert!(!DriftState::Clean.is_drift());
        assert!(!DriftState::Untracked.is_drift());
        assert!(DriftState::Modified.is_drift());
        assert!(DriftState::Orphaned.is_drift());
        assert_eq!(DriftState::BrokenLink.to_string(), "broken-link");
        assert!(DriftState::MetadataDiffers.is_drift());
        assert_eq!(DriftState::MetadataDiffers.to_string(), "metadata-differs");
    }

    #[test]
    fn issue_display_with_guidance() {
        let issue = Issue::new(Severity::Error, "user_config/zsh", "destination is not writable")
            .with_guidance("re-run with elevated privileges");
        assert_eq!(
            issue.to_string(),
            "[error] user_config/zsh: destination is not writable (re-run with elevated privileges)"
        );
    }

    #[test]
    fn severity_orders_errors_last() {
        assert!(Severity::Warning < Severity::Error);
    }
}
