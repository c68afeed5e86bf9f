//! Core logging types: artifact entries, status, and the [`Log`] trait.

/// Per-artifact result for summary reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    /// Artifact name.
    pub name: String,
    /// Final status of the artifact.
    pub status: ArtifactStatus,
    /// Optional detail (destination path, failure reason).
    pub message: Option<String>,
}

/// Outcome of one artifact within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    /// Written and committed.
    Installed,
    /// Deleted by an uninstall run.
    Removed,
    /// Dry run; would have been installed.
    DryRun,
    /// Written, then undone because the batch failed.
    RolledBack,
    /// Rejected or failed; nothing was changed for it.
    Failed,
}

impl std::fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Installed => "installed",
            Self::Removed => "removed",
            Self::DryRun => "dry run",
            Self::RolledBack => "rolled back",
            Self::Failed => "failed",
        })
    }
}

/// Abstraction over logging backends.
///
/// [`Logger`](super::logger::Logger) writes through `tracing`; tests use an
/// in-memory recorder.  Engine code receives a `&dyn Log` and never knows
/// which one it has.
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
    /// Log a dry-run action message.
    fn dry_run(&self, msg: &str);
    /// Record an artifact result for the summary.
    fn record_artifact(&self, name: &str, status: ArtifactStatus, message: Option<&str>);

    /// Log a rollback step.  Warning level.
    fn rollback(&self, msg: &str) {
        self.warn(msg);
    }

    /// Log that restoring the pre-run state failed.  Error level.
    fn restore_failed(&self, msg: &str) {
        self.error(msg);
    }
}
