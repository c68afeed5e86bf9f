//! Structured logger with dry-run awareness and summary collection.
use std::path::PathBuf;
use std::sync::Mutex;

use super::subscriber::target;
use super::types::{ArtifactEntry, ArtifactStatus, Log};
use super::utils::log_file_path;

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Structured logger with dry-run awareness and summary collection.
///
/// All messages are also written to a persistent log file at
/// `$XDG_CACHE_HOME/devkit/<command>.log` (default `~/.cache/devkit/<command>.log`)
/// by the [`FileLayer`](super::subscriber::FileLayer), regardless of the
/// verbose flag.
#[derive(Debug)]
pub struct Logger {
    artifacts: Mutex<Vec<ArtifactEntry>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a new logger.
    ///
    /// Stores the log file path for display in the run summary.  The file
    /// itself is created by [`init_subscriber`](super::subscriber::init_subscriber).
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            artifacts: Mutex::new(Vec::new()),
            log_file: log_file_path(command),
        }
    }

    /// Return the log file path, if available.
    #[must_use]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Return a clone of all recorded artifact entries.
    #[must_use]
    pub fn entries(&self) -> Vec<ArtifactEntry> {
        self.artifacts.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: target::STAGE, "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log a dry-run action message.
    pub fn dry_run(&self, msg: &str) {
        tracing::info!(target: target::DRY_RUN, "{msg}");
    }

    /// Log a rollback step.
    pub fn rollback(&self, msg: &str) {
        tracing::warn!(target: target::ROLLBACK, "{msg}");
    }

    /// Log a failure to restore the pre-run state.
    pub fn restore_failed(&self, msg: &str) {
        tracing::error!(target: target::ROLLBACK, "{msg}");
    }

    /// Record an artifact result for the summary.
    ///
    /// The outcome is also emitted as an event; a rolled-back artifact is
    /// logged at warning level, everything else at debug.
    pub fn record_artifact(&self, name: &str, status: ArtifactStatus, message: Option<&str>) {
        let detail = message.unwrap_or_default();
        if status == ArtifactStatus::RolledBack {
            tracing::warn!(target: target::ARTIFACT, artifact = name, status = %status, "{detail}");
        } else {
            tracing::debug!(target: target::ARTIFACT, artifact = name, status = %status, "{detail}");
        }
        if let Ok(mut guard) = self.artifacts.lock() {
            guard.push(ArtifactEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// Count the artifacts recorded as failed or rolled back.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.artifacts.lock().map_or(0, |guard| {
            guard
                .iter()
                .filter(|a| {
                    matches!(a.status, ArtifactStatus::Failed | ArtifactStatus::RolledBack)
                })
                .count()
        })
    }

    /// Print the summary of all recorded artifacts.
    pub fn print_summary(&self) {
        let entries = self.entries();
        if entries.is_empty() {
            return;
        }

        println!();
        self.stage("Summary");

        let mut installed = 0u32;
        let mut removed = 0u32;
        let mut dry_run = 0u32;
        let mut rolled_back = 0u32;
        let mut failed = 0u32;

        for entry in &entries {
            let (icon, color) = match entry.status {
                ArtifactStatus::Installed => {
                    installed += 1;
                    ("✓", "\x1b[32m")
                }
                ArtifactStatus::Removed => {
                    removed += 1;
                    ("-", "\x1b[36m")
                }
                ArtifactStatus::DryRun => {
                    dry_run += 1;
                    ("~", "\x1b[37m")
                }
                ArtifactStatus::RolledBack => {
                    rolled_back += 1;
                    ("↺", "\x1b[33m")
                }
                ArtifactStatus::Failed => {
                    failed += 1;
                    ("✗", "\x1b[31m")
                }
            };

            let suffix = entry
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));

            self.info(&format!("{color}{icon} {}{suffix}\x1b[0m", entry.name));
        }

        println!();
        let total = installed + removed + dry_run + rolled_back + failed;
        self.info(&format!(
            "{total} artifacts: \x1b[32m{installed} installed\x1b[0m, \x1b[36m{removed} removed\x1b[0m, \x1b[37m{dry_run} dry-run\x1b[0m, \x1b[33m{rolled_back} rolled back\x1b[0m, \x1b[31m{failed} failed\x1b[0m"
        ));

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error, dry_run, rollback, restore_failed);

    fn record_artifact(&self, name: &str, status: ArtifactStatus, message: Option<&str>) {
        self.record_artifact(name, status, message);
    }
}
