//! The run state machine shared by install and uninstall.
//!
//! ```text
//! Idle → Validating → BackedUp → Writing → Finalizing → Committed
//!            │            │          │          │
//!            └────────────┴──────────┴──────────┴──→ RolledBack
//! ```
//!
//! `Validating → Committed` is taken only when nothing needs to change
//! (empty batch or dry run).
use std::fmt;
use std::path::PathBuf;

use crate::error::{ErrorKind, InstallationError, Phase};
use crate::logging::Log;
use crate::operations::FileSystemOps;
use crate::paths::InstallationTarget;

use super::backup::{BackupManager, BackupSnapshot};

/// State of an installation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// Not started.
    Idle,
    /// Checking the whole batch; nothing touched yet.
    Validating,
    /// Every implicated path is captured.
    BackedUp,
    /// Writing content.
    Writing,
    /// Applying mode bits.
    Finalizing,
    /// All changes kept, snapshot discarded.
    Committed,
    /// All changes undone (or nothing was changed).
    RolledBack,
}

impl TransactionState {
    /// Returns `true` if the state machine permits `self → next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Validating)
                | (Self::Validating, Self::BackedUp | Self::Committed)
                | (Self::BackedUp, Self::Writing)
                | (Self::Writing, Self::Finalizing)
                | (Self::Finalizing, Self::Committed)
                | (
                    Self::Validating | Self::BackedUp | Self::Writing | Self::Finalizing,
                    Self::RolledBack
                )
        )
    }

    /// Returns `true` for `Committed` and `RolledBack`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::BackedUp => "backed-up",
            Self::Writing => "writing",
            Self::Finalizing => "finalizing",
            Self::Committed => "committed",
            Self::RolledBack => "rolled-back",
        };
        f.write_str(name)
    }
}

/// One run: tracks the state and owns the snapshot once captured.
pub(crate) struct Transaction<'a> {
    log: &'a dyn Log,
    backup: BackupManager<'a>,
    state: TransactionState,
    history: Vec<TransactionState>,
    snapshot: Option<BackupSnapshot>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(
        target: &InstallationTarget,
        fs: &'a dyn FileSystemOps,
        log: &'a dyn Log,
    ) -> Self {
        Self {
            log,
            backup: BackupManager::new(fs, target.backup_dir()),
            state: TransactionState::Idle,
            history: vec![TransactionState::Idle],
            snapshot: None,
        }
    }

    pub(crate) const fn state(&self) -> TransactionState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn history(&self) -> &[TransactionState] {
        &self.history
    }

    pub(crate) fn advance(&mut self, next: TransactionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {next}",
            self.state
        );
        self.log.debug(&format!("transaction: {} -> {next}", self.state));
        self.state = next;
        self.history.push(next);
    }

    /// Fail before anything was captured: nothing to undo.
    pub(crate) fn abort(&mut self, err: InstallationError) -> InstallationError {
        self.advance(TransactionState::RolledBack);
        err
    }

    /// Capture `paths`, noting which of `dirs` the run will create.
    pub(crate) fn capture(
        &mut self,
        paths: &[PathBuf],
        dirs: &[PathBuf],
    ) -> Result<(), InstallationError> {
        match self.backup.snapshot(paths, dirs) {
            Ok(snapshot) => {
                self.log.debug(&format!(
                    "captured {} path(s) in {}",
                    paths.len(),
                    snapshot.store().display()
                ));
                self.snapshot = Some(snapshot);
                self.advance(TransactionState::BackedUp);
                Ok(())
            }
            Err(e) => {
                let err = InstallationError::new(
                    ErrorKind::BackupFailure,
                    Phase::Backup,
                    format!("cannot snapshot the target before writing: {e}"),
                )
                .with_source(e);
                Err(self.abort(err))
            }
        }
    }

    /// Undo everything since [`capture`](Self::capture) and return the error
    /// to surface: `err` itself, or a `RestoreFailure` wrapping it.
    pub(crate) fn roll_back(&mut self, err: InstallationError) -> InstallationError {
        self.log
            .rollback(&format!("{} failed, rolling back: {}", err.phase, err.message));
        let Some(snapshot) = self.snapshot.take() else {
            return self.abort(err);
        };

        let result = match self.backup.restore(&snapshot) {
            Ok(()) => {
                if let Err(e) = self.backup.discard(&snapshot) {
                    self.log
                        .warn(&format!("rolled back, but the backup store remains: {e}"));
                }
                self.log.info("all changes from this run were rolled back");
                err
            }
            Err(e) => {
                let fatal = InstallationError::restore_failed(err, snapshot.store(), e);
                self.log.restore_failed(&fatal.message);
                fatal
            }
        };
        self.advance(TransactionState::RolledBack);
        result
    }

    /// Keep every change and drop the snapshot.
    pub(crate) fn commit(&mut self) {
        if let Some(snapshot) = self.snapshot.take()
            && let Err(e) = self.backup.discard(&snapshot)
        {
            self.log
                .warn(&format!("installed, but the backup store could not be removed: {e}"));
        }
        self.advance(TransactionState::Committed);
    }
}
