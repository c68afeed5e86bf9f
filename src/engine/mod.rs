//! The transactional installation engine.
//!
//! An [`Installer`] applies a batch of artifacts to an
//! [`InstallationTarget`] as one all-or-nothing unit:
//!
//! 1. **validate** the whole batch ([`validate`]); nothing is touched yet
//! 2. **back up** every path the batch may write ([`backup`])
//! 3. **write** content, merging settings templates over existing settings
//! 4. **finalize** mode bits per kind ([`permissions`])
//! 5. **commit**, discarding the snapshot, or **roll back** to it
//!
//! The same machinery drives [`Installer::uninstall`]; [`Installer::verify`]
//! is read-only.

pub mod backup;
mod install;
pub mod permissions;
pub mod record;
pub mod transaction;
mod uninstall;
pub mod validate;
mod verify;

use std::path::PathBuf;

pub use install::{InstallOptions, InstallReport};
pub use transaction::TransactionState;
pub use uninstall::UninstallReport;
pub use verify::{ArtifactCheck, ArtifactHealth, VerifyReport};

use crate::artifact::ArtifactKind;
use crate::error::{ErrorKind, InstallationError, Phase};
use crate::logging::Log;
use crate::operations::FileSystemOps;
use crate::paths::InstallationTarget;

/// An artifact placed on (or removed from) disk by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledArtifact {
    /// Artifact name.
    pub name: String,
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Resolved destination.
    pub path: PathBuf,
}

/// Runs install, uninstall, and verify against one target.
///
/// Holds only borrowed collaborators; cheap to construct per run.
pub struct Installer<'a> {
    target: &'a InstallationTarget,
    fs: &'a dyn FileSystemOps,
    log: &'a dyn Log,
    options: InstallOptions,
}

impl std::fmt::Debug for Installer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("target", &self.target)
            .field("fs", &self.fs)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<'a> Installer<'a> {
    /// Create an installer with default [`InstallOptions`].
    #[must_use]
    pub fn new(
        target: &'a InstallationTarget,
        fs: &'a dyn FileSystemOps,
        log: &'a dyn Log,
    ) -> Self {
        Self {
            target,
            fs,
            log,
            options: InstallOptions::default(),
        }
    }

    /// Replace the options.
    #[must_use]
    pub const fn with_options(mut self, options: InstallOptions) -> Self {
        self.options = options;
        self
    }

    /// The target this installer writes to.
    #[must_use]
    pub const fn target(&self) -> &InstallationTarget {
        self.target
    }

    /// Load the install record, treating an unreadable one as a
    /// configuration error.  Install is lenient instead; see `load_record`.
    fn read_record(&self) -> Result<record::InstallRecord, InstallationError> {
        let path = self.target.record_file();
        record::load(self.fs, &path).map_err(|e| {
            InstallationError::new(
                ErrorKind::InvalidConfiguration,
                Phase::Validation,
                format!("{e} ({})", path.display()),
            )
            .with_steps([
                format!(
                    "check that {} is valid JSON and every name is a plain file name",
                    path.display()
                ),
                "re-run the install to rebuild the record".to_string(),
                "nothing was changed on disk".to_string(),
            ])
            .with_source(e)
        })
    }
}
