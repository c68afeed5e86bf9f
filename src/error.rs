//! Structured error type for the installation engine.
//!
//! Every failure the engine reports is an [`InstallationError`]: a
//! [`thiserror`] struct that records *which* phase failed, *what kind* of
//! failure it was, the artifact involved (if any), and an ordered list of
//! concrete resolution steps.  Command handlers at the CLI boundary convert
//! it to [`anyhow::Error`] via the standard `?` operator after rendering the
//! steps for the user.
//!
//! # Taxonomy
//!
//! ```text
//! ErrorKind
//! ├── InvalidConfiguration — bad target path
//! ├── InvalidArtifact      — failed validation, nothing touched
//! ├── ArtifactConflict     — destination exists and overwrite is off
//! ├── MalformedTemplate    — settings JSON/JSONC unparsable
//! ├── BackupFailure        — snapshot could not be captured, nothing touched
//! ├── WriteFailure         — I/O error while mutating, rolled back
//! ├── PermissionFailure    — mode bits could not be applied, rolled back
//! └── RestoreFailure       — rollback itself failed (unrecoverable)
//! ```

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// Boxed error carried as the underlying cause of an [`InstallationError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The step of an installation run in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Resolving the installation target from the home directory.
    Configuration,
    /// Whole-batch validation, before anything is touched.
    Validation,
    /// Capturing the pre-install snapshot.
    Backup,
    /// Writing artifact content (and merging settings).
    Write,
    /// Applying mode bits to written files.
    Permissions,
    /// Replaying the snapshot after a failure.
    Restore,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::Validation => "validation",
            Self::Backup => "backup",
            Self::Write => "write",
            Self::Permissions => "permissions",
            Self::Restore => "restore",
        };
        f.write_str(name)
    }
}

/// Classification of an installation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The home directory or target path is unusable.
    InvalidConfiguration,
    /// An artifact failed validation.
    InvalidArtifact,
    /// An artifact's destination already exists and overwriting is disabled.
    ArtifactConflict,
    /// A settings document could not be parsed.
    MalformedTemplate,
    /// The pre-install snapshot could not be captured.
    BackupFailure,
    /// Writing or removing a file failed.
    WriteFailure,
    /// Applying file mode bits failed.
    PermissionFailure,
    /// Restoring the snapshot failed; the target may be inconsistent.
    RestoreFailure,
}

impl ErrorKind {
    /// Generic resolution steps used when a caller supplies none.
    fn default_steps(self) -> Vec<String> {
        let steps: &[&str] = match self {
            Self::InvalidConfiguration => &[
                "pass an absolute home directory with --home",
                "check that $HOME is set for the current user",
            ],
            Self::InvalidArtifact => &[
                "fix the artifact content and re-run the install",
                "nothing was changed on disk",
            ],
            Self::ArtifactConflict => &[
                "re-run without --no-overwrite to replace the existing file",
                "or remove the existing file first",
            ],
            Self::MalformedTemplate => &[
                "check the JSON syntax of the settings document",
                "validate it with a JSON linter and retry",
            ],
            Self::BackupFailure => &[
                "check that the target directory is writable",
                "free disk space and retry",
                "nothing was changed on disk",
            ],
            Self::WriteFailure => &[
                "check that the target directory is writable",
                "free disk space and retry",
                "all changes from this run were rolled back",
            ],
            Self::PermissionFailure => &[
                "check that you own the files in the target directory",
                "re-run with elevated privileges if ownership is correct",
                "all changes from this run were rolled back",
            ],
            Self::RestoreFailure => &[
                "inspect the backup store in the target directory manually",
                "do not re-run the installer until the backup store is recovered",
            ],
        };
        steps.iter().map(|s| (*s).to_string()).collect()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidConfiguration => "invalid configuration",
            Self::InvalidArtifact => "invalid artifact",
            Self::ArtifactConflict => "artifact conflict",
            Self::MalformedTemplate => "malformed template",
            Self::BackupFailure => "backup failure",
            Self::WriteFailure => "write failure",
            Self::PermissionFailure => "permission failure",
            Self::RestoreFailure => "restore failure",
        };
        f.write_str(name)
    }
}

/// A structured, actionable installation failure.
///
/// Always carries at least one resolution step.
///
/// # Examples
///
/// ```
/// use devkit_installer::error::{ErrorKind, InstallationError, Phase};
///
/// let err = InstallationError::new(ErrorKind::InvalidArtifact, Phase::Validation, "empty hook")
///     .with_artifact("pre-write.sh");
///
/// assert_eq!(err.phase, Phase::Validation);
/// assert_eq!(err.artifact.as_deref(), Some("pre-write.sh"));
/// assert!(!err.resolution_steps.is_empty());
/// ```
#[derive(Error, Debug)]
#[error("{phase} failed: {message}")]
pub struct InstallationError {
    /// Failure classification.
    pub kind: ErrorKind,
    /// Phase in which the failure occurred.
    pub phase: Phase,
    /// Name of the artifact involved, when one is.
    pub artifact: Option<String>,
    /// Human-readable description.
    pub message: String,
    /// Ordered, concrete next steps for the user.
    pub resolution_steps: Vec<String>,
    /// Underlying cause.
    #[source]
    pub source: Option<BoxError>,
}

impl InstallationError {
    /// Create an error seeded with the default resolution steps for `kind`.
    #[must_use]
    pub fn new(kind: ErrorKind, phase: Phase, message: impl Into<String>) -> Self {
        Self {
            kind,
            phase,
            artifact: None,
            message: message.into(),
            resolution_steps: kind.default_steps(),
            source: None,
        }
    }

    /// Attach the name of the artifact involved.
    #[must_use]
    pub fn with_artifact(mut self, name: impl Into<String>) -> Self {
        self.artifact = Some(name.into());
        self
    }

    /// Replace the resolution steps.
    ///
    /// An empty iterator keeps the existing steps so the error is never
    /// left without guidance.
    #[must_use]
    pub fn with_steps<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let steps: Vec<String> = steps.into_iter().map(Into::into).collect();
        if !steps.is_empty() {
            self.resolution_steps = steps;
        }
        self
    }

    /// Attach the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Bad home directory or target path.
    #[must_use]
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::InvalidConfiguration,
            Phase::Configuration,
            message,
        )
    }

    /// Artifact rejected by the validator.
    #[must_use]
    pub fn invalid_artifact(name: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArtifact, Phase::Validation, message)
            .with_artifact(name)
            .with_steps([
                format!("fix the content of artifact '{name}' and re-run the install"),
                "nothing was changed on disk".to_string(),
            ])
    }

    /// I/O failure while mutating `path`.
    #[must_use]
    pub fn write_failed(path: &Path, source: std::io::Error) -> Self {
        let parent = path.parent().unwrap_or(path);
        Self::new(
            ErrorKind::WriteFailure,
            Phase::Write,
            format!("cannot write {}: {source}", path.display()),
        )
        .with_steps([
            format!("check that {} exists and is writable", parent.display()),
            "free disk space and retry".to_string(),
            "all changes from this run were rolled back".to_string(),
        ])
        .with_source(source)
    }

    /// Mode bits could not be applied to `path`.
    #[must_use]
    pub fn permissions_failed(path: &Path, mode: u32, source: std::io::Error) -> Self {
        Self::new(
            ErrorKind::PermissionFailure,
            Phase::Permissions,
            format!("cannot set mode {mode:o} on {}: {source}", path.display()),
        )
        .with_steps([
            format!("check that you own {}", path.display()),
            "check that the filesystem supports Unix permissions".to_string(),
            "re-run with elevated privileges if ownership is correct".to_string(),
            "all changes from this run were rolled back".to_string(),
        ])
        .with_source(source)
    }

    /// Rollback failed after `original`; the snapshot store at `store` is kept.
    #[must_use]
    pub fn restore_failed(original: Self, store: &Path, source: impl Into<BoxError>) -> Self {
        let source = source.into();
        Self {
            kind: ErrorKind::RestoreFailure,
            phase: Phase::Restore,
            artifact: original.artifact.clone(),
            message: format!(
                "rollback after {} failed: {source}; the target directory may be inconsistent",
                original.phase
            ),
            resolution_steps: vec![
                format!("inspect the backup store at {}", store.display()),
                format!(
                    "copy the files listed in {} back to their original paths",
                    store.join("index.json").display()
                ),
                format!("remove {} once the files are recovered", store.display()),
                format!("original failure: {}", original.message),
            ],
            source: Some(source),
        }
    }

    /// `true` only for a failed rollback: the all-or-nothing guarantee may
    /// not hold and manual recovery is required.
    #[must_use]
    pub const fn is_unrecoverable(&self) -> bool {
        matches!(self.kind, ErrorKind::RestoreFailure)
    }

    /// Render the message and numbered resolution steps for display.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = self.to_string();
        if let Some(name) = &self.artifact {
            out.push_str(&format!(" [artifact: {name}]"));
        }
        for (i, step) in self.resolution_steps.iter().enumerate() {
            out.push_str(&format!("\n  {}. {step}", i + 1));
        }
        out
    }
}
