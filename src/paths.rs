//! Installation target resolution.
//!
//! The target is a pure function of the home directory: nothing here reads
//! the environment or touches the filesystem.
use std::path::{Component, Path, PathBuf};

use crate::artifact::ArtifactKind;
use crate::error::InstallationError;

/// Name of the user-scoped configuration directory under `$HOME`.
pub const CONFIG_DIR_NAME: &str = ".claude";

/// Subdirectory holding command definitions.
pub const COMMANDS_DIR_NAME: &str = "commands";

/// Subdirectory holding hook scripts.
pub const HOOKS_DIR_NAME: &str = "hooks";

/// Merged settings file name.
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Transient snapshot store, present only while a run is in flight.
pub const BACKUP_DIR_NAME: &str = ".backup";

/// Install record file name.
pub const RECORD_FILE_NAME: &str = "installed.json";

/// Resolved installation root and its well-known paths.
///
/// Immutable for the lifetime of an installation run.
///
/// # Examples
///
/// ```
/// use devkit_installer::paths::InstallationTarget;
/// use std::path::Path;
///
/// let target = InstallationTarget::resolve(Path::new("/home/alice")).unwrap();
/// assert_eq!(target.root(), Path::new("/home/alice/.claude"));
/// assert_eq!(target.settings_file(), Path::new("/home/alice/.claude/settings.json"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationTarget {
    root: PathBuf,
    commands_dir: PathBuf,
    hooks_dir: PathBuf,
    settings_file: PathBuf,
}

impl InstallationTarget {
    /// Resolve the target from a home directory.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidConfiguration`](crate::error::ErrorKind::InvalidConfiguration)
    /// if `home` is empty, relative, contains a NUL byte, or contains `..`
    /// components.
    pub fn resolve(home: &Path) -> Result<Self, InstallationError> {
        if home.as_os_str().is_empty() {
            return Err(InstallationError::invalid_configuration(
                "home directory is empty",
            ));
        }
        if home.as_os_str().as_encoded_bytes().contains(&0) {
            return Err(InstallationError::invalid_configuration(format!(
                "home directory contains a NUL byte: {}",
                home.display()
            )));
        }
        if !home.is_absolute() {
            return Err(InstallationError::invalid_configuration(format!(
                "home directory must be absolute: {}",
                home.display()
            ))
            .with_steps([
                format!(
                    "pass an absolute path with --home (got '{}')",
                    home.display()
                ),
                "check that $HOME is set to an absolute path".to_string(),
            ]));
        }
        if home.components().any(|c| c == Component::ParentDir) {
            return Err(InstallationError::invalid_configuration(format!(
                "home directory must not contain '..': {}",
                home.display()
            )));
        }

        let root = home.join(CONFIG_DIR_NAME);
        Ok(Self {
            commands_dir: root.join(COMMANDS_DIR_NAME),
            hooks_dir: root.join(HOOKS_DIR_NAME),
            settings_file: root.join(SETTINGS_FILE_NAME),
            root,
        })
    }

    /// Installation root (`<home>/.claude`).
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/commands`.
    #[must_use]
    pub fn commands_dir(&self) -> &Path {
        &self.commands_dir
    }

    /// `<root>/hooks`.
    #[must_use]
    pub fn hooks_dir(&self) -> &Path {
        &self.hooks_dir
    }

    /// `<root>/settings.json`.
    #[must_use]
    pub fn settings_file(&self) -> &Path {
        &self.settings_file
    }

    /// `<root>/.backup`.
    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.root.join(BACKUP_DIR_NAME)
    }

    /// `<root>/installed.json`.
    #[must_use]
    pub fn record_file(&self) -> PathBuf {
        self.root.join(RECORD_FILE_NAME)
    }

    /// Destination of an artifact of `kind` named `name`.
    ///
    /// Settings templates all land on the single settings file.
    #[must_use]
    pub fn destination(&self, kind: ArtifactKind, name: &str) -> PathBuf {
        match kind {
            ArtifactKind::Command => self.commands_dir.join(name),
            ArtifactKind::Hook => self.hooks_dir.join(name),
            ArtifactKind::SettingsTemplate => self.settings_file.clone(),
        }
    }
}
