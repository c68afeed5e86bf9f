//! Read-only health check of an installation.
use std::fmt;
use std::path::PathBuf;

use crate::artifact::ArtifactKind;
use crate::error::InstallationError;

use super::Installer;
use super::permissions::mode_for;
use super::record::{self, RecordEntry};

/// State of one recorded artifact on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactHealth {
    /// Present, unchanged, correct mode.
    Ok,
    /// Recorded but not on disk.
    Missing,
    /// Content differs from what was installed (settings: no longer a JSON
    /// object).
    Modified,
    /// Content intact but mode bits differ.
    WrongMode {
        /// Mode the installer applies.
        expected: u32,
        /// Mode found on disk.
        actual: u32,
    },
}

impl fmt::Display for ArtifactHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Missing => f.write_str("missing"),
            Self::Modified => f.write_str("modified"),
            Self::WrongMode { expected, actual } => {
                write!(f, "mode {actual:o}, expected {expected:o}")
            }
        }
    }
}

/// Result of checking one recorded artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactCheck {
    /// Artifact name.
    pub name: String,
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Path inspected.
    pub path: PathBuf,
    /// What was found.
    pub health: ArtifactHealth,
}

/// Outcome of [`Installer::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// One check per recorded artifact, in record order.
    pub checks: Vec<ArtifactCheck>,
    /// The installation root exists and its owner may write to it.
    pub root_writable: bool,
    /// A backup store was left behind by an interrupted or failed run.
    pub stale_backup: bool,
    /// An install record exists.
    pub record_found: bool,
}

impl VerifyReport {
    /// `true` when every artifact is intact and no backup store remains.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        !self.stale_backup
            && (!self.record_found || self.root_writable)
            && self.checks.iter().all(|c| c.health == ArtifactHealth::Ok)
    }

    /// Checks that are not [`ArtifactHealth::Ok`].
    pub fn problems(&self) -> impl Iterator<Item = &ArtifactCheck> {
        self.checks.iter().filter(|c| c.health != ArtifactHealth::Ok)
    }
}

impl Installer<'_> {
    /// Compare what the install record says against what is on disk.
    ///
    /// Never writes.  A missing record yields an empty, healthy report.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidConfiguration`](crate::error::ErrorKind::InvalidConfiguration)
    /// if the record exists but cannot be read.
    pub fn verify(&self) -> Result<VerifyReport, InstallationError> {
        self.log.stage("Verifying installation");
        let record_found = self.fs.exists(&self.target.record_file());
        let record = self.read_record()?;

        let checks: Vec<ArtifactCheck> = record.artifacts.iter().map(|e| self.check(e)).collect();
        for check in &checks {
            if check.health == ArtifactHealth::Ok {
                self.log
                    .debug(&format!("{} '{}': ok", check.kind, check.name));
            } else {
                self.log.warn(&format!(
                    "{} '{}' at {}: {}",
                    check.kind,
                    check.name,
                    check.path.display(),
                    check.health
                ));
            }
        }

        let root = self.target.root();
        let root_writable = self.fs.is_dir(root)
            && match self.fs.mode(root) {
                Ok(Some(mode)) => mode & 0o200 != 0,
                Ok(None) => true,
                Err(_) => false,
            };
        if record_found && !root_writable {
            self.log
                .warn(&format!("{} is not writable", root.display()));
        }

        let stale_backup = self.fs.exists(&self.target.backup_dir());
        if stale_backup {
            self.log.warn(&format!(
                "backup store {} remains from an earlier run",
                self.target.backup_dir().display()
            ));
        }

        Ok(VerifyReport {
            checks,
            root_writable,
            stale_backup,
            record_found,
        })
    }

    fn check(&self, entry: &RecordEntry) -> ArtifactCheck {
        let path = self.target.destination(entry.kind, &entry.name);
        let health = self.health(entry, &path);
        ArtifactCheck {
            name: entry.name.clone(),
            kind: entry.kind,
            path,
            health,
        }
    }

    fn health(&self, entry: &RecordEntry, path: &std::path::Path) -> ArtifactHealth {
        let Ok(Some(bytes)) = self.fs.read(path) else {
            return ArtifactHealth::Missing;
        };

        // Settings are shared with the user, so only their shape is checked.
        let intact = match entry.kind {
            ArtifactKind::SettingsTemplate => {
                serde_json::from_slice::<serde_json::Value>(&bytes).is_ok_and(|v| v.is_object())
            }
            ArtifactKind::Command | ArtifactKind::Hook => record::digest(&bytes) == entry.sha256,
        };
        if !intact {
            return ArtifactHealth::Modified;
        }

        let expected = mode_for(entry.kind);
        match self.fs.mode(path) {
            Ok(Some(actual)) if actual != expected => ArtifactHealth::WrongMode { expected, actual },
            _ => ArtifactHealth::Ok,
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::artifact::Artifact;
    use crate::error::ErrorKind;
    use crate::logging::RecordingLog;
    use crate::operations::SystemFileSystemOps;
    use crate::paths::InstallationTarget;

    fn installed() -> (tempfile::TempDir, InstallationTarget) {
        let tmp = tempfile::tempdir().unwrap();
        let target = InstallationTarget::resolve(tmp.path()).unwrap();
        let log = RecordingLog::default();
        Installer::new(&target, &SystemFileSystemOps, &log)
            .install(&[
                Artifact::command("xtest", "# x"),
                Artifact::hook("guard.sh", "#!/bin/sh\n"),
                Artifact::settings_template("base", r#"{"a": 1}"#),
            ])
            .unwrap();
        (tmp, target)
    }

    fn verify(target: &InstallationTarget) -> (VerifyReport, RecordingLog) {
        let log = RecordingLog::default();
        let report = Installer::new(target, &SystemFileSystemOps, &log)
            .verify()
            .unwrap();
        (report, log)
    }

    #[test]
    fn fresh_install_is_healthy() {
        let (_tmp, target) = installed();
        let (report, log) = verify(&target);
        assert!(report.record_found);
        assert_eq!(report.checks.len(), 3);
        assert!(report.is_healthy(), "{report:?}");
        assert!(log.messages("warn").is_empty());
    }

    #[test]
    fn nothing_installed_is_healthy() {
        let tmp = tempfile::tempdir().unwrap();
        let target = InstallationTarget::resolve(tmp.path()).unwrap();
        let (report, _) = verify(&target);
        assert!(!report.record_found);
        assert!(report.checks.is_empty());
        assert!(report.is_healthy());
        assert!(!target.root().exists());
    }

    #[test]
    fn detects_missing_and_modified_files() {
        let (_tmp, target) = installed();
        std::fs::remove_file(target.commands_dir().join("xtest")).unwrap();
        std::fs::write(target.hooks_dir().join("guard.sh"), "#!/bin/bash\n").unwrap();
        std::fs::write(target.settings_file(), "[1, 2]").unwrap();

        let (report, log) = verify(&target);
        let health: Vec<_> = report.checks.iter().map(|c| c.health).collect();
        assert_eq!(
            health,
            [
                ArtifactHealth::Missing,
                ArtifactHealth::Modified,
                ArtifactHealth::Modified
            ]
        );
        assert!(!report.is_healthy());
        assert_eq!(report.problems().count(), 3);
        assert_eq!(log.messages("warn").len(), 3);
    }

    #[test]
    fn user_edits_to_settings_are_fine() {
        let (_tmp, target) = installed();
        std::fs::write(target.settings_file(), r#"{"a": 1, "mine": true}"#).unwrap();
        let (report, _) = verify(&target);
        assert!(report.is_healthy());
    }

    #[cfg(unix)]
    #[test]
    fn detects_wrong_mode() {
        use std::os::unix::fs::PermissionsExt;
        let (_tmp, target) = installed();
        let hook = target.hooks_dir().join("guard.sh");
        std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o644)).unwrap();

        let (report, _) = verify(&target);
        let check = report.checks.iter().find(|c| c.name == "guard.sh").unwrap();
        assert_eq!(
            check.health,
            ArtifactHealth::WrongMode {
                expected: 0o755,
                actual: 0o644
            }
        );
        assert_eq!(check.health.to_string(), "mode 644, expected 755");
    }

    #[test]
    fn stale_backup_is_reported() {
        let (_tmp, target) = installed();
        std::fs::create_dir_all(target.backup_dir().join("20260101T000000.000000Z")).unwrap();
        let (report, _) = verify(&target);
        assert!(report.stale_backup);
        assert!(!report.is_healthy());
    }

    #[test]
    fn malformed_record_is_an_error() {
        let (_tmp, target) = installed();
        std::fs::write(target.record_file(), "{").unwrap();
        let log = RecordingLog::default();
        let err = Installer::new(&target, &SystemFileSystemOps, &log)
            .verify()
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidConfiguration);
    }
}
