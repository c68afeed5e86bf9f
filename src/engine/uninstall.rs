//! Transactional removal of recorded artifacts.
use std::path::PathBuf;

use crate::artifact::ArtifactKind;
use crate::error::{ErrorKind, InstallationError, Phase};
use crate::logging::ArtifactStatus;

use super::permissions::{self, RECORD_MODE};
use super::record::InstallRecord;
use super::transaction::{Transaction, TransactionState};
use super::{InstalledArtifact, Installer};

/// Outcome of a successful [`Installer::uninstall`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallReport {
    /// Every artifact removed (or, in a dry run, that would be).
    pub removed: Vec<InstalledArtifact>,
    /// `true` if nothing was changed.
    pub dry_run: bool,
}

impl Installer<'_> {
    /// Remove the named artifacts, using the install record to find them.
    ///
    /// A name recorded as both a command and a hook removes both.  Settings
    /// templates cannot be removed: the merged settings belong to the user.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArtifact`] for unknown names or settings
    /// templates, [`ErrorKind::InvalidConfiguration`] for an unreadable
    /// record, and the usual write or restore errors once mutation starts.
    pub fn uninstall(&self, names: &[String]) -> Result<UninstallReport, InstallationError> {
        let mut tx = Transaction::new(self.target, self.fs, self.log);
        tx.advance(TransactionState::Validating);
        self.log.stage("Resolving artifacts");

        let (record, removed) = match self.resolve_removals(names) {
            Ok(found) => found,
            Err(err) => {
                self.log.error(&err.message);
                return Err(tx.abort(err));
            }
        };

        if removed.is_empty() || self.options.dry_run {
            for item in &removed {
                self.log.dry_run(&format!(
                    "would remove {} '{}' from {}",
                    item.kind,
                    item.name,
                    item.path.display()
                ));
                self.log
                    .record_artifact(&item.name, ArtifactStatus::DryRun, None);
            }
            tx.advance(TransactionState::Committed);
            return Ok(UninstallReport {
                removed,
                dry_run: self.options.dry_run,
            });
        }

        self.log.stage("Backing up");
        let mut paths: Vec<PathBuf> = removed.iter().map(|a| a.path.clone()).collect();
        paths.push(self.target.record_file());
        if let Err(err) = tx.capture(&paths, &[]) {
            self.log.error(&err.message);
            return Err(err);
        }

        tx.advance(TransactionState::Writing);
        self.log.stage("Removing artifacts");
        if let Err(err) = self.remove_all(&removed, &record) {
            self.log.error(&err.message);
            let err = tx.roll_back(err);
            for item in &removed {
                self.log
                    .record_artifact(&item.name, ArtifactStatus::RolledBack, None);
            }
            return Err(err);
        }

        tx.advance(TransactionState::Finalizing);
        let record_path = self.target.record_file();
        if let Err(err) = permissions::apply(self.fs, &record_path, RECORD_MODE) {
            self.log.error(&err.message);
            return Err(tx.roll_back(err));
        }

        tx.commit();
        for item in &removed {
            self.log.info(&format!("removed {}", item.path.display()));
            self.log.record_artifact(
                &item.name,
                ArtifactStatus::Removed,
                Some(&item.path.display().to_string()),
            );
        }
        Ok(UninstallReport {
            removed,
            dry_run: false,
        })
    }

    /// Look every name up in the record; returns the record with those
    /// entries removed and the files to delete.
    fn resolve_removals(
        &self,
        names: &[String],
    ) -> Result<(InstallRecord, Vec<InstalledArtifact>), InstallationError> {
        let mut record = self.read_record()?;

        let mut removed: Vec<InstalledArtifact> = Vec::new();
        for name in names {
            if removed.iter().any(|a| &a.name == name) {
                continue;
            }
            let kinds: Vec<ArtifactKind> = record.named(name).map(|e| e.kind).collect();
            if kinds.is_empty() {
                return Err(InstallationError::invalid_artifact(
                    name,
                    format!("'{name}' is not recorded as installed"),
                )
                .with_steps([
                    "run `devkit verify` to list installed artifacts".to_string(),
                    "nothing was changed on disk".to_string(),
                ]));
            }
            if kinds.contains(&ArtifactKind::SettingsTemplate) {
                return Err(InstallationError::invalid_artifact(
                    name,
                    format!("'{name}' is a settings template; merged settings are not removed"),
                )
                .with_steps([
                    format!(
                        "edit {} by hand to undo the template",
                        self.target.settings_file().display()
                    ),
                    "nothing was changed on disk".to_string(),
                ]));
            }
            for kind in kinds {
                record.remove(kind, name);
                removed.push(InstalledArtifact {
                    name: name.clone(),
                    kind,
                    path: self.target.destination(kind, name),
                });
            }
        }
        record.version = crate::VERSION.to_string();
        Ok((record, removed))
    }

    fn remove_all(
        &self,
        removed: &[InstalledArtifact],
        record: &InstallRecord,
    ) -> Result<(), InstallationError> {
        for item in removed {
            if !self.fs.exists(&item.path) {
                self.log
                    .warn(&format!("{} is already gone", item.path.display()));
                continue;
            }
            self.log.debug(&format!("removing {}", item.path.display()));
            self.fs
                .remove_file(&item.path)
                .map_err(|e| InstallationError::write_failed(&item.path, e).with_artifact(&item.name))?;
        }

        let record_path = self.target.record_file();
        let bytes = record.to_bytes().map_err(|e| {
            InstallationError::new(
                ErrorKind::WriteFailure,
                Phase::Write,
                format!("cannot serialize install record: {e}"),
            )
            .with_source(e)
        })?;
        self.fs
            .write(&record_path, &bytes)
            .map_err(|e| InstallationError::write_failed(&record_path, e))
    }
}
