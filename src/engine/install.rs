//! Batch installation.
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::artifact::{Artifact, ArtifactKind};
use crate::config::merge;
use crate::error::{ErrorKind, InstallationError, Phase};
use crate::logging::ArtifactStatus;

use super::permissions::{self, RECORD_MODE, SETTINGS_MODE};
use super::record::{self, InstallRecord, RecordEntry};
use super::transaction::{Transaction, TransactionState};
use super::validate::{ValidatedBatch, ValidationWarning, validate_batch};
use super::{InstalledArtifact, Installer};

/// Options for an installation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallOptions {
    /// Validate and report, but change nothing.
    pub dry_run: bool,
    /// Replace existing commands and hooks.  When `false`, an existing
    /// destination fails the batch during validation.
    pub overwrite: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            overwrite: true,
        }
    }
}

/// Outcome of a successful [`Installer::install`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Every artifact installed (or, in a dry run, that would be).
    pub installed: Vec<InstalledArtifact>,
    /// Installation root.
    pub root: PathBuf,
    /// `true` if nothing was written.
    pub dry_run: bool,
    /// Advisory findings from validation.
    pub warnings: Vec<ValidationWarning>,
    /// Final state of the run.
    pub state: TransactionState,
}

impl InstallReport {
    /// Installed artifact names in batch order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.installed.iter().map(|a| a.name.as_str()).collect()
    }

    /// Short guidance to show after a successful run.
    #[must_use]
    pub fn next_steps(&self) -> Vec<String> {
        if self.dry_run {
            return vec!["re-run without --dry-run to apply these changes".to_string()];
        }
        let mut steps = Vec::new();
        let has = |kind: ArtifactKind| self.installed.iter().any(|a| a.kind == kind);
        if has(ArtifactKind::Command) {
            steps.push(format!(
                "commands are available from {}; restart your session to pick them up",
                self.root.join(crate::paths::COMMANDS_DIR_NAME).display()
            ));
        }
        if has(ArtifactKind::Hook) {
            steps.push("hooks run on their configured events; check settings.json".to_string());
        }
        if has(ArtifactKind::SettingsTemplate) {
            steps.push(format!(
                "review the merged settings in {}",
                self.root.join(crate::paths::SETTINGS_FILE_NAME).display()
            ));
        }
        steps.push("run `devkit verify` to check the installation".to_string());
        steps
    }
}

/// A written file and the mode it must end up with.
struct PlannedWrite {
    artifact: Option<String>,
    path: PathBuf,
    mode: u32,
}

impl Installer<'_> {
    /// Install `artifacts` as a single all-or-nothing unit.
    ///
    /// On success every artifact is at its destination with its kind's mode
    /// and the backup store is gone.  On failure after validation, every
    /// implicated path is byte-identical to its state before the call.
    ///
    /// # Errors
    ///
    /// Returns an [`InstallationError`] whose `phase` says where the run
    /// stopped.  [`InstallationError::is_unrecoverable`] is `true` only if
    /// the rollback itself failed.
    pub fn install(&self, artifacts: &[Artifact]) -> Result<InstallReport, InstallationError> {
        let mut tx = Transaction::new(self.target, self.fs, self.log);
        tx.advance(TransactionState::Validating);

        self.log.stage("Validating artifacts");
        let batch = match self.validate(artifacts) {
            Ok(batch) => batch,
            Err(err) => {
                self.log.error(&err.message);
                if let Some(name) = &err.artifact {
                    self.log
                        .record_artifact(name, ArtifactStatus::Failed, Some(&err.message));
                }
                return Err(tx.abort(err));
            }
        };
        for warning in &batch.warnings {
            self.log.warn(&warning.message);
        }

        let installed = self.destinations(&batch);
        if batch.artifacts.is_empty() || self.options.dry_run {
            for item in &installed {
                self.log.dry_run(&format!(
                    "would install {} '{}' to {}",
                    item.kind,
                    item.name,
                    item.path.display()
                ));
                self.log.record_artifact(
                    &item.name,
                    ArtifactStatus::DryRun,
                    Some(&item.path.display().to_string()),
                );
            }
            tx.advance(TransactionState::Committed);
            return Ok(self.report(
                installed,
                batch.warnings,
                tx.state(),
                self.options.dry_run,
            ));
        }

        self.log.stage("Backing up");
        let (paths, dirs) = self.implicated(&batch);
        if let Err(err) = tx.capture(&paths, &dirs) {
            self.log.error(&err.message);
            return Err(err);
        }

        tx.advance(TransactionState::Writing);
        self.log.stage("Writing artifacts");
        let planned = match self.write_all(&batch) {
            Ok(planned) => planned,
            Err(err) => return Err(self.fail(&mut tx, &batch, err)),
        };

        tx.advance(TransactionState::Finalizing);
        self.log.stage("Setting permissions");
        if let Err(err) = self.apply_modes(&planned) {
            return Err(self.fail(&mut tx, &batch, err));
        }

        tx.commit();
        for item in &installed {
            self.log.info(&format!("installed {} {}", item.kind, item.path.display()));
            self.log.record_artifact(
                &item.name,
                ArtifactStatus::Installed,
                Some(&item.path.display().to_string()),
            );
        }
        Ok(self.report(installed, batch.warnings, tx.state(), false))
    }

    fn validate(&self, artifacts: &[Artifact]) -> Result<ValidatedBatch, InstallationError> {
        let batch = validate_batch(artifacts)?;
        if !self.options.overwrite {
            for artifact in batch.files() {
                let dest = self.target.destination(artifact.kind, &artifact.name);
                if self.fs.exists(&dest) {
                    return Err(InstallationError::new(
                        ErrorKind::ArtifactConflict,
                        Phase::Validation,
                        format!(
                            "{} '{}' already exists at {}",
                            artifact.kind,
                            artifact.name,
                            dest.display()
                        ),
                    )
                    .with_artifact(&artifact.name)
                    .with_steps([
                        "re-run without --no-overwrite to replace it".to_string(),
                        format!("or remove {} and retry", dest.display()),
                        "nothing was changed on disk".to_string(),
                    ]));
                }
            }
        }
        Ok(batch)
    }

    fn destinations(&self, batch: &ValidatedBatch) -> Vec<InstalledArtifact> {
        batch
            .artifacts
            .iter()
            .map(|a| InstalledArtifact {
                name: a.name.clone(),
                kind: a.kind,
                path: self.target.destination(a.kind, &a.name),
            })
            .collect()
    }

    /// Every path the batch may write, and the directories it may create.
    fn implicated(&self, batch: &ValidatedBatch) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let mut paths: Vec<PathBuf> = batch
            .files()
            .map(|a| self.target.destination(a.kind, &a.name))
            .collect();
        if batch.has_settings() {
            paths.push(self.target.settings_file().to_path_buf());
        }
        paths.push(self.target.record_file());

        let mut dirs = vec![self.target.root().to_path_buf()];
        for kind in [ArtifactKind::Command, ArtifactKind::Hook] {
            if batch.files().any(|a| a.kind == kind) {
                dirs.push(self.kind_dir(kind).to_path_buf());
            }
        }
        (paths, dirs)
    }

    fn kind_dir(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Command => self.target.commands_dir(),
            ArtifactKind::Hook => self.target.hooks_dir(),
            ArtifactKind::SettingsTemplate => self.target.root(),
        }
    }

    fn write_all(&self, batch: &ValidatedBatch) -> Result<Vec<PlannedWrite>, InstallationError> {
        let installed_at = chrono::Utc::now().to_rfc3339();
        let mut record = self.load_record();
        record.version = crate::VERSION.to_string();
        let mut planned = Vec::new();

        for artifact in batch.files() {
            let dir = self.kind_dir(artifact.kind);
            self.fs
                .create_dir_all(dir)
                .map_err(|e| InstallationError::write_failed(dir, e).with_artifact(&artifact.name))?;

            let path = self.target.destination(artifact.kind, &artifact.name);
            self.log.debug(&format!("writing {}", path.display()));
            self.fs
                .write(&path, &artifact.content)
                .map_err(|e| InstallationError::write_failed(&path, e).with_artifact(&artifact.name))?;

            record.upsert(RecordEntry {
                name: artifact.name.clone(),
                kind: artifact.kind,
                sha256: record::digest(&artifact.content),
                installed_at: installed_at.clone(),
            });
            planned.push(PlannedWrite {
                artifact: Some(artifact.name.clone()),
                path,
                mode: permissions::mode_for(artifact.kind),
            });
        }

        if batch.has_settings() {
            let path = self.target.settings_file().to_path_buf();
            let merged = self.merged_settings(batch)?;
            self.log.debug(&format!("writing merged settings to {}", path.display()));
            self.fs
                .write(&path, &merged)
                .map_err(|e| InstallationError::write_failed(&path, e))?;

            let sha256 = record::digest(&merged);
            for template in batch
                .artifacts
                .iter()
                .filter(|a| a.kind == ArtifactKind::SettingsTemplate)
            {
                record.upsert(RecordEntry {
                    name: template.name.clone(),
                    kind: template.kind,
                    sha256: sha256.clone(),
                    installed_at: installed_at.clone(),
                });
            }
            planned.push(PlannedWrite {
                artifact: None,
                path,
                mode: SETTINGS_MODE,
            });
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
            .map_err(|e| InstallationError::write_failed(&record_path, e))?;
        planned.push(PlannedWrite {
            artifact: None,
            path: record_path,
            mode: RECORD_MODE,
        });

        Ok(planned)
    }

    /// Existing settings with every template merged over them, serialized.
    ///
    /// Only templates are stripped of comment keys.  The user's file is kept
    /// as found, comment keys included.
    fn merged_settings(&self, batch: &ValidatedBatch) -> Result<Vec<u8>, InstallationError> {
        let path = self.target.settings_file();
        let existing = self
            .fs
            .read(path)
            .map_err(|e| InstallationError::write_failed(path, e))?;
        let base = match existing {
            None => Map::new(),
            Some(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Map::new(),
            Some(bytes) => parse_existing_settings(path, &bytes)?,
        };

        let merged = merge::merge_all(&base, batch.templates());
        let mut out = serde_json::to_vec_pretty(&Value::Object(merged)).map_err(|e| {
            InstallationError::new(
                ErrorKind::WriteFailure,
                Phase::Write,
                format!("cannot serialize merged settings: {e}"),
            )
            .with_source(e)
        })?;
        out.push(b'\n');
        Ok(out)
    }

    fn load_record(&self) -> InstallRecord {
        let path = self.target.record_file();
        record::load(self.fs, &path).unwrap_or_else(|e| {
            self.log.warn(&format!(
                "{e}; starting a new record at {}",
                path.display()
            ));
            InstallRecord::default()
        })
    }

    fn apply_modes(&self, planned: &[PlannedWrite]) -> Result<(), InstallationError> {
        for item in planned {
            self.log
                .debug(&format!("chmod {:o} {}", item.mode, item.path.display()));
            permissions::apply(self.fs, &item.path, item.mode).map_err(|e| {
                match &item.artifact {
                    Some(name) => e.with_artifact(name),
                    None => e,
                }
            })?;
        }
        Ok(())
    }

    fn fail(
        &self,
        tx: &mut Transaction<'_>,
        batch: &ValidatedBatch,
        err: InstallationError,
    ) -> InstallationError {
        self.log.error(&err.message);
        let err = tx.roll_back(err);
        for artifact in &batch.artifacts {
            let status = if err.artifact.as_deref() == Some(artifact.name.as_str()) {
                ArtifactStatus::Failed
            } else {
                ArtifactStatus::RolledBack
            };
            self.log.record_artifact(&artifact.name, status, None);
        }
        err
    }

    fn report(
        &self,
        installed: Vec<InstalledArtifact>,
        warnings: Vec<ValidationWarning>,
        state: TransactionState,
        dry_run: bool,
    ) -> InstallReport {
        InstallReport {
            installed,
            root: self.target.root().to_path_buf(),
            dry_run,
            warnings,
            state,
        }
    }
}

fn parse_existing_settings(path: &Path, bytes: &[u8]) -> Result<Map<String, Value>, InstallationError> {
    let malformed = |message: String| {
        InstallationError::new(ErrorKind::MalformedTemplate, Phase::Write, message).with_steps([
            format!("fix the JSON syntax of {}", path.display()),
            format!("or move {} aside and re-run to start fresh", path.display()),
            "all changes from this run were rolled back".to_string(),
        ])
    };
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(malformed(format!(
            "existing settings in {} are not a JSON object",
            path.display()
        ))),
        Err(e) => Err(malformed(format!(
            "existing settings in {} are not valid JSON: {e}",
            path.display()
        ))
        .with_source(e)),
    }
}
