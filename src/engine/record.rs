//! The install record (`<root>/installed.json`).
//!
//! Lists what the installer put on disk so uninstall and verify can work
//! from names alone.  It is written inside the same transaction as the
//! artifacts it describes.
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use thiserror::Error;

use crate::artifact::ArtifactKind;
use crate::operations::FileSystemOps;

use super::validate::name_problem;

/// Errors from [`load`].
#[derive(Error, Debug)]
pub enum RecordError {
    /// The record exists but could not be read.
    #[error("cannot read install record: {0}")]
    Io(#[from] io::Error),
    /// The record is not a valid document.
    #[error("install record is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    /// An entry names a path outside its kind's directory.
    #[error("install record lists {kind} '{name}': {reason}")]
    UnsafeName {
        /// Offending entry name.
        name: String,
        /// Entry kind.
        kind: ArtifactKind,
        /// Which naming rule it breaks.
        reason: &'static str,
    },
}

/// One installed artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEntry {
    /// Artifact name.
    pub name: String,
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Hex SHA-256 of the bytes written.
    pub sha256: String,
    /// RFC 3339 install time.
    pub installed_at: String,
}

/// Contents of `installed.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    /// Version of the installer that last wrote the record.
    #[serde(default)]
    pub version: String,
    /// Installed artifacts, in install order.
    #[serde(default)]
    pub artifacts: Vec<RecordEntry>,
}

impl InstallRecord {
    /// Parse a record.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not a valid record document.
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Serialize the record as pretty JSON with a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut out = serde_json::to_vec_pretty(self)?;
        out.push(b'\n');
        Ok(out)
    }

    /// Insert `entry`, replacing any entry with the same kind and name.
    pub fn upsert(&mut self, entry: RecordEntry) {
        match self
            .artifacts
            .iter_mut()
            .find(|e| e.kind == entry.kind && e.name == entry.name)
        {
            Some(existing) => *existing = entry,
            None => self.artifacts.push(entry),
        }
    }

    /// Remove and return the entry for `kind`/`name`.
    pub fn remove(&mut self, kind: ArtifactKind, name: &str) -> Option<RecordEntry> {
        let idx = self
            .artifacts
            .iter()
            .position(|e| e.kind == kind && e.name == name)?;
        Some(self.artifacts.remove(idx))
    }

    /// All entries named `name`, of any kind.
    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a RecordEntry> {
        self.artifacts.iter().filter(move |e| e.name == name)
    }
}

/// Load the record at `path`; a missing file is an empty record.
///
/// Entry names are held to the same rules as artifact names, since they are
/// joined onto the installation root.
///
/// # Errors
///
/// Returns [`RecordError`] if the file cannot be read or parsed, or if an
/// entry has an unsafe name.
pub fn load(fs: &dyn FileSystemOps, path: &Path) -> Result<InstallRecord, RecordError> {
    let Some(bytes) = fs.read(path)? else {
        return Ok(InstallRecord::default());
    };
    let record = InstallRecord::parse(&bytes)?;
    for entry in &record.artifacts {
        if let Some(reason) = name_problem(entry.kind, &entry.name) {
            return Err(RecordError::UnsafeName {
                name: entry.name.clone(),
                kind: entry.kind,
                reason,
            });
        }
    }
    Ok(record)
}

/// Hex-encoded SHA-256 of `bytes`.
#[must_use]
pub fn digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
