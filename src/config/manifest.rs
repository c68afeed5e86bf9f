//! TOML batch manifests.
//!
//! A manifest lists the artifacts of one batch, in order:
//!
//! ```toml
//! [[artifact]]
//! name = "xtest"
//! kind = "command"
//! source = "commands/xtest.md"
//! ```
//!
//! `source` is resolved relative to the manifest's own directory.
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::artifact::{Artifact, ArtifactKind};

/// One `[[artifact]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntry {
    /// Destination file name.
    pub name: String,
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Content file, relative to the manifest directory.
    pub source: PathBuf,
}

/// A parsed manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Batch entries in install order.
    #[serde(default, rename = "artifact")]
    pub artifacts: Vec<ManifestEntry>,
}

/// Parse manifest text.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or names an unknown kind.
pub fn parse(text: &str) -> Result<Manifest> {
    toml::from_str(text).context("Failed to parse TOML manifest")
}

/// Load the manifest at `path` and read every artifact's content.
///
/// # Errors
///
/// Returns an error if the manifest cannot be read or parsed, is empty, or
/// references a source file that cannot be read.
pub fn load(path: &Path) -> Result<Vec<Artifact>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    let manifest =
        parse(&text).with_context(|| format!("Failed to load manifest: {}", path.display()))?;
    if manifest.artifacts.is_empty() {
        bail!("manifest lists no artifacts: {}", path.display());
    }

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    manifest
        .artifacts
        .into_iter()
        .map(|entry| {
            let source = base.join(&entry.source);
            let content = std::fs::read(&source).with_context(|| {
                format!(
                    "Failed to read source for {} '{}': {}",
                    entry.kind,
                    entry.name,
                    source.display()
                )
            })?;
            Ok(Artifact::new(entry.name, entry.kind, Some(content)))
        })
        .collect()
}
