//! Artifact validation.
//!
//! Validation is pure: it never touches the filesystem.  The installer runs
//! it over the whole batch before the first mutation, so a single bad
//! artifact aborts the batch with nothing changed.
use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::artifact::{Artifact, ArtifactKind};
use crate::config::jsonc;
use crate::error::{ErrorKind, InstallationError, Phase};

/// A non-fatal finding about an otherwise valid artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// Artifact the warning is about.
    pub artifact: String,
    /// Human-readable warning message.
    pub message: String,
}

impl ValidationWarning {
    #[must_use]
    fn new(artifact: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            message: message.into(),
        }
    }
}

/// An artifact that passed validation, with its content unwrapped.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedArtifact {
    /// Artifact name.
    pub name: String,
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Raw content bytes.
    pub content: Vec<u8>,
    /// Parsed, comment-free template (settings templates only).
    pub template: Option<Map<String, Value>>,
}

/// A whole batch that passed validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedBatch {
    /// Artifacts in batch order.
    pub artifacts: Vec<ValidatedArtifact>,
    /// Advisory findings; never block the install.
    pub warnings: Vec<ValidationWarning>,
}

impl ValidatedBatch {
    /// Commands and hooks, in batch order.
    pub fn files(&self) -> impl Iterator<Item = &ValidatedArtifact> {
        self.artifacts
            .iter()
            .filter(|a| a.kind != ArtifactKind::SettingsTemplate)
    }

    /// Parsed settings templates, in batch order.
    pub fn templates(&self) -> impl Iterator<Item = &Map<String, Value>> {
        self.artifacts.iter().filter_map(|a| a.template.as_ref())
    }

    /// `true` if any artifact is a settings template.
    #[must_use]
    pub fn has_settings(&self) -> bool {
        self.artifacts
            .iter()
            .any(|a| a.kind == ArtifactKind::SettingsTemplate)
    }

    /// Artifact names in batch order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.artifacts.iter().map(|a| a.name.clone()).collect()
    }
}

/// Validate a single artifact.
///
/// # Errors
///
/// Returns [`ErrorKind::InvalidArtifact`] for missing or unacceptable
/// content or names, and [`ErrorKind::MalformedTemplate`] for a settings
/// template that does not parse to a JSON object.
pub fn validate(artifact: &Artifact) -> Result<ValidatedArtifact, InstallationError> {
    let name = artifact.name.as_str();
    check_name(artifact)?;

    let Some(content) = artifact.content.as_deref() else {
        return Err(InstallationError::invalid_artifact(
            name,
            format!("{} '{name}' has no content", artifact.kind),
        ));
    };

    let template = match artifact.kind {
        ArtifactKind::Command => {
            check_command(name, content)?;
            None
        }
        ArtifactKind::Hook => {
            check_hook(name, content)?;
            None
        }
        ArtifactKind::SettingsTemplate => Some(parse_template(name, content)?),
    };

    Ok(ValidatedArtifact {
        name: name.to_string(),
        kind: artifact.kind,
        content: content.to_vec(),
        template,
    })
}

/// Validate an entire batch, failing on the first invalid artifact.
///
/// Also rejects two commands or two hooks with the same name.  Multiple
/// settings templates are allowed; they are merged in order.
///
/// # Errors
///
/// Returns the first artifact's [`InstallationError`], or
/// [`ErrorKind::InvalidArtifact`] for a duplicate name.
pub fn validate_batch(artifacts: &[Artifact]) -> Result<ValidatedBatch, InstallationError> {
    let mut seen = HashSet::new();
    let mut batch = ValidatedBatch::default();

    for artifact in artifacts {
        let validated = validate(artifact)?;
        if validated.kind != ArtifactKind::SettingsTemplate
            && !seen.insert((validated.kind, validated.name.clone()))
        {
            return Err(InstallationError::invalid_artifact(
                &validated.name,
                format!(
                    "{} '{}' appears more than once in the batch",
                    validated.kind, validated.name
                ),
            ));
        }
        if validated.kind == ArtifactKind::Command
            && let Some(warning) = lint_command(&validated.name, &validated.content)
        {
            batch.warnings.push(warning);
        }
        batch.artifacts.push(validated);
    }
    Ok(batch)
}

fn check_name(artifact: &Artifact) -> Result<(), InstallationError> {
    let name = artifact.name.as_str();
    match name_problem(artifact.kind, name) {
        Some(reason) => Err(InstallationError::invalid_artifact(
            name,
            format!("{} '{name}': {reason}", artifact.kind),
        )),
        None => Ok(()),
    }
}

/// Why `name` is unusable for an artifact of `kind`, or `None` if it is fine.
///
/// Command and hook names become file names under the installation root, so
/// they must be a single path component.  Settings template names are only
/// labels.
#[must_use]
pub fn name_problem(kind: ArtifactKind, name: &str) -> Option<&'static str> {
    if name.trim().is_empty() {
        Some("name is empty")
    } else if name.contains('\0') {
        Some("name contains a NUL byte")
    } else if kind == ArtifactKind::SettingsTemplate {
        None
    } else if name == "." || name == ".." {
        Some("name must not be '.' or '..'")
    } else if name.contains(['/', '\\']) {
        Some("name must be a single file name without path separators")
    } else {
        None
    }
}

fn check_command(name: &str, content: &[u8]) -> Result<(), InstallationError> {
    let text = std::str::from_utf8(content).map_err(|e| {
        InstallationError::invalid_artifact(name, format!("command '{name}' is not UTF-8 text"))
            .with_source(e)
    })?;
    if text.trim().is_empty() {
        return Err(InstallationError::invalid_artifact(
            name,
            format!("command '{name}' is empty"),
        ));
    }
    Ok(())
}

fn check_hook(name: &str, content: &[u8]) -> Result<(), InstallationError> {
    if content.is_empty() {
        return Err(InstallationError::invalid_artifact(
            name,
            format!("hook '{name}' is empty"),
        ));
    }
    let first_line = content.split(|b| *b == b'\n').next().unwrap_or_default();
    let interpreter = first_line
        .strip_prefix(b"#!")
        .map(|rest| String::from_utf8_lossy(rest).trim().to_string())
        .filter(|rest| !rest.is_empty());

    if interpreter.is_none() {
        return Err(InstallationError::invalid_artifact(
            name,
            format!("hook '{name}' does not start with an interpreter line (#!)"),
        )
        .with_steps([
            format!("add an interpreter line such as '#!/bin/sh' to the top of '{name}'"),
            "nothing was changed on disk".to_string(),
        ]));
    }
    Ok(())
}

fn parse_template(name: &str, content: &[u8]) -> Result<Map<String, Value>, InstallationError> {
    let malformed = |message: String| {
        InstallationError::new(ErrorKind::MalformedTemplate, Phase::Validation, message)
            .with_artifact(name)
    };

    let text = std::str::from_utf8(content)
        .map_err(|e| malformed(format!("settings template '{name}' is not UTF-8")).with_source(e))?;
    match jsonc::parse_object(text) {
        Ok(Some(map)) => Ok(map),
        Ok(None) => Err(malformed(format!(
            "settings template '{name}' must be a JSON object"
        ))),
        Err(e) => Err(malformed(format!("settings template '{name}': {e}"))
            .with_steps([
                format!("fix the JSON syntax of settings template '{name}'"),
                "comments are allowed; trailing commas are not".to_string(),
                "nothing was changed on disk".to_string(),
            ])
            .with_source(e)),
    }
}

/// Advisory check: commands are expected to open with a heading or front
/// matter.
fn lint_command(name: &str, content: &[u8]) -> Option<ValidationWarning> {
    let text = String::from_utf8_lossy(content);
    let first = text.lines().find(|l| !l.trim().is_empty())?.trim_start();
    if first.starts_with('#') || first.starts_with("---") {
        return None;
    }
    Some(ValidationWarning::new(
        name,
        format!("command '{name}' has no leading heading or front matter"),
    ))
}
