//! Installable artifacts.
use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of an artifact, which fixes its destination, validation rules,
/// and mode bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// Plain-text command definition under `commands/`.
    Command,
    /// Executable script under `hooks/`.
    Hook,
    /// JSON/JSONC template merged into `settings.json`.
    #[serde(alias = "settingsTemplate", alias = "settings")]
    SettingsTemplate,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Command => "command",
            Self::Hook => "hook",
            Self::SettingsTemplate => "settings-template",
        };
        f.write_str(name)
    }
}

/// A named blob to install.
///
/// `content == None` is a valid value meaning "intentionally invalid"; the
/// validator always rejects it.  The installer only ever reads artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// File name at the destination (settings templates: a label only).
    pub name: String,
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Raw bytes, or `None` for a deliberately invalid artifact.
    pub content: Option<Vec<u8>>,
}

impl Artifact {
    /// Create an artifact.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ArtifactKind, content: Option<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            kind,
            content,
        }
    }

    /// A command artifact.
    #[must_use]
    pub fn command(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self::new(name, ArtifactKind::Command, Some(content.into()))
    }

    /// A hook artifact.
    #[must_use]
    pub fn hook(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self::new(name, ArtifactKind::Hook, Some(content.into()))
    }

    /// A settings template artifact.
    #[must_use]
    pub fn settings_template(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self::new(name, ArtifactKind::SettingsTemplate, Some(content.into()))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Wrapper {
        kind: ArtifactKind,
    }

    fn parse_kind(s: &str) -> Result<ArtifactKind, toml::de::Error> {
        toml::from_str::<Wrapper>(&format!("kind = \"{s}\"")).map(|w| w.kind)
    }

    #[test]
    fn kind_parses_kebab_case() {
        assert_eq!(parse_kind("command").unwrap(), ArtifactKind::Command);
        assert_eq!(parse_kind("hook").unwrap(), ArtifactKind::Hook);
        assert_eq!(
            parse_kind("settings-template").unwrap(),
            ArtifactKind::SettingsTemplate
        );
    }

    #[test]
    fn kind_accepts_camel_case_alias() {
        assert_eq!(
            parse_kind("settingsTemplate").unwrap(),
            ArtifactKind::SettingsTemplate
        );
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(parse_kind("plugin").is_err());
    }

    #[test]
    fn kind_display_round_trips_through_serde() {
        for kind in [
            ArtifactKind::Command,
            ArtifactKind::Hook,
            ArtifactKind::SettingsTemplate,
        ] {
            assert_eq!(parse_kind(&kind.to_string()).unwrap(), kind);
        }
    }

    #[test]
    fn constructors_set_kind_and_content() {
        let a = Artifact::command("xtest", "# Test command");
        assert_eq!(a.kind, ArtifactKind::Command);
        assert_eq!(a.content.as_deref(), Some(b"# Test command".as_slice()));

        let h = Artifact::new("guard.sh", ArtifactKind::Hook, None);
        assert!(h.content.is_none());
    }
}
