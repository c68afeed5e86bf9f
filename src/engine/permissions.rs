//! Mode bits per artifact kind.
use std::path::Path;

use crate::artifact::ArtifactKind;
use crate::error::InstallationError;
use crate::operations::FileSystemOps;

/// Command definitions: owner read-write, everyone else read.
pub const COMMAND_MODE: u32 = 0o644;

/// Hook scripts: executable by owner, group, and other.
pub const HOOK_MODE: u32 = 0o755;

/// Merged settings: owner and group read-write, no execute.
pub const SETTINGS_MODE: u32 = 0o660;

/// Install record: same as commands.
pub const RECORD_MODE: u32 = 0o644;

/// Mode an installed artifact of `kind` must end up with.
#[must_use]
pub const fn mode_for(kind: ArtifactKind) -> u32 {
    match kind {
        ArtifactKind::Command => COMMAND_MODE,
        ArtifactKind::Hook => HOOK_MODE,
        ArtifactKind::SettingsTemplate => SETTINGS_MODE,
    }
}

/// Apply `mode` to `path`.
///
/// # Errors
///
/// Returns [`ErrorKind::PermissionFailure`](crate::error::ErrorKind::PermissionFailure)
/// if the mode cannot be set.
pub fn apply(fs: &dyn FileSystemOps, path: &Path, mode: u32) -> Result<(), InstallationError> {
    fs.set_mode(path, mode)
        .map_err(|e| InstallationError::permissions_failed(path, mode, e))
}

/// Returns `true` if `mode` grants execute to anyone.
#[must_use]
pub const fn is_executable(mode: u32) -> bool {
    mode & 0o111 != 0
}
