pub mod install;
pub mod uninstall;
pub mod verify;

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Result, bail};

use crate::cli::GlobalOpts;
use crate::engine::InstallOptions;
use crate::error::InstallationError;
use crate::logging::Logger;
use crate::paths::InstallationTarget;

/// Resolve the home directory: `--home`, then `$HOME`, then `$USERPROFILE`.
///
/// # Errors
///
/// Returns an error if none of the sources yields a non-empty path.
pub fn resolve_home(global: &GlobalOpts) -> Result<PathBuf> {
    home_from(global.home.as_deref(), |key| std::env::var_os(key))
}

fn home_from(
    explicit: Option<&std::path::Path>,
    var: impl Fn(&str) -> Option<OsString>,
) -> Result<PathBuf> {
    if let Some(home) = explicit {
        return Ok(home.to_path_buf());
    }
    for key in ["HOME", "USERPROFILE"] {
        if let Some(value) = var(key).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(value));
        }
    }
    bail!("cannot determine home directory. Use --home or set HOME");
}

/// Shared state produced by the common command setup sequence.
#[derive(Debug)]
pub struct CommandSetup {
    /// Resolved installation target.
    pub target: InstallationTarget,
    /// Engine options derived from the global flags.
    pub options: InstallOptions,
}

impl CommandSetup {
    /// Resolve the installation target for this run.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined or is
    /// not a usable target.
    pub fn init(global: &GlobalOpts, log: &Logger) -> Result<Self> {
        log.info(&format!("devkit {}", crate::VERSION));
        let home = resolve_home(global)?;
        let target = InstallationTarget::resolve(&home).map_err(|e| fail(e, log))?;
        log.debug(&format!("target: {}", target.root().display()));
        Ok(Self {
            target,
            options: InstallOptions {
                dry_run: global.dry_run,
                ..InstallOptions::default()
            },
        })
    }
}

/// Log `err` with its numbered resolution steps, print the summary, and
/// hand the error back for `main` to return.
pub fn fail(err: InstallationError, log: &Logger) -> anyhow::Error {
    for line in err.render().lines() {
        log.error(line);
    }
    if err.is_unrecoverable() {
        log.error("the target directory may be inconsistent; recover it before re-running");
    }
    log.print_summary();
    err.into()
}
