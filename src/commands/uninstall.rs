//! Uninstall command implementation.
use anyhow::Result;

use crate::cli::{GlobalOpts, UninstallOpts};
use crate::engine::Installer;
use crate::logging::Logger;
use crate::operations::SystemFileSystemOps;

/// Run the uninstall command.
///
/// # Errors
///
/// Returns an error if a name is not installed or removal fails (after
/// rolling back).
pub fn run(global: &GlobalOpts, opts: &UninstallOpts, log: &Logger) -> Result<()> {
    let setup = super::CommandSetup::init(global, log)?;
    let fs = SystemFileSystemOps;
    let report = Installer::new(&setup.target, &fs, log)
        .with_options(setup.options)
        .uninstall(&opts.names)
        .map_err(|e| super::fail(e, log))?;

    log.print_summary();
    if report.dry_run {
        log.info("re-run without --dry-run to remove these artifacts");
    }
    Ok(())
}
