//! Verify command implementation.
use anyhow::{Result, bail};

use crate::cli::GlobalOpts;
use crate::engine::Installer;
use crate::logging::Logger;
use crate::operations::SystemFileSystemOps;

/// Run the verify command.
///
/// # Errors
///
/// Returns an error if the install record is unreadable or any check fails.
pub fn run(global: &GlobalOpts, log: &Logger) -> Result<()> {
    let setup = super::CommandSetup::init(global, log)?;
    let fs = SystemFileSystemOps;
    let report = Installer::new(&setup.target, &fs, log)
        .verify()
        .map_err(|e| super::fail(e, log))?;

    if !report.record_found {
        log.info(&format!(
            "nothing installed under {}",
            setup.target.root().display()
        ));
        return Ok(());
    }

    for check in &report.checks {
        log.info(&format!("{} {}: {}", check.kind, check.name, check.health));
    }

    if report.is_healthy() {
        log.info(&format!("{} artifact(s) verified", report.checks.len()));
        return Ok(());
    }

    let problems = report.problems().count();
    if report.stale_backup {
        log.warn(&format!(
            "remove {} once you have confirmed nothing needs recovering",
            setup.target.backup_dir().display()
        ));
    }
    if problems > 0 {
        log.warn("re-run the install to repair modified or missing artifacts");
    }
    bail!("installation is unhealthy: {problems} artifact problem(s)");
}
