use anyhow::Result;

use crate::cli::{GlobalOpts, InstallOpts};
use crate::config::manifest;
use crate::engine::Installer;
use crate::logging::Logger;
use crate::operations::SystemFileSystemOps;

/// Run the install command.
///
/// # Errors
///
/// Returns an error if the manifest cannot be loaded or the installation
/// fails (after rolling back).
pub fn run(global: &GlobalOpts, opts: &InstallOpts, log: &Logger) -> Result<()> {
    let mut setup = super::CommandSetup::init(global, log)?;
    setup.options.overwrite = !opts.no_overwrite;

    log.stage("Loading manifest");
    let artifacts = manifest::load(&opts.manifest)?;
    log.info(&format!(
        "loaded {} artifact(s) from {}",
        artifacts.len(),
        opts.manifest.display()
    ));

    let fs = SystemFileSystemOps;
    let report = Installer::new(&setup.target, &fs, log)
        .with_options(setup.options)
        .install(&artifacts)
        .map_err(|e| super::fail(e, log))?;

    log.print_summary();
    log.stage("Next steps");
    for (i, step) in report.next_steps().iter().enumerate() {
        log.info(&format!("{}. {step}", i + 1));
    }
    Ok(())
}
