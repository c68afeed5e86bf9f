use anyhow::Result;
use clap::Parser;

use devkit_installer::{cli, commands, logging};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();

    if matches!(args.command, cli::Command::Version) {
        println!("devkit {}", devkit_installer::VERSION);
        return Ok(());
    }

    logging::init_subscriber(args.verbose, args.command.name());
    let log = logging::Logger::new(args.command.name());

    match &args.command {
        cli::Command::Install(opts) => commands::install::run(&args.global, opts, &log),
        cli::Command::Uninstall(opts) => commands::uninstall::run(&args.global, opts, &log),
        cli::Command::Verify => commands::verify::run(&args.global, &log),
        cli::Command::Version => Ok(()),
    }
}
