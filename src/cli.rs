use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI entry point for the developer-toolkit installer.
#[derive(Parser, Debug)]
#[command(
    name = "devkit",
    about = "Transactional installer for developer-toolkit commands, hooks, and settings",
    version = crate::VERSION
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Home directory to install under (defaults to $HOME)
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install the artifacts listed in a manifest
    Install(InstallOpts),
    /// Remove installed commands and hooks by name
    Uninstall(UninstallOpts),
    /// Check installed artifacts against the install record
    Verify,
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the per-command log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Install(_) => "install",
            Self::Uninstall(_) => "uninstall",
            Self::Verify => "verify",
            Self::Version => "version",
        }
    }
}

/// Options for the `install` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct InstallOpts {
    /// Path to the TOML manifest listing the batch
    #[arg(short, long)]
    pub manifest: PathBuf,

    /// Fail instead of replacing existing commands and hooks
    #[arg(long)]
    pub no_overwrite: bool,
}

/// Options for the `uninstall` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct UninstallOpts {
    /// Names of the commands or hooks to remove
    #[arg(required = true)]
    pub names: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_install_with_manifest() {
        let cli = Cli::parse_from(["devkit", "install", "--manifest", "kit/devkit.toml"]);
        assert!(
            matches!(&cli.command, Command::Install(o) if o.manifest == PathBuf::from("kit/devkit.toml") && !o.no_overwrite)
        );
    }

    #[test]
    fn install_requires_manifest() {
        assert!(Cli::try_parse_from(["devkit", "install"]).is_err());
    }

    #[test]
    fn parse_install_no_overwrite() {
        let cli = Cli::parse_from(["devkit", "install", "-m", "m.toml", "--no-overwrite"]);
        assert!(matches!(&cli.command, Command::Install(o) if o.no_overwrite));
    }

    #[test]
    fn parse_dry_run_short() {
        let cli = Cli::parse_from(["devkit", "-d", "install", "-m", "m.toml"]);
        assert!(cli.global.dry_run);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["devkit", "verify", "--home", "/tmp/u", "--dry-run"]);
        assert_eq!(cli.global.home, Some(PathBuf::from("/tmp/u")));
        assert!(cli.global.dry_run);
    }

    #[test]
    fn parse_uninstall_names() {
        let cli = Cli::parse_from(["devkit", "uninstall", "xtest", "guard.sh"]);
        assert!(
            matches!(&cli.command, Command::Uninstall(o) if o.names == ["xtest", "guard.sh"])
        );
    }

    #[test]
    fn uninstall_requires_a_name() {
        assert!(Cli::try_parse_from(["devkit", "uninstall"]).is_err());
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["devkit", "version"]);
        assert!(matches!(cli.command, Command::Version));
        assert_eq!(cli.command.name(), "version");
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::parse_from(["devkit", "-v", "verify"]);
        assert!(cli.verbose);
        assert_eq!(cli.command.name(), "verify");
    }
}
