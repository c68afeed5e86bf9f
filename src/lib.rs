//! Transactional installer for developer-toolkit artifacts.
//!
//! Places command definitions, hook scripts, and settings templates under a
//! user's `~/.claude` directory as one all-or-nothing unit: either every
//! artifact lands with its correct mode and the settings are merged, or the
//! directory is left byte-identical to how it was found.
//!
//! The public API is organised into four layers:
//!
//! - **[`config`]**: JSONC parsing, deep merge, and the TOML artifact manifest
//! - **[`engine`]**: validation, backup, the transaction state machine, and
//!   the [`Installer`](engine::Installer) that drives them
//! - **[`operations`]**: the filesystem seam every mutation goes through
//! - **[`commands`]**: top-level subcommand orchestration (`install`,
//!   `uninstall`, `verify`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod artifact;
pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod operations;
pub mod paths;

/// Installer version: `DEVKIT_VERSION` at build time, else the crate version.
pub const VERSION: &str = match option_env!("DEVKIT_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};
