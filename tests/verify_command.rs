#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for the `verify` flow.

mod common;

use common::IntegrationTestContext;
use devkit_installer::artifact::Artifact;
use devkit_installer::engine::ArtifactHealth;

fn install_kit(ctx: &IntegrationTestContext) {
    ctx.installer()
        .install(&[
            Artifact::command("review", "# Review\n"),
            Artifact::hook("guard.sh", "#!/bin/sh\n"),
            Artifact::settings_template("base", r#"{"theme": "dark"}"#),
        ])
        .unwrap();
}

#[test]
fn verify_after_install_is_healthy() {
    let ctx = IntegrationTestContext::new();
    install_kit(&ctx);
    let report = ctx.installer().verify().unwrap();
    assert!(report.is_healthy(), "{report:?}");
    assert!(report.root_writable);
    assert_eq!(report.checks.len(), 3);
}

#[test]
fn verify_reports_drift() {
    let ctx = IntegrationTestContext::new();
    install_kit(&ctx);
    std::fs::write(ctx.target.commands_dir().join("review"), "# Edited\n").unwrap();
    std::fs::remove_file(ctx.target.hooks_dir().join("guard.sh")).unwrap();

    let report = ctx.installer().verify().unwrap();
    assert!(!report.is_healthy());
    let problems: Vec<_> = report
        .problems()
        .map(|c| (c.name.as_str(), c.health))
        .collect();
    assert_eq!(
        problems,
        [
            ("review", ArtifactHealth::Modified),
            ("guard.sh", ArtifactHealth::Missing)
        ]
    );
}

#[test]
fn verify_never_writes() {
    let ctx = IntegrationTestContext::new();
    install_kit(&ctx);
    std::fs::remove_file(ctx.target.commands_dir().join("review")).unwrap();
    let before = ctx.tree();
    ctx.installer().verify().unwrap();
    assert_eq!(ctx.tree(), before);
}

#[test]
fn verify_after_uninstall_drops_removed_entries() {
    let ctx = IntegrationTestContext::new();
    install_kit(&ctx);
    ctx.installer().uninstall(&["review".to_string()]).unwrap();
    let report = ctx.installer().verify().unwrap();
    assert!(report.is_healthy());
    assert!(report.checks.iter().all(|c| c.name != "review"));
}
