#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for the `uninstall` flow.
//!
//! Uninstall works from the install record alone and runs through the same
//! transaction as install, so a failed removal leaves everything in place.

mod common;

use common::IntegrationTestContext;
use devkit_installer::artifact::{Artifact, ArtifactKind};
use devkit_installer::engine::record::InstallRecord;
use devkit_installer::error::{ErrorKind, Phase};
use devkit_installer::logging::ArtifactStatus;
use devkit_installer::operations::{FaultyFileSystemOps, FsOp};

fn install_kit(ctx: &IntegrationTestContext) {
    ctx.installer()
        .install(&[
            Artifact::command("review", "# Review\n"),
            Artifact::command("lint", "# Lint\n"),
            Artifact::hook("guard.sh", "#!/bin/sh\n"),
            Artifact::settings_template("base", r#"{"theme": "dark"}"#),
        ])
        .unwrap();
}

fn record(ctx: &IntegrationTestContext) -> InstallRecord {
    InstallRecord::parse(&std::fs::read(ctx.target.record_file()).unwrap()).unwrap()
}

#[test]
fn removes_named_artifacts_only() {
    let ctx = IntegrationTestContext::new();
    install_kit(&ctx);

    let report = ctx
        .installer()
        .uninstall(&["review".to_string(), "guard.sh".to_string()])
        .unwrap();

    let removed: Vec<_> = report.removed.iter().map(|a| (a.name.as_str(), a.kind)).collect();
    assert_eq!(
        removed,
        [("review", ArtifactKind::Command), ("guard.sh", ArtifactKind::Hook)]
    );
    assert!(!ctx.target.commands_dir().join("review").exists());
    assert!(!ctx.target.hooks_dir().join("guard.sh").exists());
    assert!(ctx.target.commands_dir().join("lint").exists());
    assert!(ctx.target.settings_file().exists(), "settings are never removed");

    let names: Vec<_> = record(&ctx).artifacts.into_iter().map(|e| e.name).collect();
    assert_eq!(names, ["lint", "base"]);
    assert!(!ctx.target.backup_dir().exists());
    assert!(
        ctx.log
            .statuses()
            .iter()
            .any(|(n, s)| n == "review" && *s == ArtifactStatus::Removed)
    );
}

#[test]
fn repeated_names_are_removed_once() {
    let ctx = IntegrationTestContext::new();
    install_kit(&ctx);
    let report = ctx
        .installer()
        .uninstall(&["lint".to_string(), "lint".to_string()])
        .unwrap();
    assert_eq!(report.removed.len(), 1);
}

#[test]
fn unknown_name_fails_before_touching_disk() {
    let ctx = IntegrationTestContext::new();
    install_kit(&ctx);
    let before = ctx.tree();

    let err = ctx
        .installer()
        .uninstall(&["review".to_string(), "missing".to_string()])
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::InvalidArtifact);
    assert_eq!(err.artifact.as_deref(), Some("missing"));
    assert_eq!(ctx.tree(), before);
}

#[test]
fn nothing_installed_means_nothing_to_remove() {
    let ctx = IntegrationTestContext::new();
    let err = ctx
        .installer()
        .uninstall(&["review".to_string()])
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidArtifact);
    assert!(!ctx.target.root().exists());
}

#[test]
fn removal_failure_restores_removed_files() {
    let ctx = IntegrationTestContext::new();
    install_kit(&ctx);
    let before = ctx.tree();

    let fs = FaultyFileSystemOps::new().fail(FsOp::RemoveFile, ctx.target.hooks_dir());
    let err = ctx
        .installer_with(&fs)
        .uninstall(&["review".to_string(), "guard.sh".to_string()])
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::WriteFailure);
    assert_eq!(err.artifact.as_deref(), Some("guard.sh"));
    assert!(!err.is_unrecoverable());
    assert_eq!(ctx.tree(), before);
}

#[test]
fn uninstall_then_reinstall_round_trips() {
    let ctx = IntegrationTestContext::new();
    install_kit(&ctx);
    ctx.installer().uninstall(&["review".to_string()]).unwrap();
    ctx.installer()
        .install(&[Artifact::command("review", "# Review\n")])
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(ctx.target.commands_dir().join("review")).unwrap(),
        "# Review\n"
    );
    assert_eq!(record(&ctx).artifacts.len(), 4);
}

#[test]
fn tampered_record_cannot_reach_outside_the_root() {
    let ctx = IntegrationTestContext::new();
    install_kit(&ctx);
    let victim = ctx.home.path().join("victim.txt");
    std::fs::write(&victim, "keep me").unwrap();

    let mut tampered = record(&ctx);
    let mut entry = tampered.artifacts[0].clone();
    entry.name = "../../victim.txt".to_string();
    tampered.artifacts.push(entry);
    std::fs::write(ctx.target.record_file(), tampered.to_bytes().unwrap()).unwrap();
    let before = ctx.tree();

    let err = ctx
        .installer()
        .uninstall(&["../../victim.txt".to_string()])
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidConfiguration);
    assert_eq!(err.phase, Phase::Validation);
    assert_eq!(std::fs::read_to_string(&victim).unwrap(), "keep me");
    assert_eq!(ctx.tree(), before);

    let err = ctx.installer().verify().unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidConfiguration);
}
