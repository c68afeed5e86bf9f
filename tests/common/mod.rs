// Shared helpers for integration tests.
//
// Provides a temporary home directory with a resolved installation target
// and an in-memory log.  Failures are injected with the crate's own
// `FaultyFileSystemOps`, enabled here through the `test-support` feature.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use devkit_installer::engine::Installer;
use devkit_installer::logging::{ArtifactEntry, ArtifactStatus, Log};
use devkit_installer::operations::{FileSystemOps, SystemFileSystemOps};
use devkit_installer::paths::InstallationTarget;

/// An isolated home directory backed by a [`tempfile::TempDir`].
pub struct IntegrationTestContext {
    /// Temporary directory standing in for `$HOME`.
    pub home: tempfile::TempDir,
    /// Target resolved from `home`.
    pub target: InstallationTarget,
    /// Log shared by every installer built from this context.
    pub log: MemoryLog,
}

impl IntegrationTestContext {
    /// Create a context with an empty home directory.
    pub fn new() -> Self {
        let home = tempfile::tempdir().expect("create temp dir");
        let target = InstallationTarget::resolve(home.path()).expect("resolve target");
        Self {
            home,
            target,
            log: MemoryLog::default(),
        }
    }

    /// Installer over the real filesystem.
    pub fn installer(&self) -> Installer<'_> {
        Installer::new(&self.target, &SystemFileSystemOps, &self.log)
    }

    /// Installer over `fs`.
    pub fn installer_with<'a>(&'a self, fs: &'a dyn FileSystemOps) -> Installer<'a> {
        Installer::new(&self.target, fs, &self.log)
    }

    /// Write `contents` to `rel` under the installation root, creating
    /// parent directories.
    pub fn seed(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.target.root().join(rel);
        std::fs::create_dir_all(path.parent().expect("seed path has a parent"))
            .expect("create seed dir");
        std::fs::write(&path, contents).expect("write seed file");
        path
    }

    /// Every file under the installation root with its contents, sorted.
    pub fn tree(&self) -> Vec<(PathBuf, Vec<u8>)> {
        let mut out = Vec::new();
        collect(self.target.root(), self.target.root(), &mut out);
        out.sort();
        out
    }
}

fn collect(base: &Path, dir: &Path, out: &mut Vec<(PathBuf, Vec<u8>)>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries {
        let path = entry.expect("read dir entry").path();
        if path.is_dir() {
            out.push((
                path.strip_prefix(base).expect("under base").to_path_buf(),
                Vec::new(),
            ));
            collect(base, &path, out);
        } else {
            let rel = path.strip_prefix(base).expect("under base").to_path_buf();
            out.push((rel, std::fs::read(&path).expect("read file")));
        }
    }
}

/// [`Log`] that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<(&'static str, String)>>,
    artifacts: Mutex<Vec<ArtifactEntry>>,
}

impl MemoryLog {
    fn push(&self, level: &'static str, msg: &str) {
        self.lines
            .lock()
            .expect("lock lines")
            .push((level, msg.to_string()));
    }

    /// Messages logged at `level`.
    pub fn messages(&self, level: &str) -> Vec<String> {
        self.lines
            .lock()
            .expect("lock lines")
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Artifact statuses in record order.
    pub fn statuses(&self) -> Vec<(String, ArtifactStatus)> {
        self.artifacts
            .lock()
            .expect("lock artifacts")
            .iter()
            .map(|e| (e.name.clone(), e.status))
            .collect()
    }
}

impl Log for MemoryLog {
    fn stage(&self, msg: &str) {
        self.push("stage", msg);
    }
    fn info(&self, msg: &str) {
        self.push("info", msg);
    }
    fn debug(&self, msg: &str) {
        self.push("debug", msg);
    }
    fn warn(&self, msg: &str) {
        self.push("warn", msg);
    }
    fn error(&self, msg: &str) {
        self.push("error", msg);
    }
    fn dry_run(&self, msg: &str) {
        self.push("dry_run", msg);
    }
    fn record_artifact(&self, name: &str, status: ArtifactStatus, message: Option<&str>) {
        self.artifacts
            .lock()
            .expect("lock artifacts")
            .push(ArtifactEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
    }
}
