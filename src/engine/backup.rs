//! Pre-mutation snapshots and their replay.
//!
//! A [`BackupSnapshot`] records, for every path a run may write or delete,
//! either the exact bytes (and Unix mode) found there, the target of a
//! symbolic link, or the fact that the path did not exist.  A link is saved
//! as a link and the file it resolves to is saved alongside it, since writes
//! go through the link.  It also records which directories the run is about
//! to create, so rollback can remove them again.
//!
//! The snapshot lives in memory for the rollback itself and is mirrored to
//! `<root>/.backup/<timestamp>/` (`files/<n>` plus `index.json`) so a failed
//! rollback can still be recovered by hand.
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::operations::{self, FileSystemOps};

/// Name of the index written into each snapshot store.
pub const INDEX_FILE_NAME: &str = "index.json";

/// What a path held when the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SavedState {
    /// Nothing existed at the path.
    Absent,
    /// A file with these bytes and mode existed.
    Present {
        /// Exact file contents.
        contents: Vec<u8>,
        /// Permission bits, where the platform has them.
        mode: Option<u32>,
    },
    /// A symbolic link pointing here existed.
    Symlink {
        /// Link target exactly as stored in the link.
        target: PathBuf,
    },
}

/// Errors from [`BackupManager`].
#[derive(Error, Debug)]
pub enum BackupError {
    /// A path could not be read while capturing.
    #[error("cannot capture {}: {source}", path.display())]
    Capture {
        /// Path being captured.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The on-disk store could not be written.
    #[error("cannot write backup store {}: {source}", path.display())]
    Store {
        /// Path being written.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// One or more paths could not be put back.
    #[error("{}", describe_restore_failures(.failures))]
    Restore {
        /// Every path that failed, with its error.
        failures: Vec<(PathBuf, io::Error)>,
    },
}

fn describe_restore_failures(failures: &[(PathBuf, io::Error)]) -> String {
    let mut out = format!("{} path(s) could not be restored", failures.len());
    for (path, err) in failures {
        let _ = write!(out, "; {}: {err}", path.display());
    }
    out
}

/// Captured pre-run state of every implicated path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSnapshot {
    store: PathBuf,
    entries: BTreeMap<PathBuf, SavedState>,
    created_dirs: Vec<PathBuf>,
}

impl BackupSnapshot {
    /// Directory holding the on-disk copy of this snapshot.
    #[must_use]
    pub fn store(&self) -> &Path {
        &self.store
    }

    /// Saved state of `path`, if it was captured.
    #[must_use]
    pub fn state(&self, path: &Path) -> Option<&SavedState> {
        self.entries.get(path)
    }

    /// Captured paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }

    /// Directories that did not exist before the run, deepest first.
    #[must_use]
    pub fn created_dirs(&self) -> &[PathBuf] {
        &self.created_dirs
    }
}

#[derive(Serialize)]
struct StoreIndex {
    created_at: String,
    entries: Vec<IndexEntry>,
    created_dirs: Vec<String>,
}

#[derive(Serialize)]
struct IndexEntry {
    path: String,
    saved: Option<String>,
    mode: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<String>,
}

/// Takes, replays, and discards [`BackupSnapshot`]s.
#[derive(Debug)]
pub struct BackupManager<'a> {
    fs: &'a dyn FileSystemOps,
    backup_root: PathBuf,
}

impl<'a> BackupManager<'a> {
    /// Create a manager that keeps stores under `backup_root`.
    #[must_use]
    pub fn new(fs: &'a dyn FileSystemOps, backup_root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            backup_root: backup_root.into(),
        }
    }

    /// Capture `paths` and note which of `dirs` (and the store itself) the
    /// run is about to create.
    ///
    /// Every path is captured before the store is written, and the store is
    /// complete before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Capture`] if a path cannot be read and
    /// [`BackupError::Store`] if the store cannot be written.  On error no
    /// trace of the store is left behind.
    pub fn snapshot(
        &self,
        paths: &[PathBuf],
        dirs: &[PathBuf],
    ) -> Result<BackupSnapshot, BackupError> {
        let mut created_dirs = Vec::new();
        for dir in dirs.iter().chain([&self.backup_root]) {
            self.collect_missing(dir, &mut created_dirs);
        }
        created_dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
        created_dirs.dedup();

        let mut entries = BTreeMap::new();
        for path in paths {
            let state = self.capture(path)?;
            if matches!(state, SavedState::Symlink { .. }) {
                let resolved = operations::resolve_link(self.fs, path).map_err(|source| {
                    BackupError::Capture {
                        path: path.clone(),
                        source,
                    }
                })?;
                let linked = self.capture(&resolved)?;
                entries.insert(resolved, linked);
            }
            entries.insert(path.clone(), state);
        }

        let store = self.fresh_store_path();
        let snapshot = BackupSnapshot {
            store,
            entries,
            created_dirs,
        };
        if let Err(e) = self.write_store(&snapshot) {
            let _ = self.discard(&snapshot);
            return Err(e);
        }
        Ok(snapshot)
    }

    /// Put every captured path back to its saved state and remove the
    /// directories the run created, if they are empty.
    ///
    /// Idempotent.  Continues past individual failures so as much as
    /// possible is restored, then reports all of them.  The store is left
    /// in place.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Restore`] listing every path that failed.
    pub fn restore(&self, snapshot: &BackupSnapshot) -> Result<(), BackupError> {
        let mut failures = Vec::new();

        for (path, state) in &snapshot.entries {
            let result = match state {
                SavedState::Absent if self.fs.exists(path) => self.fs.remove_file(path),
                SavedState::Absent => Ok(()),
                SavedState::Present { contents, mode } => self
                    .fs
                    .write(path, contents)
                    .and_then(|()| mode.map_or(Ok(()), |m| self.fs.set_mode(path, m))),
                SavedState::Symlink { target } => self.restore_link(path, target),
            };
            if let Err(e) = result {
                failures.push((path.clone(), e));
            }
        }

        for dir in &snapshot.created_dirs {
            if let Err(e) = self.remove_empty_dir(dir) {
                failures.push((dir.clone(), e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BackupError::Restore { failures })
        }
    }

    /// Remove the snapshot store and any now-empty directories the run
    /// created for it.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Store`] if the store cannot be removed.
    pub fn discard(&self, snapshot: &BackupSnapshot) -> Result<(), BackupError> {
        match self.fs.remove_dir_all(&snapshot.store) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(BackupError::Store {
                    path: snapshot.store.clone(),
                    source,
                });
            }
        }
        let _ = self.remove_empty_dir(&self.backup_root);
        for dir in &snapshot.created_dirs {
            let _ = self.remove_empty_dir(dir);
        }
        Ok(())
    }

    fn capture(&self, path: &Path) -> Result<SavedState, BackupError> {
        let capture_err = |source| BackupError::Capture {
            path: path.to_path_buf(),
            source,
        };
        if let Some(target) = self.fs.read_link(path).map_err(capture_err)? {
            return Ok(SavedState::Symlink { target });
        }
        match self.fs.read(path).map_err(capture_err)? {
            None => Ok(SavedState::Absent),
            Some(contents) => {
                let mode = self.fs.mode(path).map_err(capture_err)?;
                Ok(SavedState::Present { contents, mode })
            }
        }
    }

    fn restore_link(&self, path: &Path, target: &Path) -> io::Result<()> {
        match self.fs.read_link(path)? {
            Some(current) if current == target => return Ok(()),
            Some(_) => self.fs.remove_file(path)?,
            None if self.fs.exists(path) => self.fs.remove_file(path)?,
            None => {}
        }
        self.fs.symlink(target, path)
    }

    fn collect_missing(&self, dir: &Path, out: &mut Vec<PathBuf>) {
        let mut current = Some(dir);
        while let Some(d) = current {
            if d.as_os_str().is_empty() || self.fs.is_dir(d) {
                break;
            }
            if !out.iter().any(|o| o == d) {
                out.push(d.to_path_buf());
            }
            current = d.parent();
        }
    }

    fn fresh_store_path(&self) -> PathBuf {
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string();
        let mut candidate = self.backup_root.join(&stamp);
        let mut n = 1;
        while self.fs.exists(&candidate) {
            candidate = self.backup_root.join(format!("{stamp}-{n}"));
            n += 1;
        }
        candidate
    }

    fn write_store(&self, snapshot: &BackupSnapshot) -> Result<(), BackupError> {
        let store_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| BackupError::Store { path, source }
        };
        let files_dir = snapshot.store.join("files");
        self.fs
            .create_dir_all(&files_dir)
            .map_err(store_err(&files_dir))?;

        let mut index = StoreIndex {
            created_at: chrono::Utc::now().to_rfc3339(),
            entries: Vec::with_capacity(snapshot.entries.len()),
            created_dirs: snapshot
                .created_dirs
                .iter()
                .map(|d| d.display().to_string())
                .collect(),
        };
        for (n, (path, state)) in snapshot.entries.iter().enumerate() {
            let (saved, mode, link) = match state {
                SavedState::Absent => (None, None, None),
                SavedState::Present { contents, mode } => {
                    let rel = format!("files/{n}");
                    let copy = snapshot.store.join(&rel);
                    self.fs.write(&copy, contents).map_err(store_err(&copy))?;
                    (Some(rel), *mode, None)
                }
                SavedState::Symlink { target } => (None, None, Some(target.display().to_string())),
            };
            index.entries.push(IndexEntry {
                path: path.display().to_string(),
                saved,
                mode,
                link,
            });
        }

        let index_path = snapshot.store.join(INDEX_FILE_NAME);
        let json = serde_json::to_vec_pretty(&index)
            .map_err(|e| store_err(&index_path)(io::Error::other(e)))?;
        self.fs
            .write(&index_path, &json)
            .map_err(store_err(&index_path))
    }

    fn remove_empty_dir(&self, dir: &Path) -> io::Result<()> {
        match self.fs.remove_dir(dir) {
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::DirectoryNotEmpty
                ) =>
            {
                Ok(())
            }
            other => other,
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::operations::{FaultyFileSystemOps, FsOp, SystemFileSystemOps};

    struct Fixture {
        _tmp: tempfile::TempDir,
        root: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let root = tmp.path().join(".claude");
            Self { _tmp: tmp, root }
        }

        fn backup_root(&self) -> PathBuf {
            self.root.join(".backup")
        }
    }

    #[test]
    fn snapshot_records_absent_and_present_paths() {
        let fx = Fixture::new();
        std::fs::create_dir_all(&fx.root).unwrap();
        let existing = fx.root.join("settings.json");
        std::fs::write(&existing, b"{\"custom\":true}").unwrap();
        let absent = fx.root.join("commands/xtest");

        let fs = SystemFileSystemOps;
        let mgr = BackupManager::new(&fs, fx.backup_root());
        let snap = mgr
            .snapshot(&[existing.clone(), absent.clone()], &[fx.root.join("commands")])
            .unwrap();

        assert!(matches!(
            snap.state(&existing),
            Some(SavedState::Present { contents, .. }) if contents == b"{\"custom\":true}"
        ));
        assert_eq!(snap.state(&absent), Some(&SavedState::Absent));
        assert!(snap.store().join(INDEX_FILE_NAME).is_file());
        assert!(snap.created_dirs().contains(&fx.root.join("commands")));
        assert!(snap.created_dirs().contains(&fx.backup_root()));
    }

    #[test]
    fn index_maps_paths_to_saved_copies() {
        let fx = Fixture::new();
        std::fs::create_dir_all(&fx.root).unwrap();
        let existing = fx.root.join("settings.json");
        std::fs::write(&existing, b"{}").unwrap();

        let fs = SystemFileSystemOps;
        let mgr = BackupManager::new(&fs, fx.backup_root());
        let snap = mgr
            .snapshot(&[existing.clone(), fx.root.join("absent")], &[])
            .unwrap();

        let index: serde_json::Value = serde_json::from_slice(
            &std::fs::read(snap.store().join(INDEX_FILE_NAME)).unwrap(),
        )
        .unwrap();
        let entries = index["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        let saved = entries
            .iter()
            .find(|e| e["path"] == existing.display().to_string())
            .unwrap()["saved"]
            .as_str()
            .unwrap();
        assert_eq!(std::fs::read(snap.store().join(saved)).unwrap(), b"{}");
        assert!(
            entries
                .iter()
                .any(|e| e["saved"].is_null())
        );
    }

    #[test]
    fn restore_rewrites_and_deletes() {
        let fx = Fixture::new();
        std::fs::create_dir_all(fx.root.join("commands")).unwrap();
        let existing = fx.root.join("settings.json");
        let new_file = fx.root.join("commands/xtest");
        std::fs::write(&existing, b"before").unwrap();

        let fs = SystemFileSystemOps;
        let mgr = BackupManager::new(&fs, fx.backup_root());
        let snap = mgr
            .snapshot(&[existing.clone(), new_file.clone()], &[])
            .unwrap();

        std::fs::write(&existing, b"after").unwrap();
        std::fs::write(&new_file, b"# new").unwrap();

        mgr.restore(&snap).unwrap();
        assert_eq!(std::fs::read(&existing).unwrap(), b"before");
        assert!(!new_file.exists());

        mgr.restore(&snap).unwrap();
        assert_eq!(std::fs::read(&existing).unwrap(), b"before");
    }

    #[cfg(unix)]
    #[test]
    fn restore_reapplies_mode() {
        use std::os::unix::fs::PermissionsExt;
        let fx = Fixture::new();
        std::fs::create_dir_all(&fx.root).unwrap();
        let file = fx.root.join("settings.json");
        std::fs::write(&file, b"{}").unwrap();
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o640)).unwrap();

        let fs = SystemFileSystemOps;
        let mgr = BackupManager::new(&fs, fx.backup_root());
        let snap = mgr.snapshot(std::slice::from_ref(&file), &[]).unwrap();

        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o600)).unwrap();
        mgr.restore(&snap).unwrap();
        let mode = std::fs::metadata(&file).unwrap().permissions().mode() & 0o7777;
        assert_eq!(mode, 0o640);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_is_saved_with_the_file_it_points_to() {
        let fx = Fixture::new();
        std::fs::create_dir_all(&fx.root).unwrap();
        let real = fx.root.join("real.json");
        let link = fx.root.join("settings.json");
        std::fs::write(&real, b"{}").unwrap();
        std::os::unix::fs::symlink("real.json", &link).unwrap();

        let fs = SystemFileSystemOps;
        let mgr = BackupManager::new(&fs, fx.backup_root());
        let snap = mgr.snapshot(std::slice::from_ref(&link), &[]).unwrap();

        assert_eq!(
            snap.state(&link),
            Some(&SavedState::Symlink {
                target: PathBuf::from("real.json")
            })
        );
        assert!(matches!(
            snap.state(&real),
            Some(SavedState::Present { contents, .. }) if contents == b"{}"
        ));
        let index: serde_json::Value = serde_json::from_slice(
            &std::fs::read(snap.store().join(INDEX_FILE_NAME)).unwrap(),
        )
        .unwrap();
        assert!(
            index["entries"]
                .as_array()
                .unwrap()
                .iter()
                .any(|e| e["link"] == "real.json")
        );
    }

    #[cfg(unix)]
    #[test]
    fn restore_recreates_a_replaced_symlink() {
        let fx = Fixture::new();
        std::fs::create_dir_all(&fx.root).unwrap();
        let real = fx.root.join("real.json");
        let link = fx.root.join("settings.json");
        std::fs::write(&real, b"before").unwrap();
        std::os::unix::fs::symlink("real.json", &link).unwrap();

        let fs = SystemFileSystemOps;
        let mgr = BackupManager::new(&fs, fx.backup_root());
        let snap = mgr.snapshot(std::slice::from_ref(&link), &[]).unwrap();

        std::fs::write(&real, b"after").unwrap();
        std::fs::remove_file(&link).unwrap();
        std::fs::write(&link, b"a regular file now").unwrap();

        mgr.restore(&snap).unwrap();
        assert_eq!(
            std::fs::read_link(&link).unwrap(),
            PathBuf::from("real.json")
        );
        assert_eq!(std::fs::read(&real).unwrap(), b"before");

        mgr.restore(&snap).unwrap();
        assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    }

    #[test]
    fn discard_removes_store_and_created_dirs() {
        let fx = Fixture::new();
        let fs = SystemFileSystemOps;
        let mgr = BackupManager::new(&fs, fx.backup_root());
        let snap = mgr
            .snapshot(&[fx.root.join("commands/xtest")], &[fx.root.join("commands")])
            .unwrap();
        assert!(fx.backup_root().exists());

        mgr.discard(&snap).unwrap();
        assert!(!fx.backup_root().exists());
        assert!(!fx.root.exists(), "root was created by the run and is empty");
    }

    #[test]
    fn discard_keeps_directories_that_gained_content() {
        let fx = Fixture::new();
        let fs = SystemFileSystemOps;
        let mgr = BackupManager::new(&fs, fx.backup_root());
        let snap = mgr
            .snapshot(&[fx.root.join("commands/xtest")], &[fx.root.join("commands")])
            .unwrap();
        std::fs::create_dir_all(fx.root.join("commands")).unwrap();
        std::fs::write(fx.root.join("commands/xtest"), b"# x").unwrap();

        mgr.discard(&snap).unwrap();
        assert!(!fx.backup_root().exists());
        assert!(fx.root.join("commands/xtest").exists());
    }

    #[test]
    fn capture_failure_leaves_no_store() {
        let fx = Fixture::new();
        std::fs::create_dir_all(&fx.root).unwrap();
        let settings = fx.root.join("settings.json");
        std::fs::write(&settings, b"{}").unwrap();

        let fs = FaultyFileSystemOps::new().fail(FsOp::Read, &settings);
        let mgr = BackupManager::new(&fs, fx.backup_root());
        let err = mgr.snapshot(&[settings], &[]).unwrap_err();

        assert!(matches!(err, BackupError::Capture { .. }));
        assert!(!fx.backup_root().exists());
    }

    #[test]
    fn store_failure_cleans_up() {
        let fx = Fixture::new();
        std::fs::create_dir_all(&fx.root).unwrap();
        let settings = fx.root.join("settings.json");
        std::fs::write(&settings, b"{}").unwrap();

        let fs = FaultyFileSystemOps::new().fail(FsOp::Write, fx.backup_root());
        let mgr = BackupManager::new(&fs, fx.backup_root());
        let err = mgr.snapshot(&[settings], &[]).unwrap_err();

        assert!(matches!(err, BackupError::Store { .. }));
        assert!(!fx.backup_root().exists());
    }

    #[test]
    fn restore_reports_every_failure() {
        let fx = Fixture::new();
        std::fs::create_dir_all(&fx.root).unwrap();
        let a = fx.root.join("a");
        let b = fx.root.join("b");

        let fs = FaultyFileSystemOps::new()
            .fail(FsOp::RemoveFile, &a)
            .fail(FsOp::RemoveFile, &b);
        let mgr = BackupManager::new(&fs, fx.backup_root());
        let snap = mgr.snapshot(&[a.clone(), b.clone()], &[]).unwrap();
        std::fs::write(&a, b"x").unwrap();
        std::fs::write(&b, b"y").unwrap();

        let err = mgr.restore(&snap).unwrap_err();
        assert!(
            matches!(&err, BackupError::Restore { failures } if failures.len() == 2),
            "{err}"
        );
        assert!(snap.store().exists(), "store is kept after a failed restore");
    }
}
