//! Filesystem operation abstractions for dependency injection.
//!
//! Every mutation the installer performs goes through [`FileSystemOps`], so
//! rollback paths can be exercised by injecting failures.  Production code
//! uses [`SystemFileSystemOps`]; tests use `FaultyFileSystemOps`, which the
//! `test-support` feature exposes to integration suites.

use std::io;
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Mask applied to Unix modes reported and accepted by [`FileSystemOps`].
pub const MODE_MASK: u32 = 0o7777;

/// Symbolic links followed by [`resolve_link`] before giving up.
pub const MAX_LINK_HOPS: usize = 40;

/// Abstraction over the filesystem calls made by the installation engine.
///
/// Implementations must be usable from a single synchronous run; the
/// `Send + Sync` bound lets callers keep one instance behind an `Arc`.
pub trait FileSystemOps: Send + Sync + std::fmt::Debug {
    /// Returns `true` if `path` exists on the filesystem.
    fn exists(&self, path: &Path) -> bool;

    /// Returns `true` if `path` is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Read the whole file at `path`, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error for any failure other than the file being absent.
    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>>;

    /// Permission bits of `path`, or `None` where the platform has none.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read.
    fn mode(&self, path: &Path) -> io::Result<Option<u32>>;

    /// Target of the symbolic link at `path`, or `None` if `path` is not a
    /// link (or does not exist).  The link itself is inspected, not followed.
    ///
    /// # Errors
    ///
    /// Returns an error if the link metadata cannot be read.
    fn read_link(&self, path: &Path) -> io::Result<Option<PathBuf>>;

    /// Create a symbolic link at `link` pointing to `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if `link` already exists or links are unsupported.
    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()>;

    /// Replace the file at `path` with `contents`.
    ///
    /// The write is atomic per file: readers see either the old or the new
    /// contents, never a prefix.  The parent directory must exist.  When
    /// `path` is a symbolic link the file it resolves to is replaced and the
    /// link is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created, written,
    /// or renamed over `path`.
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Set the permission bits of `path`.  A no-op where unsupported.
    ///
    /// # Errors
    ///
    /// Returns an error if the permissions cannot be changed.
    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Remove the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails, including when `path` is absent.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Create `path` and any missing ancestors.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Remove the empty directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is missing or not empty.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;

    /// Remove the directory at `path` and everything below it.
    ///
    /// # Errors
    ///
    /// Returns an error if any entry cannot be removed.
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// Follow symbolic links from `path` until a non-link path is reached.
///
/// Relative link targets are taken relative to the link's directory.  A
/// dangling link resolves to the path it names.
///
/// # Errors
///
/// Returns an error if a link cannot be read or the chain is longer than
/// [`MAX_LINK_HOPS`].
pub fn resolve_link(fs: &dyn FileSystemOps, path: &Path) -> io::Result<PathBuf> {
    let mut current = path.to_path_buf();
    for _ in 0..MAX_LINK_HOPS {
        let Some(target) = fs.read_link(&current)? else {
            return Ok(current);
        };
        current = match current.parent() {
            Some(parent) if target.is_relative() => parent.join(target),
            _ => target,
        };
    }
    Err(io::Error::other(format!(
        "too many levels of symbolic links at {}",
        path.display()
    )))
}

/// Production [`FileSystemOps`] implementation that delegates to [`std::fs`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFileSystemOps;

impl FileSystemOps for SystemFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn mode(&self, path: &Path) -> io::Result<Option<u32>> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let meta = std::fs::metadata(path)?;
            Ok(Some(meta.permissions().mode() & MODE_MASK))
        }

        #[cfg(not(unix))]
        {
            std::fs::metadata(path)?;
            Ok(None)
        }
    }

    fn read_link(&self, path: &Path) -> io::Result<Option<PathBuf>> {
        match std::fs::symlink_metadata(path) {
            Ok(meta) if meta.file_type().is_symlink() => std::fs::read_link(path).map(Some),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(target, link)
        }

        #[cfg(windows)]
        {
            std::os::windows::fs::symlink_file(target, link)
        }

        #[cfg(not(any(unix, windows)))]
        {
            let _ = (target, link);
            Err(io::Error::from(io::ErrorKind::Unsupported))
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        // Renaming over a link would replace it, so write where it points.
        let dest = resolve_link(self, path)?;
        let parent = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| e.error)?;
        Ok(())
    }

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & MODE_MASK))
        }

        #[cfg(not(unix))]
        {
            let _ = (path, mode);
            Ok(())
        }
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir_all(path)
    }
}

/// Operation selector for [`FaultyFileSystemOps`].
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOp {
    /// [`FileSystemOps::read`].
    Read,
    /// [`FileSystemOps::write`].
    Write,
    /// [`FileSystemOps::set_mode`].
    SetMode,
    /// [`FileSystemOps::remove_file`].
    RemoveFile,
    /// [`FileSystemOps::create_dir_all`].
    CreateDir,
    /// [`FileSystemOps::symlink`].
    Symlink,
}

/// Real filesystem with scripted failures, for rollback tests.
///
/// Each configured fault fails every call of one [`FsOp`] whose path starts
/// with the given prefix; all other calls reach [`SystemFileSystemOps`].
///
/// ```ignore
/// let fs = FaultyFileSystemOps::new().fail(FsOp::SetMode, target.hooks_dir());
/// ```
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Default)]
pub struct FaultyFileSystemOps {
    inner: SystemFileSystemOps,
    faults: Vec<(FsOp, PathBuf)>,
}

#[cfg(any(test, feature = "test-support"))]
impl FaultyFileSystemOps {
    /// Create a wrapper with no faults configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `op` for every path under `prefix`.
    #[must_use]
    pub fn fail(mut self, op: FsOp, prefix: impl Into<PathBuf>) -> Self {
        self.faults.push((op, prefix.into()));
        self
    }

    fn check(&self, op: FsOp, path: &Path) -> io::Result<()> {
        if self
            .faults
            .iter()
            .any(|(o, prefix)| *o == op && path.starts_with(prefix))
        {
            return Err(io::Error::other(format!(
                "injected {op:?} failure for {}",
                path.display()
            )));
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
impl FileSystemOps for FaultyFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path)
    }

    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        self.check(FsOp::Read, path)?;
        self.inner.read(path)
    }

    fn mode(&self, path: &Path) -> io::Result<Option<u32>> {
        self.inner.mode(path)
    }

    fn read_link(&self, path: &Path) -> io::Result<Option<PathBuf>> {
        self.inner.read_link(path)
    }

    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        self.check(FsOp::Symlink, link)?;
        self.inner.symlink(target, link)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.check(FsOp::Write, path)?;
        self.inner.write(path, contents)
    }

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        self.check(FsOp::SetMode, path)?;
        self.inner.set_mode(path, mode)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.check(FsOp::RemoveFile, path)?;
        self.inner.remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.check(FsOp::CreateDir, path)?;
        self.inner.create_dir_all(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_dir(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_dir_all(path)
    }
}
