//! Disposable working directory backing one service instance.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::TempDir;

const PREFIX: &str = "zookeeper";
const SUFFIX: &str = "inproc";

/// A freshly created, uniquely named directory.
///
/// Deleted recursively by [`WorkingDirectory::delete`] or, failing that,
/// when dropped.
#[derive(Debug)]
pub struct WorkingDirectory {
    path: PathBuf,
    dir: Mutex<Option<TempDir>>,
}

impl WorkingDirectory {
    /// Create a new directory under the system temp location.
    pub fn create() -> io::Result<Self> {
        Self::create_in(std::env::temp_dir())
    }

    pub fn create_in(parent: impl AsRef<Path>) -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(PREFIX)
            .suffix(SUFFIX)
            .tempdir_in(parent)?;
        let path = dir.path().to_path_buf();
        tracing::debug!(path = %path.display(), "Working directory created");
        Ok(Self {
            path,
            dir: Mutex::new(Some(dir)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the directory is still owned (not yet deleted).
    pub fn exists(&self) -> bool {
        self.dir.lock().map(|dir| dir.is_some()).unwrap_or(false)
    }

    /// Recursively delete the directory. Returns `false` if it was already
    /// deleted. Failures are logged.
    pub fn delete(&self) -> bool {
        let dir = match self.dir.lock() {
            Ok(mut dir) => dir.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(dir) = dir else {
            return false;
        };

        match dir.close() {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Working directory deleted"),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to delete working directory"
            ),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_carry_prefix_and_suffix() {
        let parent = tempfile::tempdir().unwrap();
        let dir = WorkingDirectory::create_in(parent.path()).unwrap();
        let name = dir.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(PREFIX));
        assert!(name.ends_with(SUFFIX));
        assert!(dir.path().is_dir());
    }

    #[test]
    fn delete_removes_contents_once() {
        let parent = tempfile::tempdir().unwrap();
        let dir = WorkingDirectory::create_in(parent.path()).unwrap();
        std::fs::create_dir_all(dir.path().join("version-2")).unwrap();
        std::fs::write(dir.path().join("version-2/log.1"), b"x").unwrap();

        assert!(dir.delete());
        assert!(!dir.path().exists());
        assert!(!dir.exists());
        assert!(!dir.delete());
    }

    #[test]
    fn two_directories_never_collide() {
        let parent = tempfile::tempdir().unwrap();
        let a = WorkingDirectory::create_in(parent.path()).unwrap();
        let b = WorkingDirectory::create_in(parent.path()).unwrap();
        assert_ne!(a.path(), b.path());
    }
}
