//! Advisory directory locks

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::{Error, Result};

/// An exclusive advisory lock held on a lock file inside a directory.
///
/// The lock is released when the guard is dropped. The lock file itself is
/// left in place; its presence carries no meaning without the OS lock.
#[derive(Debug)]
pub struct DirLock {
    file: File,
    path: PathBuf,
}

impl DirLock {
    /// Try to take the lock without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockHeld`] if another process holds the lock.
    pub fn try_acquire(dir: &Path, name: &str) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        let path = dir.join(name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;

        file.try_lock_exclusive()
            .map_err(|_| Error::LockHeld { path: path.clone() })?;

        tracing::debug!(path = %path.display(), "acquired directory lock");
        Ok(Self { file, path })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
