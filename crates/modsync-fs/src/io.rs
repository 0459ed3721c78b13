//! Atomic I/O operations with file locking

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use fs2::FileExt;

use crate::{Error, NormalizedPath, Result};

/// Retry policy for renames that can fail transiently.
///
/// Virus scanners and indexers on Windows briefly hold handles on freshly
/// written files, which makes `rename` fail with `PermissionDenied`. Those
/// failures are retried with exponential backoff up to `max_elapsed`.
#[derive(Debug, Clone, Copy)]
pub struct RobustnessConfig {
    /// Delay before the first retry
    pub initial_interval: Duration,
    /// Give up once this much time has passed
    pub max_elapsed: Duration,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(20),
            max_elapsed: Duration::from_secs(2),
        }
    }
}

impl RobustnessConfig {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            initial_interval: Duration::from_millis(1),
            max_elapsed: Duration::ZERO,
        }
    }
}

/// Rename `from` to `to`, retrying transient permission failures.
pub fn rename_with_retry(from: &Path, to: &Path, robustness: RobustnessConfig) -> Result<()> {
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(robustness.initial_interval)
        .with_max_elapsed_time(Some(robustness.max_elapsed))
        .build();

    backoff::retry(policy, || {
        fs::rename(from, to).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => backoff::Error::transient(e),
            _ => backoff::Error::permanent(e),
        })
    })
    .map_err(|e| match e {
        backoff::Error::Permanent(source) | backoff::Error::Transient { err: source, .. } => {
            Error::io(to, source)
        }
    })
}

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename strategy to prevent partial writes.
/// Acquires an advisory lock on the temp file while writing.
pub fn write_atomic(path: &NormalizedPath, content: &[u8], robustness: RobustnessConfig) -> Result<()> {
    let native_path = path.to_native();

    if let Some(parent) = native_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    // Same directory as the target so the rename never crosses filesystems
    let temp_name = format!(
        ".{}.{}.tmp",
        native_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = native_path.with_file_name(&temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file.lock_exclusive().map_err(|_| Error::LockFailed {
        path: native_path.clone(),
    })?;

    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;
    temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;

    temp_file.unlock().map_err(|_| Error::LockFailed {
        path: native_path.clone(),
    })?;
    drop(temp_file);

    if let Err(e) = rename_with_retry(&temp_path, &native_path, robustness) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    Ok(())
}

/// Read text content from a file.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native_path = path.to_native();
    fs::read_to_string(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// Write text content to a file atomically with the default retry policy.
pub fn write_text(path: &NormalizedPath, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes(), RobustnessConfig::default())
}

/// Recursively copy the directory `src` into `dst`.
///
/// Entries whose file name appears in `skip` are not copied (at any depth).
/// Symlinks are copied as the files they point to.
pub fn copy_tree(src: &Path, dst: &Path, skip: &[&str]) -> Result<()> {
    fs::create_dir_all(dst).map_err(|e| Error::io(dst, e))?;

    for entry in fs::read_dir(src).map_err(|e| Error::io(src, e))? {
        let entry = entry.map_err(|e| Error::io(src, e))?;
        let name = entry.file_name();
        if skip.iter().any(|s| name.to_string_lossy() == *s) {
            continue;
        }
        let from = entry.path();
        let to = dst.join(&name);
        if from.is_dir() {
            copy_tree(&from, &to, skip)?;
        } else {
            fs::copy(&from, &to).map_err(|e| Error::io(&from, e))?;
        }
    }

    Ok(())
}

/// Remove a directory tree if it exists.
pub fn remove_tree(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}
