//! Error types for modsync-git

use std::path::PathBuf;
use std::time::Duration;

/// Result type for modsync-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while fetching from git
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Filesystem error: {0}")]
    Fs(#[from] modsync_fs::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Repository not found: {url}")]
    RepositoryNotFound { url: String },

    #[error("Revision '{revision}' not found in {url}")]
    RevisionNotFound { url: String, revision: String },

    #[error("Transfer from {url} aborted after {}s", .after.as_secs())]
    Timeout { url: String, after: Duration },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
