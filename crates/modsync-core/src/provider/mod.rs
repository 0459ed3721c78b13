//! Remote content providers
//!
//! A provider turns a [`RemoteReference`] into a file tree. The engine hands
//! it a staging directory on the sync root's filesystem; the provider fills
//! it and reports the content identifier it fetched (commit id or content
//! hash). Provider failures never abort a sync; they become `Failed`
//! results for the affected declaration.

mod directory;
mod local;
mod memory;

pub use directory::DirectoryProvider;
pub use local::LocalProvider;
pub use memory::MemoryProvider;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::identifier::{ModuleId, RemoteReference};

/// Result type for provider operations
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// What a successful fetch produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    /// Commit id or content hash of the fetched tree
    pub content_id: String,
    /// Identity the remote reports for the content, when it knows one.
    /// A value differing from the requested module means the request was
    /// answered by another module (e.g. a redirect) and is rejected.
    pub canonical: Option<ModuleId>,
}

impl FetchedContent {
    pub fn new(content_id: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            canonical: None,
        }
    }

    pub fn with_canonical(mut self, canonical: ModuleId) -> Self {
        self.canonical = Some(canonical);
        self
    }
}

/// Source of remote module content.
pub trait ContentProvider {
    /// Short name used in logs (e.g. `git`, `directory`).
    fn name(&self) -> &str;

    /// Materialize `reference` into the empty directory `dest`.
    ///
    /// `dest` may be left partially filled on error; the caller discards it.
    fn fetch(
        &self,
        reference: &RemoteReference,
        dest: &Path,
        timeout: Duration,
    ) -> ProviderResult<FetchedContent>;

    /// Current content identifier of `reference` without fetching it.
    fn resolve(&self, reference: &RemoteReference, timeout: Duration) -> ProviderResult<String>;
}

impl<P: ContentProvider + ?Sized> ContentProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(
        &self,
        reference: &RemoteReference,
        dest: &Path,
        timeout: Duration,
    ) -> ProviderResult<FetchedContent> {
        (**self).fetch(reference, dest, timeout)
    }

    fn resolve(&self, reference: &RemoteReference, timeout: Duration) -> ProviderResult<String> {
        (**self).resolve(reference, timeout)
    }
}

/// Errors a provider may report
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Module or revision does not exist at the remote
    #[error("{reference} not found: {detail}")]
    NotFound { reference: String, detail: String },

    /// Remote could not be reached or refused the transfer
    #[error("network error fetching {reference}: {message}")]
    Network { reference: String, message: String },

    /// Fetch did not finish within the caller's timeout
    #[error("fetching {reference} timed out after {}s", .after.as_secs())]
    Timeout { reference: String, after: Duration },

    /// Local I/O while materializing content
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Filesystem error from modsync-fs
    #[error(transparent)]
    Fs(#[from] modsync_fs::Error),
}

impl ProviderError {
    pub fn not_found(reference: &RemoteReference, detail: impl Into<String>) -> Self {
        Self::NotFound {
            reference: reference.to_string(),
            detail: detail.into(),
        }
    }

    pub fn network(reference: &RemoteReference, message: impl Into<String>) -> Self {
        Self::Network {
            reference: reference.to_string(),
            message: message.into(),
        }
    }

    pub fn timeout(reference: &RemoteReference, after: Duration) -> Self {
        Self::Timeout {
            reference: reference.to_string(),
            after,
        }
    }

    /// Classification recorded in the sync report.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::Network { .. } => FailureKind::Network,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Io(_) | Self::Fs(_) => FailureKind::Io,
        }
    }
}

/// Why a declaration could not be synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    Network,
    Timeout,
    Io,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::NotFound => "not found",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Io => "io",
        };
        f.write_str(label)
    }
}
