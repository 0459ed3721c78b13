//! Error types for modsync-core
//!
//! Only structural failures are errors here. Per-module problems (revision
//! conflicts, provider failures) are reported as values in the
//! [`SyncReport`](crate::SyncReport) so one broken dependency cannot block
//! unrelated ones.

use std::fmt::Write as _;
use std::path::PathBuf;

use crate::identifier::ModuleId;

/// Result type for modsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a whole sync invocation
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A dependency url or revision has an invalid shape
    #[error("Malformed identifier '{input}': {reason}")]
    MalformedIdentifier { input: String, reason: String },

    /// A local-directory revision points at something that cannot be synced
    #[error("Invalid local revision '{reference}': {reason}")]
    InvalidLocalRevision { reference: String, reason: String },

    /// A module (transitively) depends on itself
    #[error("Cyclic dependency: {}", format_cycle(.cycle))]
    CyclicDependency { cycle: Vec<ModuleId> },

    /// A package directory and its marker disagree; the store is corrupt
    #[error("Partial write detected at {path}: {detail}")]
    PartialWriteDetected { path: PathBuf, detail: String },

    /// A manifest or declaration file could not be used
    #[error("Invalid manifest {path}: {message}")]
    InvalidManifest { path: PathBuf, message: String },

    /// Filesystem error from modsync-fs
    #[error(transparent)]
    Fs(#[from] modsync_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

fn format_cycle(cycle: &[ModuleId]) -> String {
    let mut out = String::new();
    for (i, id) in cycle.iter().enumerate() {
        if i > 0 {
            out.push_str(" -> ");
        }
        let _ = write!(out, "{id}");
    }
    out
}
