//! Sync and namespace-resolution engine for modsync
//!
//! Materializes remote, versioned modules as importable packages under a
//! single sync root:
//!
//! - **Identifier codec**: `namespace/name` + revision to a language-safe
//!   package path (`1234/MyModule` becomes `user_1234/MyModule`)
//! - **Module store**: package directories with a per-package sync marker,
//!   installed by stage-then-rename
//! - **Conflict resolver**: fetch, skip, refetch, conflict or overwrite
//! - **Walker**: transitive dependencies with cycle detection and
//!   memoization
//! - **SyncEngine**: the entry point, reporting one structured result per
//!   declaration
//!
//! # Architecture
//!
//! ```text
//!              modsync-cli
//!                   |
//!             modsync-core ---- modsync-git (GitProvider)
//!                   |
//!              modsync-fs
//! ```
//!
//! # Example
//!
//! ```no_run
//! use modsync_core::{DependencyDeclaration, MemoryProvider, ModuleStore, SyncEngine};
//! use modsync_fs::NormalizedPath;
//!
//! fn example() -> modsync_core::Result<()> {
//!     let remote = MemoryProvider::new();
//!     remote.publish("saibo/Chat", "main", &[("flow.py", "")])?;
//!
//!     let store = ModuleStore::new(NormalizedPath::new("synced_modules"));
//!     let engine = SyncEngine::new(store, remote);
//!     let report = engine.sync_dependencies(&[DependencyDeclaration::latest("saibo/Chat")])?;
//!     assert!(!report.has_failures());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod declaration;
pub mod error;
pub mod graph;
pub mod identifier;
pub mod provider;
pub mod resolver;
pub mod store;
pub mod sync;

pub use config::{
    DEFAULT_SOURCE_URL, MANIFEST_CANDIDATES, MANIFEST_FILENAME, Manifest, SourceKind, SourceSection,
    SyncSection,
};
pub use declaration::{DeclarationSource, DependencyDeclaration, ManifestDeclarations};
pub use error::{Error, Result};
pub use graph::DependencyGraph;
pub use identifier::{
    DEFAULT_REVISION, LocalPackagePath, ModuleId, NAMESPACE_ESCAPE_PREFIX, RemoteReference,
    from_local_path, is_local_revision, resolve_local_revision, to_local_path,
};
pub use provider::{
    ContentProvider, DirectoryProvider, FailureKind, FetchedContent, LocalProvider,
    MemoryProvider, ProviderError, ProviderResult,
};
pub use resolver::{Decision, decide};
pub use store::{MARKER_FILENAME, ModuleStore, StagedTree, SyncMarker};
pub use sync::{
    ActionCounts, CheckReport, CheckStatus, ModuleState, ModuleStatus, SyncAction, SyncEngine,
    SyncOptions, SyncReport, SyncResult, SyncWarning,
};
