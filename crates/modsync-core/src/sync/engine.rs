//! SyncEngine implementation
//!
//! The engine is the public entry point: it validates a declaration list,
//! locks the sync root, and drives the walker over every declaration in
//! order. Later declarations observe the markers written by earlier ones.

use std::time::Duration;

use crate::declaration::{DeclarationSource, DependencyDeclaration, ManifestDeclarations};
use crate::identifier::{DEFAULT_REVISION, from_local_path};
use crate::provider::ContentProvider;
use crate::store::ModuleStore;
use crate::{Error, Result};

use super::check::{CheckReport, ModuleState, ModuleStatus};
use super::report::SyncReport;
use super::walker::{Walker, check_local_source};

/// Options for a sync invocation
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Treat every declaration as if it requested overwrite
    pub overwrite_all: bool,
    /// Ask the provider whether resident revisions moved upstream
    pub check_upstream: bool,
    /// Revision used for declarations that name none
    pub default_revision: String,
    /// Deadline handed to every provider call
    pub fetch_timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            overwrite_all: false,
            check_upstream: false,
            default_revision: DEFAULT_REVISION.to_string(),
            fetch_timeout: Duration::from_secs(120),
        }
    }
}

/// Engine for syncing remote modules into a [`ModuleStore`]
pub struct SyncEngine {
    store: ModuleStore,
    provider: Box<dyn ContentProvider>,
    declarations: Box<dyn DeclarationSource>,
    options: SyncOptions,
}

impl SyncEngine {
    /// Create an engine reading module declarations from `modsync.toml`
    /// files inside synced packages.
    pub fn new(store: ModuleStore, provider: impl ContentProvider + 'static) -> Self {
        Self {
            store,
            provider: Box::new(provider),
            declarations: Box::new(ManifestDeclarations::new()),
            options: SyncOptions::default(),
        }
    }

    pub fn with_declaration_source(mut self, source: impl DeclarationSource + 'static) -> Self {
        self.declarations = Box::new(source);
        self
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &ModuleStore {
        &self.store
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Sync `declarations` and everything they transitively declare.
    ///
    /// Conflicts and provider failures are reported per declaration in the
    /// returned [`SyncReport`].
    ///
    /// # Errors
    ///
    /// Fails on a malformed identifier or an unusable local revision
    /// (top-level ones are checked before anything is written), a dependency
    /// cycle, a partially written package,
    /// a held session lock, or a store I/O failure.
    pub fn sync_dependencies(&self, declarations: &[DependencyDeclaration]) -> Result<SyncReport> {
        for decl in declarations {
            let reference = decl.to_reference(&self.options.default_revision)?;
            check_local_source(&self.store, &reference)?;
        }

        let _lock = self.store.open_session()?;
        tracing::info!(
            root = %self.store.root(),
            count = declarations.len(),
            "syncing dependencies"
        );

        let mut walker = Walker::new(
            &self.store,
            self.provider.as_ref(),
            self.declarations.as_ref(),
            &self.options,
        );
        for decl in declarations {
            walker.visit_root(decl)?;
        }
        let report = walker.finish()?;

        let counts = report.counts();
        tracing::info!(
            fetched = counts.fetched,
            skipped = counts.skipped,
            overwritten = counts.overwritten,
            conflicts = counts.conflicts,
            failed = counts.failed,
            "sync finished"
        );
        Ok(report)
    }

    /// Report the state of every package under the sync root.
    ///
    /// Read-only: nothing is locked, fetched or repaired.
    pub fn check(&self) -> Result<CheckReport> {
        let mut report = CheckReport::healthy();

        for path in self.store.package_paths()? {
            let module = from_local_path(&path).ok();
            let mut status = ModuleStatus {
                path: path.as_relative(),
                module,
                revision: None,
                content_id: None,
                state: ModuleState::Pristine,
                detail: None,
            };

            match self.store.verify(&path) {
                Ok(()) => {}
                Err(Error::PartialWriteDetected { detail, .. }) => {
                    status.state = ModuleState::Broken;
                    status.detail = Some(detail);
                    report.push(status);
                    continue;
                }
                Err(e) => return Err(e),
            }

            // Empty leftover directory, nothing resident
            let Some(marker) = self.store.read_marker(&path)? else {
                continue;
            };
            if self.store.is_modified(&path)? {
                status.state = ModuleState::Modified;
                status.detail = Some("local edits since last sync".to_string());
            }
            status.revision = Some(marker.revision);
            status.content_id = Some(marker.content_id);
            report.push(status);
        }

        Ok(report)
    }
}
