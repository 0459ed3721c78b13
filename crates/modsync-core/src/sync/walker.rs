//! Recursive resolution of declarations and their transitive dependencies

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use modsync_fs::NormalizedPath;

use crate::declaration::{DeclarationSource, DependencyDeclaration};
use crate::graph::DependencyGraph;
use crate::identifier::{LocalPackagePath, ModuleId, RemoteReference};
use crate::provider::{ContentProvider, FetchedContent, LocalProvider, ProviderError};
use crate::resolver::{self, Decision};
use crate::store::{ModuleStore, SyncMarker};
use crate::{Error, Result};

use super::engine::SyncOptions;
use super::report::{SyncAction, SyncReport, SyncResult, SyncWarning};

/// State of one sync invocation.
///
/// `active` is the chain of modules whose declarations are being walked;
/// meeting one of them again is a cycle. `resolved` holds the
/// `(module, revision)` pairs already requested; a repeat without overwrite
/// is reported against the resident marker. `installed` holds the pairs
/// written by this invocation, which even an overwriting repeat leaves alone,
/// and `walked` the resident pairs whose declarations were already followed.
/// `failures` remembers pairs that could not be fetched so repeats report the
/// same failure instead of retrying.
pub(super) struct Walker<'a> {
    store: &'a ModuleStore,
    provider: &'a dyn ContentProvider,
    local: LocalProvider,
    declarations: &'a dyn DeclarationSource,
    options: &'a SyncOptions,
    active: Vec<ModuleId>,
    resolved: HashSet<(ModuleId, String)>,
    installed: HashSet<(ModuleId, String)>,
    walked: HashSet<(ModuleId, String)>,
    failures: HashMap<(ModuleId, String), SyncAction>,
    graph: DependencyGraph,
    results: Vec<SyncResult>,
}

/// Where a declaration came from.
struct Origin<'p> {
    parent: Option<&'p ModuleId>,
    depth: usize,
}

impl<'a> Walker<'a> {
    pub(super) fn new(
        store: &'a ModuleStore,
        provider: &'a dyn ContentProvider,
        declarations: &'a dyn DeclarationSource,
        options: &'a SyncOptions,
    ) -> Self {
        Self {
            store,
            provider,
            local: LocalProvider::new(),
            declarations,
            options,
            active: Vec::new(),
            resolved: HashSet::new(),
            installed: HashSet::new(),
            walked: HashSet::new(),
            failures: HashMap::new(),
            graph: DependencyGraph::new(),
            results: Vec::new(),
        }
    }

    /// Process one top-level declaration and everything below it.
    pub(super) fn visit_root(&mut self, decl: &DependencyDeclaration) -> Result<()> {
        self.visit(
            decl,
            Origin {
                parent: None,
                depth: 0,
            },
        )
    }

    /// Finish the walk and order the modules dependency-first.
    pub(super) fn finish(self) -> Result<SyncReport> {
        let order = self.graph.topological_sort()?;
        Ok(SyncReport {
            results: self.results,
            order,
        })
    }

    fn timeout(&self) -> Duration {
        self.options.fetch_timeout
    }

    /// Local revisions bypass the configured remote.
    fn provider_for(&self, reference: &RemoteReference) -> &dyn ContentProvider {
        if reference.local_source().is_some() {
            &self.local
        } else {
            self.provider
        }
    }

    fn visit(&mut self, decl: &DependencyDeclaration, origin: Origin<'_>) -> Result<()> {
        let reference = decl.to_reference(&self.options.default_revision)?;
        check_local_source(self.store, &reference)?;
        let overwrite = decl.overwrite || self.options.overwrite_all;
        let id = reference.id().clone();

        if let Some(start) = self.active.iter().position(|active| active == &id) {
            let mut cycle = self.active[start..].to_vec();
            cycle.push(id);
            return Err(Error::CyclicDependency { cycle });
        }

        match origin.parent {
            Some(parent) => self.graph.add_edge(parent, &id),
            None => self.graph.add_node(id.clone()),
        }

        let path = reference.local_path();
        self.store.verify(&path)?;
        let marker = self.store.read_marker(&path)?;

        let requested = (id.clone(), reference.revision().to_string());
        let repeated = !self.resolved.insert(requested.clone());
        let fresh = self.installed.contains(&requested)
            && marker.as_ref().is_some_and(|m| m.revision == reference.revision());
        if self.failures.contains_key(&requested) || fresh || (repeated && !overwrite) {
            let action = match (self.failures.get(&requested), &marker) {
                (Some(failure), _) => failure.clone(),
                (None, Some(m)) if m.revision != reference.revision() => conflict(m, &reference),
                _ => SyncAction::Skipped,
            };
            tracing::debug!(module = %reference, "already resolved in this sync");
            self.record(&reference, &path, &origin, action, marker.as_ref(), Vec::new());
            return Ok(());
        }

        let decision = resolver::decide(marker.as_ref(), &reference, overwrite);
        let (action, resident, warnings) = self.apply(&reference, &path, marker, decision)?;
        match &action {
            SyncAction::Failed { .. } => {
                self.failures.insert(requested, action.clone());
            }
            SyncAction::Fetched | SyncAction::Overwritten => {
                self.installed.insert(requested);
            }
            _ => {}
        }
        let failed = matches!(action, SyncAction::Failed { .. });
        self.record(&reference, &path, &origin, action, resident.as_ref(), warnings);

        // The resident revision's declarations are what is on disk
        if !failed
            && let Some(resident) = resident
            && self.walked.insert((id.clone(), resident.revision.clone()))
        {
            self.walk_dependencies(&id, &path, origin.depth)?;
        }
        Ok(())
    }

    /// Carry out a resolver decision.
    ///
    /// Returns the action, the marker resident afterwards and any warnings.
    fn apply(
        &self,
        reference: &RemoteReference,
        path: &LocalPackagePath,
        marker: Option<SyncMarker>,
        decision: Decision,
    ) -> Result<(SyncAction, Option<SyncMarker>, Vec<SyncWarning>)> {
        let mut warnings = Vec::new();

        match decision {
            Decision::Skip => {
                if self.options.check_upstream
                    && let Some(current) = &marker
                {
                    return self.check_upstream(reference, path, current.clone());
                }
                if marker.is_some() && self.store.is_modified(path)? {
                    warnings.push(SyncWarning::LocallyModified);
                }
                Ok((SyncAction::Skipped, marker, warnings))
            }
            Decision::Conflict {
                resident,
                requested,
            } => {
                tracing::warn!(
                    module = %reference.id(),
                    %resident,
                    %requested,
                    "revision conflict, keeping resident revision"
                );
                if self.store.is_modified(path)? {
                    warnings.push(SyncWarning::LocallyModified);
                }
                Ok((
                    SyncAction::Conflict {
                        resident,
                        requested,
                    },
                    marker,
                    warnings,
                ))
            }
            Decision::Fetch | Decision::Refetch | Decision::Overwrite { .. } => {
                let discards_edits = marker.is_some() && self.store.is_modified(path)?;
                let success = if matches!(decision, Decision::Fetch) {
                    SyncAction::Fetched
                } else {
                    SyncAction::Overwritten
                };

                match self.fetch(reference, path)? {
                    Ok(installed) => {
                        if discards_edits {
                            tracing::warn!(module = %reference, "discarding local edits");
                            warnings.push(SyncWarning::DiscardedLocalEdits);
                        }
                        Ok((success, Some(installed), warnings))
                    }
                    Err(e) => Ok((failed(reference, &e), marker, warnings)),
                }
            }
        }
    }

    /// Ask the provider whether the resident revision moved upstream.
    fn check_upstream(
        &self,
        reference: &RemoteReference,
        path: &LocalPackagePath,
        marker: SyncMarker,
    ) -> Result<(SyncAction, Option<SyncMarker>, Vec<SyncWarning>)> {
        let modified = self.store.is_modified(path)?;
        let upstream = match self.provider_for(reference).resolve(reference, self.timeout()) {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::warn!(module = %reference, error = %e, "upstream check failed");
                let mut warnings = vec![SyncWarning::UpstreamUnreachable {
                    reason: e.to_string(),
                }];
                if modified {
                    warnings.push(SyncWarning::LocallyModified);
                }
                return Ok((SyncAction::Skipped, Some(marker), warnings));
            }
        };

        if upstream == marker.content_id {
            let warnings = if modified {
                vec![SyncWarning::LocallyModified]
            } else {
                Vec::new()
            };
            return Ok((SyncAction::Skipped, Some(marker), warnings));
        }

        if modified {
            tracing::warn!(
                module = %reference,
                from = %marker.content_id,
                to = %upstream,
                "upstream moved but local copy is modified, keeping it"
            );
            let warnings = vec![
                SyncWarning::UpstreamMoved {
                    from: marker.content_id.clone(),
                    to: upstream,
                    applied: false,
                },
                SyncWarning::LocallyModified,
            ];
            return Ok((SyncAction::Skipped, Some(marker), warnings));
        }

        match self.fetch(reference, path)? {
            Ok(installed) => {
                let warnings = vec![SyncWarning::UpstreamMoved {
                    from: marker.content_id.clone(),
                    to: installed.content_id.clone(),
                    applied: true,
                }];
                Ok((SyncAction::Overwritten, Some(installed), warnings))
            }
            Err(e) => Ok((failed(reference, &e), Some(marker), Vec::new())),
        }
    }

    /// Fetch into a staging tree and install it.
    ///
    /// The outer `Result` carries store failures, which abort the sync; the
    /// inner one carries provider failures, which only fail this module.
    fn fetch(
        &self,
        reference: &RemoteReference,
        path: &LocalPackagePath,
    ) -> Result<std::result::Result<SyncMarker, ProviderError>> {
        let provider = self.provider_for(reference);
        let staged = self.store.stage()?;
        tracing::info!(module = %reference, provider = provider.name(), "fetching");

        let fetched: FetchedContent =
            match provider.fetch(reference, staged.path(), self.timeout()) {
                Ok(fetched) => fetched,
                Err(e) => return Ok(Err(e)),
            };

        if let Some(canonical) = &fetched.canonical
            && canonical != reference.id()
        {
            return Ok(Err(ProviderError::not_found(
                reference,
                format!("remote serves this content as {canonical}"),
            )));
        }

        let marker = self.store.install(reference, staged, &fetched.content_id)?;
        tracing::info!(
            module = %reference,
            content_id = %marker.content_id,
            path = %path,
            "installed"
        );
        Ok(Ok(marker))
    }

    fn walk_dependencies(
        &mut self,
        id: &ModuleId,
        path: &LocalPackagePath,
        depth: usize,
    ) -> Result<()> {
        let package_dir = self.store.package_dir(path);
        let declarations = self.declarations.declarations(&package_dir)?;
        if declarations.is_empty() {
            return Ok(());
        }
        tracing::debug!(module = %id, count = declarations.len(), "walking declared dependencies");

        self.active.push(id.clone());
        let walked = declarations.iter().try_for_each(|decl| {
            self.visit(
                decl,
                Origin {
                    parent: Some(id),
                    depth: depth + 1,
                },
            )
        });
        self.active.pop();
        walked
    }

    fn record(
        &mut self,
        reference: &RemoteReference,
        path: &LocalPackagePath,
        origin: &Origin<'_>,
        action: SyncAction,
        resident: Option<&SyncMarker>,
        warnings: Vec<SyncWarning>,
    ) {
        self.results.push(SyncResult {
            module: reference.id().clone(),
            requested_revision: reference.revision().to_string(),
            resolved_revision: resident.map(|m| m.revision.clone()),
            action,
            content_id: resident.map(|m| m.content_id.clone()),
            local_path: path.as_relative(),
            requested_by: origin.parent.cloned(),
            depth: origin.depth,
            warnings,
        });
    }
}

/// Reject a local revision that is not a directory, or whose directory lies
/// inside or contains the sync root.
pub(super) fn check_local_source(store: &ModuleStore, reference: &RemoteReference) -> Result<()> {
    let Some(source) = reference.local_source() else {
        return Ok(());
    };
    let invalid = |reason: &str| Error::InvalidLocalRevision {
        reference: reference.to_string(),
        reason: reason.to_string(),
    };
    if source.exists() && !source.is_dir() {
        return Err(invalid("path is not a directory"));
    }

    let source = resolved(source);
    let root = resolved(&store.root().to_native());
    if source.starts_with(&root) {
        return Err(invalid("directory lies inside the sync root"));
    }
    if root.starts_with(&source) {
        return Err(invalid("directory contains the sync root"));
    }
    Ok(())
}

fn resolved(path: &Path) -> PathBuf {
    match NormalizedPath::new(path).canonicalize() {
        Ok(canonical) => canonical.to_native(),
        Err(_) => std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}

fn conflict(marker: &SyncMarker, reference: &RemoteReference) -> SyncAction {
    SyncAction::Conflict {
        resident: marker.revision.clone(),
        requested: reference.revision().to_string(),
    }
}

fn failed(reference: &RemoteReference, error: &ProviderError) -> SyncAction {
    tracing::warn!(module = %reference, error = %error, "fetch failed, resident content untouched");
    SyncAction::Failed {
        kind: error.kind(),
        reason: error.to_string(),
    }
}
