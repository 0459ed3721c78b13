//! In-memory provider for embedding and tests.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use modsync_fs::checksum;

use super::{ContentProvider, FailureKind, FetchedContent, ProviderError, ProviderResult};
use crate::Result;
use crate::identifier::{ModuleId, RemoteReference};

/// A remote that lives in memory.
///
/// Clones share state, so a test can keep a handle, hand a clone to the
/// engine, and later republish content or inspect fetch counts.
///
/// ```
/// use modsync_core::MemoryProvider;
///
/// let remote = MemoryProvider::new();
/// remote.publish("saibo/Chat", "main", &[("flow.py", "print('hi')")]).unwrap();
/// assert_eq!(remote.fetch_count("saibo/Chat"), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    published: HashMap<(ModuleId, String), Published>,
    failures: HashMap<ModuleId, FailureKind>,
    canonical: HashMap<ModuleId, ModuleId>,
    fetches: HashMap<ModuleId, usize>,
}

#[derive(Debug, Clone)]
struct Published {
    files: BTreeMap<String, String>,
    content_id: String,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish (or republish) `files` as `url` at `revision`.
    ///
    /// Returns the content id fetches of this revision will report.
    pub fn publish(&self, url: &str, revision: &str, files: &[(&str, &str)]) -> Result<String> {
        let reference = RemoteReference::parse(url, revision)?;
        let files: BTreeMap<String, String> = files
            .iter()
            .map(|(path, content)| (path.to_string(), content.to_string()))
            .collect();

        let mut digest = String::new();
        for (path, content) in &files {
            digest.push_str(path);
            digest.push('\0');
            digest.push_str(content);
            digest.push('\0');
        }
        let content_id = checksum::compute_content_checksum(&digest);

        self.state().published.insert(
            (reference.id().clone(), revision.to_string()),
            Published {
                files,
                content_id: content_id.clone(),
            },
        );
        Ok(content_id)
    }

    /// Make every request for `url` fail with `kind` until cleared.
    pub fn fail_with(&self, url: &str, kind: FailureKind) -> Result<()> {
        let id = ModuleId::parse(url)?;
        self.state().failures.insert(id, kind);
        Ok(())
    }

    pub fn clear_failure(&self, url: &str) -> Result<()> {
        let id = ModuleId::parse(url)?;
        self.state().failures.remove(&id);
        Ok(())
    }

    /// Report `canonical` as the identity of content served for `url`.
    pub fn rename_canonical(&self, url: &str, canonical: &str) -> Result<()> {
        let id = ModuleId::parse(url)?;
        let canonical = ModuleId::parse(canonical)?;
        self.state().canonical.insert(id, canonical);
        Ok(())
    }

    /// Number of fetch attempts made for `url`.
    pub fn fetch_count(&self, url: &str) -> usize {
        ModuleId::parse(url)
            .ok()
            .and_then(|id| self.state().fetches.get(&id).copied())
            .unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.state().fetches.values().sum()
    }

    fn lookup(&self, reference: &RemoteReference) -> ProviderResult<Published> {
        let state = self.state();
        if let Some(kind) = state.failures.get(reference.id()) {
            return Err(match kind {
                FailureKind::NotFound => ProviderError::not_found(reference, "unavailable"),
                FailureKind::Network => ProviderError::network(reference, "connection refused"),
                FailureKind::Timeout => ProviderError::timeout(reference, Duration::ZERO),
                FailureKind::Io => ProviderError::Io(std::io::Error::other("simulated I/O failure")),
            });
        }
        state
            .published
            .get(&(reference.id().clone(), reference.revision().to_string()))
            .cloned()
            .ok_or_else(|| ProviderError::not_found(reference, "revision was never published"))
    }
}

impl ContentProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch(
        &self,
        reference: &RemoteReference,
        dest: &Path,
        _timeout: Duration,
    ) -> ProviderResult<FetchedContent> {
        *self
            .state()
            .fetches
            .entry(reference.id().clone())
            .or_default() += 1;

        let published = self.lookup(reference)?;
        for (path, content) in &published.files {
            let target = dest.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, content)?;
        }

        let mut fetched = FetchedContent::new(published.content_id);
        if let Some(canonical) = self.state().canonical.get(reference.id()) {
            fetched = fetched.with_canonical(canonical.clone());
        }
        Ok(fetched)
    }

    fn resolve(&self, reference: &RemoteReference, _timeout: Duration) -> ProviderResult<String> {
        Ok(self.lookup(reference)?.content_id)
    }
}
