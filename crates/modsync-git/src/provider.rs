//! [`ContentProvider`] backed by git hosting.

use std::path::{Path, PathBuf};
use std::time::Duration;

use git2::{ErrorClass, ErrorCode, Oid, Repository};

use modsync_core::store::IGNORED_ENTRIES;
use modsync_core::{ContentProvider, FetchedContent, ProviderError, ProviderResult, RemoteReference};

use crate::cache::RepositoryCache;
use crate::export::export_tree;
use crate::{Error, Result};

/// Fetches `{base_url}/{namespace}/{name}` at a branch, tag or commit.
///
/// Repositories are mirrored into a bare cache so repeated syncs only
/// transfer new objects. The content identifier is the commit id.
#[derive(Debug, Clone)]
pub struct GitProvider {
    base_url: String,
    cache: RepositoryCache,
}

impl GitProvider {
    pub fn new(base_url: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            cache: RepositoryCache::new(cache_dir),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cache(&self) -> &RepositoryCache {
        &self.cache
    }

    /// Repository url for a module.
    pub fn remote_url(&self, reference: &RemoteReference) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            reference.namespace(),
            reference.name()
        )
    }

    /// Local path of the repository when the base url is on disk.
    fn local_path(&self, reference: &RemoteReference) -> Option<PathBuf> {
        let base = self.base_url.strip_prefix("file://").unwrap_or(&self.base_url);
        let base = Path::new(base);
        base.is_absolute()
            .then(|| base.join(reference.namespace()).join(reference.name()))
    }

    /// Update the mirror and resolve the requested revision.
    fn sync_mirror(&self, reference: &RemoteReference, timeout: Duration) -> Result<(Repository, Oid)> {
        let url = self.remote_url(reference);
        if let Some(path) = self.local_path(reference)
            && !path.exists()
        {
            return Err(Error::RepositoryNotFound { url });
        }

        let repo = self.cache.open(reference.namespace(), reference.name(), &url)?;
        self.cache.update(&repo, &url, reference.revision(), timeout)?;
        let oid = RepositoryCache::resolve(&repo, &url, reference.revision())?;
        Ok((repo, oid))
    }

    fn checkout(&self, reference: &RemoteReference, dest: &Path, timeout: Duration) -> Result<String> {
        let (repo, oid) = self.sync_mirror(reference, timeout)?;
        let tree = repo.find_commit(oid)?.tree()?;
        export_tree(&repo, &tree, dest, &IGNORED_ENTRIES)?;
        tracing::debug!(module = %reference, commit = %oid, "exported commit");
        Ok(oid.to_string())
    }
}

impl ContentProvider for GitProvider {
    fn name(&self) -> &str {
        "git"
    }

    fn fetch(
        &self,
        reference: &RemoteReference,
        dest: &Path,
        timeout: Duration,
    ) -> ProviderResult<FetchedContent> {
        self.checkout(reference, dest, timeout)
            .map(FetchedContent::new)
            .map_err(|e| to_provider_error(reference, e))
    }

    fn resolve(&self, reference: &RemoteReference, timeout: Duration) -> ProviderResult<String> {
        self.sync_mirror(reference, timeout)
            .map(|(_, oid)| oid.to_string())
            .map_err(|e| to_provider_error(reference, e))
    }
}

fn to_provider_error(reference: &RemoteReference, error: Error) -> ProviderError {
    match error {
        Error::RepositoryNotFound { .. } | Error::RevisionNotFound { .. } => {
            ProviderError::not_found(reference, error.to_string())
        }
        Error::Timeout { after, .. } => ProviderError::timeout(reference, after),
        Error::Io { source, .. } => ProviderError::Io(source),
        Error::Fs(e) => ProviderError::Fs(e),
        Error::Git(e) if is_missing_remote(&e) => ProviderError::not_found(reference, e.message()),
        Error::Git(e) => ProviderError::network(reference, e.message()),
    }
}

fn is_missing_remote(error: &git2::Error) -> bool {
    error.code() == ErrorCode::NotFound
        || error.class() == ErrorClass::Repository
        || (error.class() == ErrorClass::Http
            && (error.message().contains("404") || error.message().contains("401")))
}
