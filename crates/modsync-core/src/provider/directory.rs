//! Local mirror provider: `{base}/{namespace}/{name}/{revision}/`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use modsync_fs::{NormalizedPath, checksum, io};

use super::{ContentProvider, FetchedContent, ProviderError, ProviderResult};
use crate::identifier::RemoteReference;
use crate::store::IGNORED_ENTRIES;

/// Serves modules from a directory tree, one subdirectory per revision.
///
/// Revisions containing `/` (e.g. `release/1.0`) map to nested directories.
/// The content identifier is the checksum of the revision tree.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    base: PathBuf,
}

impl DirectoryProvider {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn locate(&self, reference: &RemoteReference) -> ProviderResult<PathBuf> {
        let candidate = NormalizedPath::new(&self.base)
            .join(reference.namespace())
            .join(reference.name())
            .join(reference.revision());
        if !candidate.is_dir() {
            return Err(ProviderError::not_found(
                reference,
                format!("no directory at {candidate}"),
            ));
        }
        Ok(candidate.canonicalize()?.to_native())
    }
}

impl ContentProvider for DirectoryProvider {
    fn name(&self) -> &str {
        "directory"
    }

    fn fetch(
        &self,
        reference: &RemoteReference,
        dest: &Path,
        _timeout: Duration,
    ) -> ProviderResult<FetchedContent> {
        let source = self.locate(reference)?;
        io::copy_tree(&source, dest, &IGNORED_ENTRIES)?;
        let content_id = checksum::compute_tree_checksum(dest, &IGNORED_ENTRIES)?;
        tracing::debug!(module = %reference, source = %source.display(), "copied from mirror");
        Ok(FetchedContent::new(content_id))
    }

    fn resolve(&self, reference: &RemoteReference, _timeout: Duration) -> ProviderResult<String> {
        let source = self.locate(reference)?;
        Ok(checksum::compute_tree_checksum(&source, &IGNORED_ENTRIES)?)
    }
}
