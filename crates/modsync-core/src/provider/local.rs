//! Local-directory revisions: `revision = "/path/to/module"`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use modsync_fs::{NormalizedPath, checksum, io};

use super::{ContentProvider, FetchedContent, ProviderError, ProviderResult};
use crate::identifier::RemoteReference;
use crate::store::IGNORED_ENTRIES;

/// Copies a module from the directory its revision names.
///
/// The engine routes every local revision here regardless of the configured
/// remote. The content identifier is the checksum of the source tree, so an
/// upstream check notices edits made at the source.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProvider;

impl LocalProvider {
    pub fn new() -> Self {
        Self
    }

    fn locate(&self, reference: &RemoteReference) -> ProviderResult<PathBuf> {
        let Some(source) = reference.local_source() else {
            return Err(ProviderError::not_found(
                reference,
                "revision does not name a local directory",
            ));
        };
        if !source.is_dir() {
            return Err(ProviderError::not_found(
                reference,
                format!("no directory at {}", source.display()),
            ));
        }
        Ok(NormalizedPath::new(source).canonicalize()?.to_native())
    }
}

impl ContentProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
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
        tracing::debug!(module = %reference, source = %source.display(), "copied local revision");
        Ok(FetchedContent::new(content_id))
    }

    fn resolve(&self, reference: &RemoteReference, _timeout: Duration) -> ProviderResult<String> {
        let source = self.locate(reference)?;
        Ok(checksum::compute_tree_checksum(&source, &IGNORED_ENTRIES)?)
    }
}
