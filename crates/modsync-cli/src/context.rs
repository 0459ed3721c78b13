//! Project context detection
//!
//! Locates the manifest from any directory inside a project, git-style, and
//! builds the store, provider and engine it describes.

use std::path::{Path, PathBuf};

use modsync_core::{
    ContentProvider, DirectoryProvider, MANIFEST_CANDIDATES, Manifest, ModuleStore, SourceKind,
    SyncEngine,
};
use modsync_fs::NormalizedPath;
use modsync_git::GitProvider;

use crate::error::{CliError, Result};

/// Walk up from `cwd` looking for a manifest.
pub fn find_manifest(cwd: &Path) -> Option<PathBuf> {
    cwd.ancestors().find_map(|dir| {
        MANIFEST_CANDIDATES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

/// A loaded manifest and the directory it lives in.
#[derive(Debug)]
pub struct Project {
    pub manifest_dir: PathBuf,
    pub manifest: Manifest,
}

impl Project {
    /// Load the project from an explicit manifest path or by searching
    /// upwards from `cwd`.
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        let path = match explicit {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => cwd.join(path),
            None => find_manifest(cwd).ok_or_else(|| {
                CliError::user(format!(
                    "No modsync.toml found in {} or any parent directory",
                    cwd.display()
                ))
            })?,
        };
        if !path.is_file() {
            return Err(CliError::user(format!(
                "Manifest not found: {}",
                path.display()
            )));
        }

        let path = NormalizedPath::new(&path).canonicalize()?;
        let manifest = Manifest::load(&path)?;
        let manifest_dir = path
            .parent()
            .map(|dir| dir.to_native())
            .unwrap_or_else(|| cwd.to_path_buf());
        tracing::debug!(manifest = %path, "loaded manifest");

        Ok(Self {
            manifest_dir,
            manifest,
        })
    }

    pub fn store(&self) -> ModuleStore {
        self.manifest.open_store(&self.manifest_dir)
    }

    /// Provider for the manifest's `[source]`.
    pub fn provider(&self) -> Box<dyn ContentProvider> {
        let source = self.manifest.source();
        match source.kind {
            SourceKind::Git => Box::new(GitProvider::new(
                source.url.clone(),
                source.cache_dir(&self.manifest_dir),
            )),
            SourceKind::Directory => {
                Box::new(DirectoryProvider::new(source.directory(&self.manifest_dir)))
            }
        }
    }

    pub fn engine(&self) -> SyncEngine {
        SyncEngine::new(self.store(), self.provider()).with_options(self.manifest.options())
    }
}
