//! Dependency declarations and where they come from
//!
//! Top-level declarations are handed to the engine by the caller. Transitive
//! declarations are read from inside synced packages through a
//! [`DeclarationSource`]; the default source reads the `[[dependencies]]`
//! array of a manifest file at the package root.

use std::path::Path;

use serde::{Deserialize, Serialize};

use modsync_fs::{ConfigStore, NormalizedPath};

use crate::config::{MANIFEST_CANDIDATES, Manifest};
use crate::identifier::{RemoteReference, is_local_revision, resolve_local_revision};
use crate::{Error, Result};

/// One requested dependency: `{url, revision?, overwrite?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDeclaration {
    /// `namespace/name`
    pub url: String,
    /// Branch, tag, commit or local directory; the configured default
    /// revision when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Discard the resident copy and restore pristine remote content
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub overwrite: bool,
}

impl DependencyDeclaration {
    /// Declare `url` at an explicit revision.
    pub fn new(url: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            revision: Some(revision.into()),
            overwrite: false,
        }
    }

    /// Declare `url` at the default revision.
    pub fn latest(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            revision: None,
            overwrite: false,
        }
    }

    /// Request overwrite semantics for this declaration.
    pub fn with_overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    /// Resolve a relative local-directory revision against `base`.
    ///
    /// Remote revisions and absolute paths are left alone.
    pub fn anchor_local_revision(&mut self, base: &Path) {
        if let Some(revision) = &self.revision
            && is_local_revision(revision)
            && Path::new(revision).is_relative()
        {
            self.revision = Some(resolve_local_revision(revision, base));
        }
    }

    /// Validate into a [`RemoteReference`].
    ///
    /// Local-directory revisions come out absolute; relative ones not yet
    /// anchored are taken from the current directory.
    pub fn to_reference(&self, default_revision: &str) -> Result<RemoteReference> {
        let revision = self.revision.as_deref().unwrap_or(default_revision);
        if !is_local_revision(revision) {
            return RemoteReference::parse(&self.url, revision);
        }

        let base = if Path::new(revision).is_relative() {
            std::env::current_dir().map_err(|e| Error::MalformedIdentifier {
                input: format!("{}:{revision}", self.url),
                reason: format!("cannot resolve relative local revision: {e}"),
            })?
        } else {
            Default::default()
        };
        RemoteReference::parse(&self.url, &resolve_local_revision(revision, &base))
    }
}

/// Supplies the dependencies a synced module declares for itself.
pub trait DeclarationSource {
    /// Read the declarations of the package materialized at `package_dir`.
    ///
    /// A package that declares nothing yields an empty list.
    fn declarations(&self, package_dir: &NormalizedPath) -> Result<Vec<DependencyDeclaration>>;
}

/// Reads `[[dependencies]]` from the first manifest file found at the
/// package root (`modsync.toml`, `modsync.json`, `modsync.yaml`).
#[derive(Debug, Default)]
pub struct ManifestDeclarations {
    store: ConfigStore,
}

impl ManifestDeclarations {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeclarationSource for ManifestDeclarations {
    fn declarations(&self, package_dir: &NormalizedPath) -> Result<Vec<DependencyDeclaration>> {
        let Some(path) = MANIFEST_CANDIDATES
            .iter()
            .map(|name| package_dir.join(name))
            .find(|p| p.is_file())
        else {
            return Ok(Vec::new());
        };

        let manifest = Manifest::read(&self.store, &path)?;
        tracing::debug!(
            manifest = %path,
            count = manifest.dependencies.len(),
            "read module declarations"
        );
        Ok(manifest.dependencies)
    }
}
