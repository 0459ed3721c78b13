//! Project manifest (`modsync.toml`)
//!
//! ```toml
//! [sync]
//! root = "synced_modules"
//! default_revision = "main"
//! fetch_timeout_secs = 120
//! init_file = "__init__.py"
//! gitignore = true
//! check_upstream = false
//!
//! [source]
//! kind = "git"
//! url = "https://huggingface.co"
//!
//! [[dependencies]]
//! url = "saibo/ChatFlowModule"
//! revision = "main"
//! ```
//!
//! Every section is optional. The same file format placed at the root of a
//! synced package declares that package's own dependencies; only the
//! `[[dependencies]]` array is read in that case.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use modsync_fs::{ConfigStore, NormalizedPath, validate_path_segment};

use crate::declaration::DependencyDeclaration;
use crate::identifier::DEFAULT_REVISION;
use crate::store::ModuleStore;
use crate::sync::SyncOptions;
use crate::{Error, Result};

/// Canonical manifest filename.
pub const MANIFEST_FILENAME: &str = "modsync.toml";

/// Git base url used when a manifest has no `[source]` section.
pub const DEFAULT_SOURCE_URL: &str = "https://huggingface.co";

/// Manifest filenames probed inside synced packages, in priority order.
pub const MANIFEST_CANDIDATES: [&str; 3] = ["modsync.toml", "modsync.json", "modsync.yaml"];

/// Parsed project manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub sync: SyncSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceSection>,
    #[serde(default)]
    pub dependencies: Vec<DependencyDeclaration>,
}

/// `[sync]` settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSection {
    /// Sync root, relative to the manifest directory unless absolute
    pub root: String,
    pub default_revision: String,
    pub fetch_timeout_secs: u64,
    /// File created in the sync root and every namespace directory so the
    /// tree is importable (e.g. `__init__.py`)
    pub init_file: Option<String>,
    /// Write a `.gitignore` ignoring everything in the sync root
    pub gitignore: bool,
    /// Ask the provider whether a resident revision moved upstream
    pub check_upstream: bool,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            root: "synced_modules".to_string(),
            default_revision: DEFAULT_REVISION.to_string(),
            fetch_timeout_secs: 120,
            init_file: None,
            gitignore: true,
            check_upstream: false,
        }
    }
}

/// Which kind of remote content provider to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Git hosting: `{url}/{namespace}/{name}`
    #[default]
    Git,
    /// Local mirror: `{url}/{namespace}/{name}/{revision}/`
    Directory,
}

/// `[source]` settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSection {
    #[serde(default)]
    pub kind: SourceKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            kind: SourceKind::Git,
            url: DEFAULT_SOURCE_URL.to_string(),
            cache_dir: None,
        }
    }
}

impl SourceSection {
    /// Directory used to cache fetched remote content.
    ///
    /// Uses `cache_dir` when configured (`~` expands to the home directory),
    /// otherwise the platform cache directory.
    pub fn cache_dir(&self, manifest_dir: &Path) -> PathBuf {
        if let Some(configured) = &self.cache_dir {
            if let Some(rest) = configured.strip_prefix("~/")
                && let Some(home) = dirs::home_dir()
            {
                return home.join(rest);
            }
            let path = PathBuf::from(configured);
            return if path.is_absolute() {
                path
            } else {
                manifest_dir.join(path)
            };
        }
        dirs::cache_dir()
            .map(|dir| dir.join("modsync"))
            .unwrap_or_else(|| manifest_dir.join(".modsync-cache"))
    }

    /// Resolve `url` as a directory when the source is a local mirror.
    pub fn directory(&self, manifest_dir: &Path) -> PathBuf {
        let path = PathBuf::from(&self.url);
        if path.is_absolute() {
            path
        } else {
            manifest_dir.join(path)
        }
    }
}

impl Manifest {
    /// Load and validate a manifest from disk (TOML, JSON or YAML).
    pub fn load(path: &NormalizedPath) -> Result<Self> {
        let manifest = Self::read(&ConfigStore::new(), path)?;
        manifest.validate(path.as_ref())?;
        Ok(manifest)
    }

    /// Deserialize without validating. Unparsable content is an
    /// [`Error::InvalidManifest`]; relative local revisions are anchored at
    /// the manifest's directory.
    pub(crate) fn read(store: &ConfigStore, path: &NormalizedPath) -> Result<Self> {
        let mut manifest: Manifest = store.load(path).map_err(|e| match e {
            modsync_fs::Error::ConfigParse { path, message, .. } => {
                Error::InvalidManifest { path, message }
            }
            other => other.into(),
        })?;
        if let Some(dir) = path.parent() {
            let dir = dir.to_native();
            for decl in &mut manifest.dependencies {
                decl.anchor_local_revision(&dir);
            }
        }
        Ok(manifest)
    }

    /// Parse and validate TOML manifest content.
    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(content)?;
        manifest.validate(Path::new(MANIFEST_FILENAME))?;
        Ok(manifest)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |message: String| Error::InvalidManifest {
            path: path.to_path_buf(),
            message,
        };

        if self.sync.fetch_timeout_secs == 0 {
            return Err(invalid("sync.fetch_timeout_secs must be positive".into()));
        }
        if let Some(init_file) = &self.sync.init_file {
            validate_path_segment(init_file).map_err(|e| invalid(e.to_string()))?;
        }
        if self.sync.root.trim().is_empty() {
            return Err(invalid("sync.root must not be empty".into()));
        }
        // Surface malformed urls at load time rather than mid-sync
        for decl in &self.dependencies {
            decl.to_reference(&self.sync.default_revision)?;
        }
        Ok(())
    }

    /// Absolute sync root for a manifest located in `manifest_dir`.
    pub fn sync_root(&self, manifest_dir: &Path) -> NormalizedPath {
        let root = PathBuf::from(&self.sync.root);
        let root = if root.is_absolute() {
            root
        } else {
            manifest_dir.join(root)
        };
        NormalizedPath::new(root)
    }

    /// Engine options derived from `[sync]`.
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            overwrite_all: false,
            check_upstream: self.sync.check_upstream,
            default_revision: self.sync.default_revision.clone(),
            fetch_timeout: Duration::from_secs(self.sync.fetch_timeout_secs),
        }
    }

    /// Configured `[source]`, or the default git host.
    pub fn source(&self) -> SourceSection {
        self.source.clone().unwrap_or_default()
    }

    /// Open the module store described by `[sync]`.
    pub fn open_store(&self, manifest_dir: &Path) -> ModuleStore {
        let mut store = ModuleStore::new(self.sync_root(manifest_dir)).with_gitignore(self.sync.gitignore);
        if let Some(init_file) = &self.sync.init_file {
            store = store.with_init_file(init_file.clone());
        }
        store
    }
}
