//! Per-package sync marker
//!
//! The marker is the single source of truth for which revision of a module
//! is resident at a package path. It is written into the package directory
//! together with the content, never on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::identifier::{ModuleId, RemoteReference};

/// Marker filename inside every synced package.
pub const MARKER_FILENAME: &str = ".modsync-marker.toml";

/// Current marker format version
const FORMAT_VERSION: u32 = 1;

/// Record of what was last fetched into a package directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMarker {
    /// Marker format version for forward compatibility
    pub format: u32,
    pub namespace: String,
    pub name: String,
    pub revision: String,
    /// Provider content identifier (commit id or content hash)
    pub content_id: String,
    /// Checksum of the pristine package tree, marker excluded
    pub tree_checksum: String,
    pub synced_at: DateTime<Utc>,
}

impl SyncMarker {
    /// Create a marker for freshly fetched content.
    pub fn new(
        reference: &RemoteReference,
        content_id: impl Into<String>,
        tree_checksum: impl Into<String>,
    ) -> Self {
        Self {
            format: FORMAT_VERSION,
            namespace: reference.namespace().to_string(),
            name: reference.name().to_string(),
            revision: reference.revision().to_string(),
            content_id: content_id.into(),
            tree_checksum: tree_checksum.into(),
            synced_at: Utc::now(),
        }
    }

    /// The module identity recorded in the marker.
    pub fn module_id(&self) -> Result<ModuleId> {
        ModuleId::parse(&format!("{}/{}", self.namespace, self.name))
    }

    /// The resident reference recorded in the marker.
    pub fn reference(&self) -> Result<RemoteReference> {
        self.module_id()?.at(&self.revision)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
