//! Staging directories for package installs

use std::path::{Path, PathBuf};

use modsync_fs::io;

use super::marker::{MARKER_FILENAME, SyncMarker};
use crate::Result;

/// A directory on the same filesystem as the sync root into which a
/// provider materializes content before it is swapped into place.
///
/// Dropping an uncommitted staging tree deletes it.
#[derive(Debug)]
pub struct StagedTree {
    dir: PathBuf,
    marker: Option<SyncMarker>,
    committed: bool,
}

impl StagedTree {
    pub(super) fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            marker: None,
            committed: false,
        }
    }

    /// Directory the provider should fill.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// The marker written into this tree, if any.
    pub fn marker(&self) -> Option<&SyncMarker> {
        self.marker.as_ref()
    }

    /// Write the marker into the staged tree.
    ///
    /// Any stale marker file the provider may have produced is replaced.
    pub fn write_marker(&mut self, marker: SyncMarker) -> Result<()> {
        let path = self.dir.join(MARKER_FILENAME);
        std::fs::write(&path, marker.to_toml()?)?;
        self.marker = Some(marker);
        Ok(())
    }

    pub(super) fn mark_committed(&mut self) {
        self.committed = true;
    }
}

impl Drop for StagedTree {
    fn drop(&mut self) {
        if !self.committed
            && let Err(e) = io::remove_tree(&self.dir)
        {
            tracing::warn!(path = %self.dir.display(), error = %e, "failed to remove staging directory");
        }
    }
}
