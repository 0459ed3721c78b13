//! Local module store
//!
//! The store owns the sync root:
//!
//! ```text
//! <root>/
//!   .gitignore
//!   .modsync/            session lock, staging and trash areas
//!   saibo/
//!     ChatFlowModule/
//!       .modsync-marker.toml
//!       ...fetched content...
//!   user_1234/
//!     MyModule/
//! ```
//!
//! Content and marker are installed together: the provider fills a staging
//! directory, the marker is written into it, and the staging directory is
//! renamed over the package path. The previous package (if any) is parked in
//! the trash area first and restored when the swap fails, so a package path
//! never holds content without its marker.

mod marker;
mod staging;

pub use marker::{MARKER_FILENAME, SyncMarker};
pub use staging::StagedTree;

use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use modsync_fs::{DirLock, NormalizedPath, RobustnessConfig, checksum, io};

use crate::identifier::{LocalPackagePath, RemoteReference, from_local_path};
use crate::{Error, Result};

/// Bookkeeping directory inside the sync root
const STATE_DIR: &str = ".modsync";
const STAGING_DIR: &str = "staging";
const TRASH_DIR: &str = "trash";
const LOCK_FILE: &str = "sync.lock";
const GITIGNORE_HEADER: &str = "# generated by modsync, synced modules are not tracked";

/// Entries that never count as package content.
pub const IGNORED_ENTRIES: [&str; 3] = [MARKER_FILENAME, "__pycache__", ".git"];

/// On-disk tree of synced packages rooted at a sync directory.
#[derive(Debug, Clone)]
pub struct ModuleStore {
    root: NormalizedPath,
    init_file: Option<String>,
    gitignore: bool,
    robustness: RobustnessConfig,
}

impl ModuleStore {
    /// Create a store rooted at `root`. Nothing is touched on disk until a
    /// session is opened.
    pub fn new(root: NormalizedPath) -> Self {
        Self {
            root,
            init_file: None,
            gitignore: true,
            robustness: RobustnessConfig::default(),
        }
    }

    /// Create `name` (e.g. `__init__.py`) in the root and every namespace
    /// directory.
    pub fn with_init_file(mut self, name: impl Into<String>) -> Self {
        self.init_file = Some(name.into());
        self
    }

    pub fn with_gitignore(mut self, enabled: bool) -> Self {
        self.gitignore = enabled;
        self
    }

    pub fn with_robustness(mut self, robustness: RobustnessConfig) -> Self {
        self.robustness = robustness;
        self
    }

    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }

    fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR).to_native()
    }

    /// Absolute directory of a package.
    pub fn package_dir(&self, path: &LocalPackagePath) -> NormalizedPath {
        self.root.join(path.namespace_dir()).join(path.name_dir())
    }

    /// Lock the sync root for this process and prepare it for writes.
    ///
    /// Recovers packages parked in the trash by an interrupted install,
    /// clears stale staging directories, and writes the `.gitignore` and
    /// init file. The returned guard must be held for the whole session.
    ///
    /// # Errors
    ///
    /// Fails with a lock error when another process is syncing this root.
    pub fn open_session(&self) -> Result<DirLock> {
        let lock = DirLock::try_acquire(&self.state_dir(), LOCK_FILE)?;
        self.recover()?;
        self.prepare_root()?;
        Ok(lock)
    }

    fn prepare_root(&self) -> Result<()> {
        let root = self.root.to_native();
        fs::create_dir_all(&root)?;
        self.ensure_init_file(&root)?;

        if self.gitignore {
            let gitignore = self.root.join(".gitignore");
            let existing = if gitignore.is_file() {
                io::read_text(&gitignore)?
            } else {
                String::new()
            };
            if !existing.lines().any(|line| line.trim() == "*") {
                let mut content = existing;
                if !content.is_empty() && !content.ends_with('\n') {
                    content.push('\n');
                }
                content.push_str(GITIGNORE_HEADER);
                content.push_str("\n*\n");
                io::write_atomic(&gitignore, content.as_bytes(), self.robustness)?;
            }
        }
        Ok(())
    }

    fn ensure_init_file(&self, dir: &Path) -> Result<()> {
        if let Some(name) = &self.init_file {
            let path = dir.join(name);
            if !path.exists() {
                fs::write(&path, "")?;
            }
        }
        Ok(())
    }

    fn recover(&self) -> Result<()> {
        io::remove_tree(&self.state_dir().join(STAGING_DIR))?;

        let trash = self.state_dir().join(TRASH_DIR);
        if !trash.is_dir() {
            return Ok(());
        }

        for entry in fs::read_dir(&trash)? {
            let origin_file = entry?.path();
            if origin_file.extension().is_none_or(|ext| ext != "origin") {
                continue;
            }
            let parked = origin_file.with_extension("");
            let relative = fs::read_to_string(&origin_file)?;
            let target = self.root.join(relative.trim()).to_native();

            if parked.is_dir() && !target.exists() {
                tracing::warn!(
                    package = %relative.trim(),
                    "restoring package left behind by an interrupted install"
                );
                io::rename_with_retry(&parked, &target, self.robustness)?;
            } else {
                io::remove_tree(&parked)?;
            }
            fs::remove_file(&origin_file)?;
        }

        // Anything left has no origin record and cannot be placed
        io::remove_tree(&trash)?;
        Ok(())
    }

    /// Whether anything occupies the package path.
    pub fn exists(&self, path: &LocalPackagePath) -> bool {
        self.package_dir(path).is_dir()
    }

    /// Read the marker of a package, `None` if it was never synced.
    ///
    /// # Errors
    ///
    /// An unreadable marker is reported as [`Error::PartialWriteDetected`].
    pub fn read_marker(&self, path: &LocalPackagePath) -> Result<Option<SyncMarker>> {
        let marker_path = self.package_dir(path).join(MARKER_FILENAME);
        if !marker_path.is_file() {
            return Ok(None);
        }
        let content = io::read_text(&marker_path)?;
        SyncMarker::from_toml(&content)
            .map(Some)
            .map_err(|e| Error::PartialWriteDetected {
                path: marker_path.to_native(),
                detail: format!("sync marker is unreadable: {e}"),
            })
    }

    /// Check that content and marker of a package agree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PartialWriteDetected`] for content without a marker,
    /// a marker whose recorded content is gone, or a marker recording a
    /// different module. A marker over an empty tree is accepted when the
    /// module was fetched empty.
    pub fn verify(&self, path: &LocalPackagePath) -> Result<()> {
        let dir = self.package_dir(path);
        if !dir.exists() {
            return Ok(());
        }
        let partial = |detail: String| Error::PartialWriteDetected {
            path: dir.to_native(),
            detail,
        };
        if !dir.is_dir() {
            return Err(partial("package path is not a directory".into()));
        }

        let has_marker = dir.join(MARKER_FILENAME).is_file();
        let has_content = has_content(&dir.to_native())?;

        if !has_marker {
            return if has_content {
                Err(partial("content present without a sync marker".into()))
            } else {
                Ok(())
            };
        }

        let Some(marker) = self.read_marker(path)? else {
            return Err(partial("sync marker disappeared".into()));
        };
        // A module may legitimately be empty; its marker then records the empty tree
        if !has_content && marker.tree_checksum != self.tree_checksum(&dir.to_native())? {
            return Err(partial("sync marker present without content".into()));
        }
        let expected = from_local_path(path)?;
        let recorded = marker
            .module_id()
            .map_err(|e| partial(format!("sync marker is invalid: {e}")))?;
        if recorded != expected {
            return Err(partial(format!(
                "sync marker records {recorded}, expected {expected}"
            )));
        }
        Ok(())
    }

    /// Allocate a fresh staging directory.
    pub fn stage(&self) -> Result<StagedTree> {
        let dir = self
            .state_dir()
            .join(STAGING_DIR)
            .join(Uuid::new_v4().to_string());
        fs::create_dir_all(&dir)?;
        Ok(StagedTree::new(dir))
    }

    /// Record `reference` as the content of a staged tree.
    ///
    /// Computes the pristine tree checksum and writes the marker into the
    /// staged tree, so it travels with the content on install.
    pub fn write_marker(
        &self,
        staged: &mut StagedTree,
        reference: &RemoteReference,
        content_id: &str,
    ) -> Result<SyncMarker> {
        let tree_checksum = self.tree_checksum(staged.path())?;
        let marker = SyncMarker::new(reference, content_id, tree_checksum);
        staged.write_marker(marker.clone())?;
        Ok(marker)
    }

    /// Mark a fetched staged tree and install it at the reference's package
    /// path. Content and marker land together.
    pub fn install(
        &self,
        reference: &RemoteReference,
        mut staged: StagedTree,
        content_id: &str,
    ) -> Result<SyncMarker> {
        let marker = self.write_marker(&mut staged, reference, content_id)?;
        self.write_content(&reference.local_path(), staged)?;
        Ok(marker)
    }

    /// Swap a staged tree (content plus marker) into the package path.
    ///
    /// Either the whole new package is in place afterwards, or the previous
    /// package is.
    pub fn write_content(&self, path: &LocalPackagePath, mut staged: StagedTree) -> Result<()> {
        let target = self.package_dir(path).to_native();
        let partial = |detail: String| Error::PartialWriteDetected {
            path: target.clone(),
            detail,
        };

        let Some(marker) = staged.marker() else {
            return Err(partial("staged content has no sync marker".into()));
        };
        let recorded = marker.module_id()?;
        if recorded.local_path() != *path {
            return Err(partial(format!(
                "staged marker records {recorded}, not the module at {path}"
            )));
        }

        if let Some(namespace_dir) = target.parent() {
            fs::create_dir_all(namespace_dir)?;
            self.ensure_init_file(namespace_dir)?;
        }

        let parked = if target.exists() {
            Some(self.park(path, &target)?)
        } else {
            None
        };

        match io::rename_with_retry(staged.path(), &target, self.robustness) {
            Ok(()) => {
                staged.mark_committed();
                if let Some((dir, origin)) = parked {
                    if let Err(e) = io::remove_tree(&dir) {
                        tracing::warn!(path = %dir.display(), error = %e, "failed to clear replaced package");
                    }
                    let _ = fs::remove_file(origin);
                }
                Ok(())
            }
            Err(install_err) => {
                if let Some((dir, origin)) = parked {
                    if let Err(restore_err) = io::rename_with_retry(&dir, &target, self.robustness) {
                        return Err(partial(format!(
                            "install failed ({install_err}) and the previous package could not be restored ({restore_err}); it is parked at {}",
                            dir.display()
                        )));
                    }
                    let _ = fs::remove_file(origin);
                }
                Err(install_err.into())
            }
        }
    }

    /// Move an existing package into the trash, recording where it came from.
    fn park(&self, path: &LocalPackagePath, target: &Path) -> Result<(PathBuf, PathBuf)> {
        let trash = self.state_dir().join(TRASH_DIR);
        fs::create_dir_all(&trash)?;

        let id = Uuid::new_v4().to_string();
        let parked = trash.join(&id);
        let origin = trash.join(format!("{id}.origin"));
        fs::write(&origin, path.as_relative())?;

        if let Err(e) = io::rename_with_retry(target, &parked, self.robustness) {
            let _ = fs::remove_file(&origin);
            return Err(e.into());
        }
        Ok((parked, origin))
    }

    /// Checksum of a package tree, ignoring the marker and caches.
    pub fn tree_checksum(&self, dir: &Path) -> Result<String> {
        Ok(checksum::compute_tree_checksum(dir, &IGNORED_ENTRIES)?)
    }

    /// Whether a resident package differs from the content last fetched.
    ///
    /// Returns `false` for packages without a marker.
    pub fn is_modified(&self, path: &LocalPackagePath) -> Result<bool> {
        let Some(marker) = self.read_marker(path)? else {
            return Ok(false);
        };
        let current = self.tree_checksum(&self.package_dir(path).to_native())?;
        Ok(current != marker.tree_checksum)
    }

    /// All package directories under the root, sorted.
    ///
    /// Directories that do not decode to a valid module identity are not
    /// packages and are skipped.
    pub fn package_paths(&self) -> Result<Vec<LocalPackagePath>> {
        let root = self.root.to_native();
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for namespace in subdirectories(&root)? {
            for name in subdirectories(&root.join(&namespace))? {
                if let Some(path) = LocalPackagePath::from_dirs(&namespace, &name) {
                    paths.push(path);
                }
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Every package that carries a readable marker.
    pub fn list_resident(&self) -> Result<Vec<(LocalPackagePath, SyncMarker)>> {
        let mut resident = Vec::new();
        for path in self.package_paths()? {
            if let Ok(Some(marker)) = self.read_marker(&path) {
                resident.push((path, marker));
            }
        }
        Ok(resident)
    }
}

fn subdirectories(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || IGNORED_ENTRIES.contains(&name.as_str()) {
            continue;
        }
        names.push(name);
    }
    Ok(names)
}

fn has_content(dir: &Path) -> Result<bool> {
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        if !IGNORED_ENTRIES.iter().any(|ignored| name.to_string_lossy() == *ignored) {
            return Ok(true);
        }
    }
    Ok(false)
}
