//! [`TestProject`] builder for sync scenarios.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary project directory holding a `modsync.toml`.
///
/// # Example
///
/// ```rust,no_run
/// use modsync_test_utils::{GitRemote, TestProject};
///
/// let remote = GitRemote::new();
/// remote.commit("saibo", "Chat", "main", &[("flow.py", "")]);
///
/// let project = TestProject::new();
/// project.write_manifest(&remote, &[("saibo/Chat", None)]);
/// // ... run a sync ...
/// project.assert_file_exists("synced_modules/saibo/Chat/flow.py");
/// ```
pub struct TestProject {
    temp_dir: TempDir,
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// Root path of the project.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root().join("modsync.toml")
    }

    /// Default sync root for manifests written by [`Self::write_manifest`].
    pub fn sync_root(&self) -> PathBuf {
        self.root().join("synced_modules")
    }

    /// Write a manifest sourcing from `remote` and declaring `deps`
    /// (`url`, optional revision).
    pub fn write_manifest(&self, remote: &crate::GitRemote, deps: &[(&str, Option<&str>)]) {
        let cache = self.root().join(".cache");
        let mut manifest = format!(
            "[sync]\ninit_file = \"__init__.py\"\n\n[source]\nkind = \"git\"\nurl = {:?}\ncache_dir = {:?}\n",
            remote.url(),
            cache.to_string_lossy()
        );
        for (url, revision) in deps {
            manifest.push_str(&format!("\n[[dependencies]]\nurl = \"{url}\"\n"));
            if let Some(revision) = revision {
                manifest.push_str(&format!("revision = \"{revision}\"\n"));
            }
        }
        self.write_raw_manifest(&manifest);
    }

    /// Write `content` verbatim as `modsync.toml`.
    pub fn write_raw_manifest(&self, content: &str) {
        fs::write(self.manifest_path(), content).unwrap();
    }

    /// Write a file relative to the project root, creating parents.
    pub fn write_file(&self, path: &str, content: &str) {
        let full_path = self.root().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full_path, content).unwrap();
    }

    /// Read a file relative to the project root.
    ///
    /// # Panics
    /// Panics if the file cannot be read.
    pub fn read_file(&self, path: &str) -> String {
        let full_path = self.root().join(path);
        fs::read_to_string(&full_path)
            .unwrap_or_else(|_| panic!("Could not read file: {}", full_path.display()))
    }

    /// Assert that `path` (relative to the project root) exists.
    pub fn assert_file_exists(&self, path: &str) {
        let full_path = self.root().join(path);
        assert!(
            full_path.exists(),
            "Expected file to exist: {}",
            full_path.display()
        );
    }

    /// Assert that `path` (relative to the project root) does not exist.
    pub fn assert_file_not_exists(&self, path: &str) {
        let full_path = self.root().join(path);
        assert!(
            !full_path.exists(),
            "Expected file NOT to exist: {}",
            full_path.display()
        );
    }

    /// Assert that the file at `path` contains `content`.
    pub fn assert_file_contains(&self, path: &str, content: &str) {
        let file_content = self.read_file(path);
        assert!(
            file_content.contains(content),
            "File {path} does not contain expected content.\nExpected: {content}\nActual: {file_content}"
        );
    }
}
