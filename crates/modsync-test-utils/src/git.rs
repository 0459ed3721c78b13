//! Local git "hosting" for provider and end-to-end tests.

use std::fs;
use std::path::{Path, PathBuf};

use git2::{IndexAddOption, Oid, Repository, Signature};
use tempfile::TempDir;

/// A temporary directory of git repositories at `{base}/{namespace}/{name}`.
///
/// Point a git provider at [`GitRemote::url`] to fetch from it.
///
/// ```rust,no_run
/// use modsync_test_utils::GitRemote;
///
/// let remote = GitRemote::new();
/// let commit = remote.commit("saibo", "Chat", "main", &[("flow.py", "print('hi')")]);
/// remote.tag("saibo", "Chat", "v1", &commit);
/// ```
pub struct GitRemote {
    temp_dir: TempDir,
}

impl Default for GitRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl GitRemote {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// Base directory holding all repositories.
    pub fn base(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Base url to configure a provider with.
    pub fn url(&self) -> String {
        self.base().to_string_lossy().into_owned()
    }

    /// Working directory of a repository.
    pub fn repo_path(&self, namespace: &str, name: &str) -> PathBuf {
        self.base().join(namespace).join(name)
    }

    fn open_or_init(&self, namespace: &str, name: &str) -> Repository {
        let path = self.repo_path(namespace, name);
        if path.join(".git").exists() {
            return Repository::open(&path)
                .unwrap_or_else(|e| panic!("GitRemote: failed to open {}: {e}", path.display()));
        }
        fs::create_dir_all(&path).unwrap();
        let repo = Repository::init(&path)
            .unwrap_or_else(|e| panic!("GitRemote: failed to init {}: {e}", path.display()));
        repo.set_head("refs/heads/main").unwrap();
        repo
    }

    /// Commit `files` as the complete tree of `branch`, replacing whatever
    /// the branch held before. Returns the commit id.
    ///
    /// # Panics
    /// Panics if any git operation fails.
    pub fn commit(&self, namespace: &str, name: &str, branch: &str, files: &[(&str, &str)]) -> String {
        let repo = self.open_or_init(namespace, name);
        let workdir = self.repo_path(namespace, name);

        // Start from an empty tree so the commit holds exactly `files`
        for entry in fs::read_dir(&workdir).unwrap() {
            let path = entry.unwrap().path();
            if path.file_name().is_some_and(|n| n == ".git") {
                continue;
            }
            if path.is_dir() {
                fs::remove_dir_all(&path).unwrap();
            } else {
                fs::remove_file(&path).unwrap();
            }
        }
        for (relative, content) in files {
            let path = workdir.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, content).unwrap();
        }

        let mut index = repo.index().unwrap();
        index.clear().unwrap();
        index.add_all(["*"], IndexAddOption::DEFAULT, None).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();

        let signature = Signature::now("Test User", "test@test.com").unwrap();
        let refname = format!("refs/heads/{branch}");
        let parent = repo
            .find_reference(&refname)
            .ok()
            .and_then(|r| r.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let oid = repo
            .commit(
                Some(&refname),
                &signature,
                &signature,
                &format!("update {branch}"),
                &tree,
                &parents,
            )
            .unwrap_or_else(|e| panic!("GitRemote: commit to {namespace}/{name} failed: {e}"));
        oid.to_string()
    }

    /// Create a lightweight tag pointing at `commit`.
    pub fn tag(&self, namespace: &str, name: &str, tag: &str, commit: &str) {
        let repo = self.open_or_init(namespace, name);
        let oid = Oid::from_str(commit).unwrap();
        let object = repo.find_object(oid, None).unwrap();
        repo.tag_lightweight(tag, &object, true).unwrap();
    }
}
