//! Bare repository cache, one mirror per module.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use git2::{
    CertificateCheckStatus, ErrorClass, ErrorCode, FetchOptions, FetchPrune, Oid, RemoteCallbacks,
    Repository,
};

use crate::{Error, Result};

const REFSPECS: [&str; 2] = ["+refs/heads/*:refs/heads/*", "+refs/tags/*:refs/tags/*"];

/// Point in time after which a fetch is abandoned.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
}

impl Deadline {
    fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    fn expired(&self) -> bool {
        Instant::now() >= self.at
    }
}

/// Bare mirrors at `{root}/{namespace}/{name}.git`.
#[derive(Debug, Clone)]
pub struct RepositoryCache {
    root: PathBuf,
}

impl RepositoryCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn repo_path(&self, namespace: &str, name: &str) -> PathBuf {
        self.root.join(namespace).join(format!("{name}.git"))
    }

    /// Open the mirror for a module, creating it on first use.
    ///
    /// The `origin` remote is pointed at `url` every time so a changed
    /// source url takes effect without clearing the cache.
    pub fn open(&self, namespace: &str, name: &str, url: &str) -> Result<Repository> {
        let path = self.repo_path(namespace, name);
        let repo = if path.exists() {
            Repository::open_bare(&path)?
        } else {
            std::fs::create_dir_all(&path).map_err(|e| Error::io(&path, e))?;
            tracing::debug!(path = %path.display(), "initializing cache mirror");
            Repository::init_bare(&path)?
        };

        match repo.find_remote("origin") {
            Ok(remote) if remote.url() == Some(url) => {}
            Ok(_) => repo.remote_set_url("origin", url)?,
            Err(e) if e.code() == ErrorCode::NotFound => {
                repo.remote("origin", url)?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(repo)
    }

    /// Bring the mirror up to date for `revision`.
    ///
    /// A full commit id already present locally needs no network access.
    ///
    /// The deadline is checked from the transfer, sideband and certificate
    /// callbacks, so it interrupts a fetch once the remote starts talking.
    /// Connection setup is bounded only by the transport's own timeouts.
    pub fn update(&self, repo: &Repository, url: &str, revision: &str, timeout: Duration) -> Result<()> {
        if is_full_commit_id(revision)
            && let Ok(oid) = Oid::from_str(revision)
            && repo.find_commit(oid).is_ok()
        {
            tracing::debug!(revision, "commit already cached");
            return Ok(());
        }

        let deadline = Deadline::after(timeout);
        let mut callbacks = RemoteCallbacks::new();
        callbacks.transfer_progress(move |_| !deadline.expired());
        callbacks.sideband_progress(move |_| !deadline.expired());
        callbacks.certificate_check(move |_, _| {
            if deadline.expired() {
                Err(git2::Error::from_str("fetch deadline passed"))
            } else {
                Ok(CertificateCheckStatus::CertificatePassthrough)
            }
        });

        let mut options = FetchOptions::new();
        options.remote_callbacks(callbacks);
        options.prune(FetchPrune::On);

        let mut remote = repo.find_remote("origin")?;
        tracing::debug!(url, revision, "fetching into cache");
        remote
            .fetch(&REFSPECS, Some(&mut options), None)
            .map_err(|e| {
                if deadline.expired()
                    || e.class() == ErrorClass::Callback
                    || e.code() == ErrorCode::User
                {
                    Error::Timeout {
                        url: url.to_string(),
                        after: timeout,
                    }
                } else {
                    Error::Git(e)
                }
            })
    }

    /// Resolve `revision` to a commit: branch, then tag, then any revspec
    /// (commit id or abbreviation).
    pub fn resolve(repo: &Repository, url: &str, revision: &str) -> Result<Oid> {
        for refname in [format!("refs/heads/{revision}"), format!("refs/tags/{revision}")] {
            if let Ok(reference) = repo.find_reference(&refname) {
                return Ok(reference.peel_to_commit()?.id());
            }
        }

        let not_found = || Error::RevisionNotFound {
            url: url.to_string(),
            revision: revision.to_string(),
        };
        let object = repo.revparse_single(revision).map_err(|_| not_found())?;
        let commit = object.peel_to_commit().map_err(|_| not_found())?;
        Ok(commit.id())
    }
}

fn is_full_commit_id(revision: &str) -> bool {
    revision.len() == 40 && revision.chars().all(|c| c.is_ascii_hexdigit())
}
