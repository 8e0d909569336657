use std::{
    fmt::{Display, Formatter},
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use dashmap::DashMap;
use git2::{
    build::RepoBuilder, AutotagOption, Config, Cred, CredentialType, FetchOptions,
    RemoteCallbacks, Repository,
};
use log::{debug, info, trace};
use thiserror::Error;

use crate::{flock::FileLock, git::repository::CachedRepository, model::RepoRoot};

const CACHE_DIR: &str = "vendor-verify";

/// Working copies of upstream repositories, one per repository root, kept
/// below `<cache root>/vendor-verify`.
///
/// The whole location is locked for the lifetime of the value so that
/// concurrent runs sharing a cache directory do not step on each other.
/// Within a run, [`VendorVerifyCache::with_root_lock`] serializes access to a
/// single working copy.
pub struct VendorVerifyCache {
    location: PathBuf,
    root_locks: DashMap<String, Arc<Mutex<()>>>,
    _lock: FileLock,
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
    #[error("Cache location {location} is not a directory")]
    BadLocation { location: String },
    #[error("Cache lock cannot be acquired")]
    Lock(#[from] crate::flock::Error),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Failed to clone {url} into {path}: {source}")]
    Clone {
        url: String,
        path: String,
        source: git2::Error,
    },
    #[error("Failed to fetch updates for {path}: {source}")]
    Fetch { path: String, source: git2::Error },
    #[error("Revision {revision} does not exist in {path}: {source}")]
    Checkout {
        revision: String,
        path: String,
        source: git2::Error,
    },
    #[error("Cache entry {path} is corrupted: {reason}")]
    Corrupted { path: String, reason: String },
}

/// What [`VendorVerifyCache::materialize`] had to do to reach the pinned
/// revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Cloned,
    Fetched,
    UpToDate,
}

impl Display for CacheStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheStatus::Cloned => f.write_str("cloned"),
            CacheStatus::Fetched => f.write_str("fetched"),
            CacheStatus::UpToDate => f.write_str("up to date"),
        }
    }
}

impl VendorVerifyCache {
    pub fn new(cache_root: &Path) -> Result<VendorVerifyCache, CacheError> {
        let location = cache_root.join(CACHE_DIR);
        if location.exists() {
            if !location.is_dir() {
                return Err(CacheError::BadLocation {
                    location: location.display().to_string(),
                });
            }
        } else {
            std::fs::create_dir_all(&location)?;
        }

        let lock = Self::acquire_lock(&location)?;

        Ok(VendorVerifyCache {
            location,
            root_locks: DashMap::new(),
            _lock: lock,
        })
    }

    /// Directory holding the working copy for `root`.
    pub fn entry_path(&self, repo_root: &RepoRoot) -> PathBuf {
        self.location.join(repo_root.to_path())
    }

    /// Runs `f` while holding the in-process lock for `root`.
    pub fn with_root_lock<T>(&self, root: &str, f: impl FnOnce() -> T) -> T {
        let lock = self
            .root_locks
            .entry(root.to_owned())
            .or_default()
            .value()
            .clone();
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Makes the working copy for `repo_root` reflect exactly `revision`.
    ///
    /// Clones when there is no working copy yet, fetches only when the current
    /// HEAD differs from `revision`, and always finishes with a checkout.
    pub fn materialize(
        &self,
        repo_root: &RepoRoot,
        revision: &str,
    ) -> Result<CacheStatus, CacheError> {
        self.with_root_lock(&repo_root.root, || {
            let path = self.entry_path(repo_root);
            debug!(
                "Materializing {} at {} in {}",
                repo_root.root,
                revision,
                path.display()
            );

            let (repository, status) = match std::fs::metadata(&path) {
                Err(error) if error.kind() == ErrorKind::NotFound => {
                    let git_repo = self.clone_repository(repo_root, &path)?;
                    (CachedRepository::new(self, git_repo, path), CacheStatus::Cloned)
                }
                Err(error) => return Err(error.into()),
                Ok(metadata) if !metadata.is_dir() => {
                    return Err(CacheError::Corrupted {
                        path: path.display().to_string(),
                        reason: "expected a directory".to_owned(),
                    })
                }
                Ok(_) => {
                    let repository = self.open_entry(repo_root, path)?;
                    match repository.head_revision() {
                        Some(head)
                            if head == revision
                                || repository.local_commit(revision).as_ref() == Some(&head) =>
                        {
                            trace!("{} is already at {}", repo_root.root, revision);
                            (repository, CacheStatus::UpToDate)
                        }
                        head => {
                            trace!(
                                "{} is at {:?}, fetching {}",
                                repo_root.root,
                                head,
                                revision
                            );
                            repository.fetch(revision)?;
                            (repository, CacheStatus::Fetched)
                        }
                    }
                }
            };

            repository.checkout(revision)?;
            info!("{} at {} ({})", repo_root.root, revision, status);
            Ok(status)
        })
    }

    fn acquire_lock(location: &Path) -> Result<FileLock, CacheError> {
        let location = location.join(".lock");
        debug!(
            "Acquiring a lock on the cache location: {}",
            location.display()
        );
        let lock = FileLock::new(&location)?;
        debug!("Acquired a lock on the cache location");
        Ok(lock)
    }

    fn open_entry(&self, repo_root: &RepoRoot, path: PathBuf) -> Result<CachedRepository<'_>, CacheError> {
        trace!("Opening existing repository at {}", path.display());

        let git_repo = Repository::open(&path).map_err(|error| CacheError::Corrupted {
            path: path.display().to_string(),
            reason: error.message().to_owned(),
        })?;

        {
            let remote = git_repo.find_remote("origin")?;
            if remote.url() != Some(repo_root.repo.as_str()) {
                // The import path now resolves somewhere else.
                debug!(
                    "Updating remote url of {} from {:?} to {}",
                    repo_root.root,
                    remote.url(),
                    repo_root.repo
                );
                git_repo.remote_set_url("origin", &repo_root.repo)?;
            }
        }

        Ok(CachedRepository::new(self, git_repo, path))
    }

    fn clone_repository(&self, repo_root: &RepoRoot, path: &Path) -> Result<Repository, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        debug!("$ git clone {} {}", repo_root.repo, path.display());
        let mut builder = RepoBuilder::new();
        builder.fetch_options(self.fetch_options());
        builder
            .clone(&repo_root.repo, path)
            .map_err(|source| CacheError::Clone {
                url: repo_root.repo.clone(),
                path: path.display().to_string(),
                source,
            })
    }

    pub(super) fn fetch_options(&self) -> FetchOptions<'static> {
        let git_config = match Config::open_default() {
            Ok(config) => Some(config),
            Err(error) => {
                debug!("Could not open git configuration: {}", error);
                None
            }
        };

        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |url, username, allowed_types| {
            trace!(
                "Requested credentials for {}, username {:?}, allowed types {:?}",
                url,
                username,
                allowed_types
            );
            if allowed_types.contains(CredentialType::USERNAME) {
                return Cred::username("git");
            }
            if allowed_types.contains(CredentialType::SSH_KEY) {
                return Cred::ssh_key_from_agent(username.unwrap_or("git"));
            }
            if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
                if let Some(git_config) = &git_config {
                    return Cred::credential_helper(git_config, url, username);
                }
            }
            Err(git2::Error::from_str("no valid authentication available"))
        });

        let mut fetch_options = FetchOptions::new();
        fetch_options
            .remote_callbacks(callbacks)
            .download_tags(AutotagOption::All);
        fetch_options
    }
}
