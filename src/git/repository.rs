use std::path::PathBuf;

use git2::{build::CheckoutBuilder, Oid, Repository};
use log::{debug, warn};

use super::cache::{CacheError, VendorVerifyCache};

/// A working copy in the cache, opened for one materialization.
pub struct CachedRepository<'a> {
    cache: &'a VendorVerifyCache,
    git_repo: Repository,
    path: PathBuf,
}

impl<'a> CachedRepository<'a> {
    pub fn new(cache: &'a VendorVerifyCache, git_repo: Repository, path: PathBuf) -> Self {
        CachedRepository {
            cache,
            git_repo,
            path,
        }
    }

    /// Commit id HEAD points at, or `None` when HEAD is unborn or unreadable.
    pub fn head_revision(&self) -> Option<String> {
        debug!("$ cd {}; git rev-parse HEAD", self.path.display());
        match self.git_repo.head().and_then(|head| head.peel_to_commit()) {
            Ok(commit) => Some(commit.id().to_string()),
            Err(error) => {
                debug!("Could not read HEAD of {}: {}", self.path.display(), error);
                None
            }
        }
    }

    /// Commit an abbreviated id or a tag name already points at locally.
    ///
    /// Branch names are not resolved, their local copy may be stale.
    pub fn local_commit(&self, revision: &str) -> Option<String> {
        let spec = if revision.bytes().all(|b| b.is_ascii_hexdigit()) {
            revision.to_owned()
        } else {
            format!("refs/tags/{}", revision)
        };
        self.git_repo
            .revparse_single(&spec)
            .and_then(|object| object.peel_to_commit())
            .map(|commit| commit.id().to_string())
            .ok()
    }

    /// Fetches `revision` from origin.
    ///
    /// A full commit id is first requested on its own, which most servers
    /// allow; anything else, or a refused request, falls back to fetching every
    /// configured refspec.
    pub fn fetch(&self, revision: &str) -> Result<(), CacheError> {
        let mut remote = self.git_repo.find_remote("origin")?;

        if let Some(oid) = full_commit_id(revision) {
            debug!(
                "$ cd {}; git fetch origin {}",
                self.path.display(),
                revision
            );
            match remote.fetch(&[revision], Some(&mut self.cache.fetch_options()), None) {
                Ok(()) if self.git_repo.find_commit(oid).is_ok() => return Ok(()),
                Ok(()) => debug!("Fetching {} alone did not provide it", revision),
                Err(error) => warn!(
                    "Failed to fetch a single commit {}, falling back to a full fetch: {}",
                    revision, error
                ),
            }
        }

        let refspecs: Vec<String> = remote
            .fetch_refspecs()?
            .iter()
            .flatten()
            .map(str::to_owned)
            .collect();
        debug!("$ cd {}; git fetch origin", self.path.display());
        remote
            .fetch(&refspecs, Some(&mut self.cache.fetch_options()), None)
            .map_err(|source| CacheError::Fetch {
                path: self.path.display().to_string(),
                source,
            })
    }

    /// Forces the working copy to `revision` with a detached HEAD, discarding
    /// local modifications and untracked files.
    pub fn checkout(&self, revision: &str) -> Result<(), CacheError> {
        debug!(
            "$ cd {}; git checkout {}",
            self.path.display(),
            revision
        );
        let commit = self
            .git_repo
            .revparse_single(revision)
            .and_then(|object| object.peel_to_commit())
            .map_err(|source| CacheError::Checkout {
                revision: revision.to_owned(),
                path: self.path.display().to_string(),
                source,
            })?;

        let mut checkout = CheckoutBuilder::new();
        checkout.force().remove_untracked(true);
        self.git_repo
            .checkout_tree(commit.as_object(), Some(&mut checkout))?;
        self.git_repo.set_head_detached(commit.id())?;
        Ok(())
    }
}

fn full_commit_id(revision: &str) -> Option<Oid> {
    if revision.len() == 40 && revision.bytes().all(|b| b.is_ascii_hexdigit()) {
        Oid::from_str(revision).ok()
    } else {
        None
    }
}
