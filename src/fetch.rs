use std::{num::NonZeroUsize, path::PathBuf, sync::Arc};

use log::info;
use thiserror::Error;

use crate::{
    git::{CacheError, CacheStatus, VendorVerifyCache},
    resolver::{IndexedRoot, ResolutionIndex},
    worker::{run_bounded, PoolError},
};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Error while checking out {root}: {source}")]
    Cache { root: String, source: CacheError },
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// A repository whose working copy is checked out at its pinned revision.
#[derive(Debug, Clone)]
pub struct MaterializedRoot {
    pub root: IndexedRoot,
    pub path: PathBuf,
    pub status: CacheStatus,
}

/// Brings one working copy per repository in `index` to its pinned revision.
pub fn materialize_all(
    cache: &Arc<VendorVerifyCache>,
    index: &ResolutionIndex,
    jobs: NonZeroUsize,
) -> Result<Vec<MaterializedRoot>, FetchError> {
    let roots: Vec<IndexedRoot> = index.roots().cloned().collect();
    let cache = Arc::clone(cache);

    let materialized = run_bounded(roots, jobs, move |root: IndexedRoot| -> Result<_, FetchError> {
        let status = cache
            .materialize(&root.repo_root, &root.revision)
            .map_err(|source| FetchError::Cache {
                root: root.repo_root.root.clone(),
                source,
            })?;
        Ok(MaterializedRoot {
            path: cache.entry_path(&root.repo_root),
            root,
            status,
        })
    })?;

    let cloned = count(&materialized, CacheStatus::Cloned);
    let fetched = count(&materialized, CacheStatus::Fetched);
    info!(
        "Checked out {} repositories ({} cloned, {} fetched, {} up to date)",
        materialized.len(),
        cloned,
        fetched,
        materialized.len() - cloned - fetched
    );
    Ok(materialized)
}

fn count(materialized: &[MaterializedRoot], status: CacheStatus) -> usize {
    materialized.iter().filter(|m| m.status == status).count()
}
