use std::collections::BTreeMap;

use log::{debug, info};

use crate::model::{godeps::Dependency, RepoRoot, Vcs};

use super::{RepoRootResolver, ResolveError};

/// A repository together with everything the manifest says about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRoot {
    pub repo_root: RepoRoot,
    /// Every manifest import path served by this repository, in manifest order.
    pub import_paths: Vec<String>,
    pub revision: String,
}

/// Manifest dependencies grouped by repository root, ordered by root key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionIndex {
    roots: BTreeMap<String, IndexedRoot>,
}

impl ResolutionIndex {
    /// Resolves every dependency and groups the results by repository root.
    pub fn build<R>(dependencies: &[Dependency], resolver: &R) -> Result<Self, ResolveError>
    where
        R: RepoRootResolver + ?Sized,
    {
        let mut index = ResolutionIndex::default();
        for dependency in dependencies {
            let repo_root = resolver.resolve(&dependency.import_path)?;
            index.insert(dependency, repo_root)?;
        }
        info!(
            "Resolved {} import paths to {} repositories",
            dependencies.len(),
            index.len()
        );
        Ok(index)
    }

    /// Adds one resolved dependency.
    ///
    /// Fails if the repository is not a Git repository, or if it was already
    /// added with a different URL or pinned revision.
    pub fn insert(
        &mut self,
        dependency: &Dependency,
        repo_root: RepoRoot,
    ) -> Result<(), ResolveError> {
        if repo_root.vcs != Vcs::Git {
            return Err(ResolveError::UnsupportedVcs {
                root: repo_root.root,
                vcs: repo_root.vcs,
            });
        }

        match self.roots.get_mut(&repo_root.root) {
            Some(existing) => {
                if existing.repo_root != repo_root {
                    return Err(ResolveError::ConflictingRepositories {
                        root: repo_root.root,
                        first: existing.repo_root.repo.clone(),
                        second: repo_root.repo,
                    });
                }
                if existing.revision != dependency.rev {
                    return Err(ResolveError::ConflictingRevisions {
                        root: repo_root.root,
                        first: existing.revision.clone(),
                        first_path: existing.import_paths[0].clone(),
                        second: dependency.rev.clone(),
                        second_path: dependency.import_path.clone(),
                    });
                }
                debug!(
                    "{} shares repository {}",
                    dependency.import_path, repo_root.root
                );
                existing.import_paths.push(dependency.import_path.clone());
            }
            None => {
                self.roots.insert(
                    repo_root.root.clone(),
                    IndexedRoot {
                        repo_root,
                        import_paths: vec![dependency.import_path.clone()],
                        revision: dependency.rev.clone(),
                    },
                );
            }
        }
        Ok(())
    }

    pub fn get(&self, root: &str) -> Option<&IndexedRoot> {
        self.roots.get(root)
    }

    pub fn roots(&self) -> impl Iterator<Item = &IndexedRoot> {
        self.roots.values()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
