mod discovery;
pub mod index;
mod static_hosts;

use log::debug;
use thiserror::Error;

use crate::model::{ParseError, RepoRoot, Vcs};

pub use discovery::{HttpClient, MetaImport, ReqwestHttpClient};
pub use index::{IndexedRoot, ResolutionIndex};

/// Maps an import path to the repository that serves it.
///
/// Implementations are called once per import path; grouping import paths
/// that share a repository is the job of [`ResolutionIndex`].
pub trait RepoRootResolver {
    fn resolve(&self, import_path: &str) -> Result<RepoRoot, ResolveError>;
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Invalid import path {import_path:?}: {reason}")]
    InvalidImportPath {
        import_path: String,
        reason: &'static str,
    },
    #[error("Invalid {host} import path {import_path:?}")]
    InvalidHostPath {
        host: &'static str,
        import_path: String,
    },
    #[error("Import path {0:?} does not begin with a hostname")]
    NoHostname(String),
    #[error("Error while fetching {url}: {source}")]
    Http { url: String, source: anyhow::Error },
    #[error("Error while decoding response from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },
    #[error("No go-import meta tag for {import_path:?} found at {url}")]
    NoMatchingMeta { import_path: String, url: String },
    #[error("Multiple go-import meta tags for {import_path:?} found at {url}")]
    MultipleMeta { import_path: String, url: String },
    #[error("go-import meta tag for {prefix:?} at {url} does not match the one found for {import_path:?}")]
    MetaMismatch {
        import_path: String,
        prefix: String,
        url: String,
    },
    #[error("Repository URL {repo:?} for {import_path:?} has no scheme")]
    InvalidRepoUrl { import_path: String, repo: String },
    #[error("Error while parsing repository root for {import_path:?}: {source}")]
    Vcs {
        import_path: String,
        source: ParseError,
    },
    #[error("Repository {root} uses {vcs}, but only Git dependencies can be verified")]
    UnsupportedVcs { root: String, vcs: Vcs },
    #[error("Repository {root} is pinned at both {first} ({first_path}) and {second} ({second_path})")]
    ConflictingRevisions {
        root: String,
        first: String,
        first_path: String,
        second: String,
        second_path: String,
    },
    #[error("Repository {root} resolved to both {first} and {second}")]
    ConflictingRepositories {
        root: String,
        first: String,
        second: String,
    },
}

/// Resolves import paths the way `go get` does: a fixed table of well known
/// hosts first, then `<meta name="go-import">` discovery over HTTPS.
pub struct GoImportResolver<C> {
    client: C,
}

impl<C: HttpClient> GoImportResolver<C> {
    pub fn new(client: C) -> Self {
        GoImportResolver { client }
    }
}

impl GoImportResolver<ReqwestHttpClient> {
    pub fn with_default_client() -> anyhow::Result<Self> {
        Ok(Self::new(ReqwestHttpClient::new()?))
    }
}

impl<C: HttpClient> RepoRootResolver for GoImportResolver<C> {
    fn resolve(&self, import_path: &str) -> Result<RepoRoot, ResolveError> {
        validate_path(import_path)?;

        let repo_root = match static_hosts::resolve(import_path, &self.client)? {
            Some(repo_root) => repo_root,
            None => discovery::resolve(import_path, &self.client)?,
        };

        // The root names directories under the cache and vendor trees.
        validate_path(&repo_root.root)?;
        if !is_path_prefix(&repo_root.root, import_path) {
            return Err(ResolveError::InvalidImportPath {
                import_path: import_path.to_owned(),
                reason: "resolved repository root is not a prefix of the import path",
            });
        }

        debug!("Resolved {} to {}", import_path, repo_root);
        Ok(repo_root)
    }
}

/// Import paths and repository roots must be clean, relative, `/`-separated
/// paths.
fn validate_path(import_path: &str) -> Result<(), ResolveError> {
    let invalid = |reason| {
        Err(ResolveError::InvalidImportPath {
            import_path: import_path.to_owned(),
            reason,
        })
    };
    if import_path.is_empty() {
        return invalid("empty path");
    }
    if import_path.contains("...") {
        return invalid("wildcards cannot be resolved");
    }
    if import_path.contains('\\') {
        return invalid("backslashes are not allowed");
    }
    for element in import_path.split('/') {
        match element {
            "" => return invalid("empty path element"),
            "." | ".." => return invalid("relative path element"),
            _ => {}
        }
    }
    Ok(())
}

/// Whether `prefix` equals `path` or names a parent directory of it.
pub(crate) fn is_path_prefix(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with('/'),
        None => false,
    }
}
