use std::{
    fmt::{Display, Formatter},
    path::PathBuf,
    str::FromStr,
};

use thiserror::Error;

pub mod godeps;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error reading manifest {path}: {source}")]
    IO {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON parsing error in manifest: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Dependency `{0}` has an empty `Rev`")]
    MissingRevision(String),
    #[error("Unknown version control system `{0}`")]
    UnknownVcs(String),
}

/// Version control systems that an import path can resolve to.
///
/// Only [`Vcs::Git`] can be checked out by the cache; the others are kept so
/// that resolution can report what it found before the run is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum Vcs {
    Git,
    Mercurial,
    Subversion,
    Bazaar,
}

impl FromStr for Vcs {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "git" => Ok(Vcs::Git),
            "hg" => Ok(Vcs::Mercurial),
            "svn" => Ok(Vcs::Subversion),
            "bzr" => Ok(Vcs::Bazaar),
            other => Err(ParseError::UnknownVcs(other.to_owned())),
        }
    }
}

impl Display for Vcs {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Vcs::Git => f.write_str("Git"),
            Vcs::Mercurial => f.write_str("Mercurial"),
            Vcs::Subversion => f.write_str("Subversion"),
            Vcs::Bazaar => f.write_str("Bazaar"),
        }
    }
}

/// The repository backing one or more import paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRoot {
    /// Import path prefix that names the repository, e.g. `github.com/pkg/errors`.
    pub root: String,
    /// URL the repository is cloned from.
    pub repo: String,
    pub vcs: Vcs,
}

impl RepoRoot {
    pub fn new(root: impl Into<String>, repo: impl Into<String>, vcs: Vcs) -> Self {
        RepoRoot {
            root: root.into(),
            repo: repo.into(),
            vcs,
        }
    }

    /// The root key as a relative path, used below both the vendor and the
    /// cache directories.
    pub fn to_path(&self) -> PathBuf {
        self.root.split('/').collect()
    }
}

impl Display for RepoRoot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} {})", self.root, self.vcs, self.repo)
    }
}
