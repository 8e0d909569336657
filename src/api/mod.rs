use std::{io::Write, num::NonZeroUsize, path::PathBuf};

use thiserror::Error;

use crate::{
    cli::command_handlers::do_verify,
    fetch::FetchError,
    git::CacheError,
    model::ParseError,
    report::Outcome,
    resolver::{RepoRootResolver, ResolveError},
    verify::VerifyError,
};

mod builder;

pub use builder::VendorVerifyBuilder;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Error while reading manifest {path}: {source}")]
    Manifest { path: String, source: ParseError },
    #[error("Error while resolving dependencies: {0}")]
    Resolve(#[from] ResolveError),
    #[error("Error while opening the repository cache: {0}")]
    Cache(#[from] CacheError),
    #[error("Error while checking out repositories: {0}")]
    Fetch(#[from] FetchError),
    #[error("Error while comparing vendored files: {0}")]
    Verify(#[from] VerifyError),
    #[error("Error while writing the report: {0}")]
    Output(#[from] std::io::Error),
    #[error("Error while creating the HTTP client: {0}")]
    Http(anyhow::Error),
}

/// Everything a verification run needs, resolved once by the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOptions {
    pub manifest_path: PathBuf,
    pub vendor_directory: PathBuf,
    /// Parent of the `vendor-verify` cache directory.
    pub cache_directory: PathBuf,
    pub repair: bool,
    pub jobs: NonZeroUsize,
}

pub struct VendorVerify {
    options: VerifyOptions,
    resolver: Box<dyn RepoRootResolver>,
}

impl VendorVerify {
    pub fn builder() -> VendorVerifyBuilder {
        VendorVerifyBuilder::default()
    }

    pub fn options(&self) -> &VerifyOptions {
        &self.options
    }

    /// Verifies the vendor directory against the manifest, writing progress
    /// markers and diffs to `out`.
    ///
    /// Mismatches are reported through the returned [`Outcome`]; only
    /// failures that stop the run are returned as errors.
    pub fn verify(&self, out: &mut impl Write) -> Result<Outcome, Error> {
        do_verify(&self.options, self.resolver.as_ref(), out)
    }
}
