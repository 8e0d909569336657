use std::{env, num::NonZeroUsize, path::PathBuf};

use crate::{
    api::{Error, VerifyOptions},
    resolver::{GoImportResolver, RepoRootResolver},
    VendorVerify,
};

#[derive(Default)]
pub struct VendorVerifyBuilder {
    manifest_path: Option<PathBuf>,
    vendor_directory: Option<PathBuf>,
    cache_directory: Option<PathBuf>,
    repair: bool,
    jobs: Option<NonZeroUsize>,
    resolver: Option<Box<dyn RepoRootResolver>>,
}

impl VendorVerifyBuilder {
    /// Path to the Godeps manifest.
    ///
    /// Defaults to `Godeps/Godeps.json`.
    pub fn manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = Some(path.into());
        self
    }

    /// Directory holding the vendored copies, one subdirectory per import path.
    ///
    /// Defaults to `vendor`.
    pub fn vendor_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.vendor_directory = Some(path.into());
        self
    }

    /// Location of the repository cache. Clones are kept in a `vendor-verify`
    /// subdirectory.
    ///
    /// Defaults to the system temp directory.
    pub fn cache_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_directory = Some(path.into());
        self
    }

    /// Overwrite mismatching vendored files with their upstream content.
    pub fn repair(mut self, repair: bool) -> Self {
        self.repair = repair;
        self
    }

    /// Number of repositories checked out and compared in parallel.
    ///
    /// Defaults to 1.
    pub fn jobs(mut self, jobs: NonZeroUsize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Replaces `go get` style import path resolution.
    pub fn resolver(mut self, resolver: impl RepoRootResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    pub fn try_build(self) -> Result<VendorVerify, Error> {
        let Self {
            manifest_path,
            vendor_directory,
            cache_directory,
            repair,
            jobs,
            resolver,
        } = self;

        let resolver = match resolver {
            Some(resolver) => resolver,
            None => Box::new(GoImportResolver::with_default_client().map_err(Error::Http)?),
        };

        Ok(VendorVerify {
            options: VerifyOptions {
                manifest_path: manifest_path
                    .unwrap_or_else(|| PathBuf::from("Godeps/Godeps.json")),
                vendor_directory: vendor_directory.unwrap_or_else(|| PathBuf::from("vendor")),
                cache_directory: cache_directory.unwrap_or_else(env::temp_dir),
                repair,
                jobs: jobs.unwrap_or(NonZeroUsize::MIN),
            },
            resolver,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::testing::FixedResolver;

    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let tool = VendorVerify::builder()
            .resolver(FixedResolver::default())
            .try_build()
            .unwrap();
        assert_eq!(
            tool.options(),
            &VerifyOptions {
                manifest_path: PathBuf::from("Godeps/Godeps.json"),
                vendor_directory: PathBuf::from("vendor"),
                cache_directory: env::temp_dir(),
                repair: false,
                jobs: NonZeroUsize::MIN,
            }
        );
    }
}
