use std::{num::NonZeroUsize, path::PathBuf};

use clap::Parser;

/// Checks that vendored Go dependencies match the upstream revisions pinned
/// in a Godeps manifest.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct CliArgs {
    /// Path to the Godeps.json manifest
    #[clap(long, default_value = "Godeps/Godeps.json")]
    pub manifest: PathBuf,
    /// Vendored dependencies directory
    #[clap(long, default_value = "vendor")]
    pub vendor: PathBuf,
    /// Directory holding the local repository clones.
    /// Defaults to VENDOR_VERIFY_CACHE_DIR or the system temp directory
    #[clap(long)]
    pub cache: Option<PathBuf>,
    /// Log every git and HTTP action
    #[clap(short, long)]
    pub verbose: bool,
    /// Overwrite vendored files with their upstream content
    #[clap(long)]
    pub fix: bool,
    /// Number of repositories processed in parallel
    #[clap(short, long)]
    pub jobs: Option<NonZeroUsize>,
}
