use std::{io::Write, sync::Arc};

use log::{debug, info};

use crate::{
    api::{Error, VerifyOptions},
    fetch::materialize_all,
    git::VendorVerifyCache,
    model::godeps::Manifest,
    report::{self, Outcome},
    resolver::{RepoRootResolver, ResolutionIndex},
    verify::verify_all,
};

/// Handler to the verify command
/// 1 - Reads the Godeps manifest
/// 2 - Resolves every import path to its repository root
/// 3 - Checks out each repository at its pinned revision
/// 4 - Compares, and optionally repairs, the vendored files
pub fn do_verify(
    options: &VerifyOptions,
    resolver: &dyn RepoRootResolver,
    out: &mut dyn Write,
) -> Result<Outcome, Error> {
    writeln!(out, "{}", report::RESOLVING_MARKER)?;
    let manifest = Manifest::from_file(&options.manifest_path).map_err(|source| {
        Error::Manifest {
            path: options.manifest_path.display().to_string(),
            source,
        }
    })?;
    debug!(
        "Manifest of {} lists {} dependencies",
        manifest.import_path,
        manifest.deps.len()
    );
    let index = ResolutionIndex::build(&manifest.deps, resolver)?;

    report::write_checkout_marker(out, index.len())?;
    if index.is_empty() {
        info!("No dependencies to verify");
        writeln!(out, "{}", report::COMPARING_MARKER)?;
        report::write_outcome(out, Outcome::Passed)?;
        return Ok(Outcome::Passed);
    }

    let cache = Arc::new(VendorVerifyCache::new(&options.cache_directory)?);
    let materialized = materialize_all(&cache, &index, options.jobs)?;

    writeln!(out, "{}", report::COMPARING_MARKER)?;
    let reports = verify_all(
        &cache,
        materialized,
        &options.vendor_directory,
        options.repair,
        options.jobs,
    )?;

    let summary = report::write_reports(out, &reports)?;
    let outcome = summary.outcome();
    info!(
        "Verified {} files in {} repositories: {} mismatched, {} repaired",
        summary.files, summary.roots, summary.mismatches, summary.repaired
    );
    report::write_outcome(out, outcome)?;
    Ok(outcome)
}
