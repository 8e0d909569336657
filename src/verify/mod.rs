mod canonical;
pub mod diff;

use std::{
    fs::File,
    io::{self, ErrorKind, Read},
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, info, warn};
use sha2::{Digest as _, Sha256};
use thiserror::Error;
use walkdir::WalkDir;

use crate::{
    fetch::MaterializedRoot,
    git::VendorVerifyCache,
    worker::{run_bounded, PoolError},
};

pub use canonical::only_import_comments_differ;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Vendored copy of {root} not found at {path}")]
    MissingVendorTree { root: String, path: String },
    #[error("Error while walking {path}: {source}")]
    Walk {
        path: String,
        source: walkdir::Error,
    },
    #[error("Error while reading {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("Error while diffing {path}: {source}")]
    Diff { path: String, source: io::Error },
    #[error("Error while repairing {path}: {source}")]
    Repair { path: String, source: io::Error },
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// SHA-256 of a file's content.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        ContentDigest(Sha256::digest(bytes).into())
    }

    pub fn of_reader(mut reader: impl Read) -> io::Result<Self> {
        let mut hasher = Sha256::new();
        io::copy(&mut reader, &mut hasher)?;
        Ok(ContentDigest(hasher.finalize().into()))
    }
}

impl std::fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchKind {
    /// Both sides have the file, with different content.
    Modified,
    /// The file only exists in the vendored copy.
    RemovedUpstream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Match,
    Mismatch(MismatchKind),
}

/// Compares a vendored file with its upstream counterpart, `None` when
/// upstream has no such file.
pub fn compare(vendored: ContentDigest, upstream: Option<ContentDigest>) -> Verdict {
    match upstream {
        Some(upstream) if upstream == vendored => Verdict::Match,
        Some(_) => Verdict::Mismatch(MismatchKind::Modified),
        None => Verdict::Mismatch(MismatchKind::RemovedUpstream),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Path relative to the repository root.
    pub path: PathBuf,
    pub kind: MismatchKind,
    /// Unified diff, in the files' own encoding.
    pub diff: Vec<u8>,
    pub repaired: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Match,
    Mismatch(Mismatch),
}

/// Everything found while verifying one repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootReport {
    pub root: String,
    pub files_checked: usize,
    pub mismatches: Vec<Mismatch>,
}

/// Paths of all non-directory entries below `root`, relative to it, in file
/// name order. Each call starts a fresh walk.
pub fn relative_files(root: &Path) -> impl Iterator<Item = Result<PathBuf, VerifyError>> {
    let root = root.to_path_buf();
    WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(move |entry| match entry {
            Err(source) => Some(Err(VerifyError::Walk {
                path: source
                    .path()
                    .unwrap_or(&root)
                    .display()
                    .to_string(),
                source,
            })),
            Ok(entry) if entry.file_type().is_dir() => None,
            Ok(entry) => Some(
                entry
                    .path()
                    .strip_prefix(&root)
                    .map(Path::to_path_buf)
                    .map_err(|_| VerifyError::Read {
                        path: entry.path().display().to_string(),
                        source: io::Error::new(ErrorKind::InvalidInput, "outside of the walked root"),
                    }),
            ),
        })
}

/// Compares every vendored file of one repository with its working copy.
pub fn verify_root(
    root: &str,
    vendor_dir: &Path,
    upstream_dir: &Path,
    repair: bool,
) -> Result<RootReport, VerifyError> {
    if !vendor_dir.is_dir() {
        return Err(VerifyError::MissingVendorTree {
            root: root.to_owned(),
            path: vendor_dir.display().to_string(),
        });
    }

    let mut report = RootReport {
        root: root.to_owned(),
        files_checked: 0,
        mismatches: Vec::new(),
    };
    for relative_path in relative_files(vendor_dir) {
        let relative_path = relative_path?;
        debug!("checking {}", display_path(root, &relative_path));
        report.files_checked += 1;
        match compare_file(root, vendor_dir, upstream_dir, &relative_path, repair)? {
            FileOutcome::Match => {}
            FileOutcome::Mismatch(mismatch) => report.mismatches.push(mismatch),
        }
    }

    info!(
        "{}: {} files checked, {} mismatched",
        root,
        report.files_checked,
        report.mismatches.len()
    );
    Ok(report)
}

/// Verifies every materialized repository against its vendored copy below
/// `vendor_root`.
pub fn verify_all(
    cache: &Arc<VendorVerifyCache>,
    materialized: Vec<MaterializedRoot>,
    vendor_root: &Path,
    repair: bool,
    jobs: NonZeroUsize,
) -> Result<Vec<RootReport>, VerifyError> {
    let cache = Arc::clone(cache);
    let vendor_root = vendor_root.to_path_buf();
    run_bounded(
        materialized,
        jobs,
        move |materialized| -> Result<_, VerifyError> {
            let repo_root = &materialized.root.repo_root;
            cache.with_root_lock(&repo_root.root, || {
                verify_root(
                    &repo_root.root,
                    &vendor_root.join(repo_root.to_path()),
                    &materialized.path,
                    repair,
                )
            })
        },
    )
}

fn compare_file(
    root: &str,
    vendor_dir: &Path,
    upstream_dir: &Path,
    relative_path: &Path,
    repair: bool,
) -> Result<FileOutcome, VerifyError> {
    let vendored_path = vendor_dir.join(relative_path);
    let upstream_path = upstream_dir.join(relative_path);

    let vendored_digest = digest_file(&vendored_path)?;
    let upstream_digest = match std::fs::metadata(&upstream_path) {
        Err(error) if error.kind() == ErrorKind::NotFound => None,
        Err(source) => return Err(read_error(&upstream_path, source)),
        Ok(metadata) if metadata.is_dir() => None,
        Ok(_) => Some(digest_file(&upstream_path)?),
    };

    let kind = match compare(vendored_digest, upstream_digest) {
        Verdict::Match => return Ok(FileOutcome::Match),
        Verdict::Mismatch(kind) => kind,
    };

    let vendored = read_file(&vendored_path)?;
    let upstream = match kind {
        MismatchKind::Modified => read_file(&upstream_path)?,
        MismatchKind::RemovedUpstream => Vec::new(),
    };
    let diff = diff::unified_diff(&vendored, &upstream).map_err(|source| VerifyError::Diff {
        path: vendored_path.display().to_string(),
        source,
    })?;

    if only_import_comments_differ(&vendored, &upstream) {
        warn!(
            "{} differs from upstream only in canonical import comments",
            display_path(root, relative_path)
        );
    }

    if repair {
        let result = match kind {
            MismatchKind::Modified => std::fs::write(&vendored_path, &upstream),
            MismatchKind::RemovedUpstream => std::fs::remove_file(&vendored_path),
        };
        result.map_err(|source| VerifyError::Repair {
            path: vendored_path.display().to_string(),
            source,
        })?;
        info!("Repaired {}", display_path(root, relative_path));
    }

    Ok(FileOutcome::Mismatch(Mismatch {
        path: relative_path.to_path_buf(),
        kind,
        diff,
        repaired: repair,
    }))
}

fn digest_file(path: &Path) -> Result<ContentDigest, VerifyError> {
    File::open(path)
        .and_then(ContentDigest::of_reader)
        .map_err(|source| read_error(path, source))
}

fn read_file(path: &Path) -> Result<Vec<u8>, VerifyError> {
    std::fs::read(path).map_err(|source| read_error(path, source))
}

fn read_error(path: &Path, source: io::Error) -> VerifyError {
    VerifyError::Read {
        path: path.display().to_string(),
        source,
    }
}

/// `<root>/<relative path>` with `/` separators on every platform.
pub fn display_path(root: &str, relative_path: &Path) -> String {
    let mut path = root.to_owned();
    for component in relative_path.components() {
        path.push('/');
        path.push_str(&component.as_os_str().to_string_lossy());
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn write(dir: &Path, path: &str, content: &str) {
        let path = dir.join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn compare_by_content() {
        let same = ContentDigest::of_bytes(b"same");
        assert_eq!(compare(same, Some(ContentDigest::of_bytes(b"same"))), Verdict::Match);
        assert_eq!(
            compare(
                ContentDigest::of_bytes(b"X"),
                Some(ContentDigest::of_bytes(b"Y"))
            ),
            Verdict::Mismatch(MismatchKind::Modified)
        );
        assert_eq!(
            compare(same, None),
            Verdict::Mismatch(MismatchKind::RemovedUpstream)
        );
    }

    #[test]
    fn streamed_digest_matches_in_memory_digest() {
        let content = vec![7u8; 1 << 20];
        assert_eq!(
            ContentDigest::of_reader(content.as_slice()).unwrap(),
            ContentDigest::of_bytes(&content)
        );
        assert_eq!(
            format!("{:?}", ContentDigest::of_bytes(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn relative_files_are_sorted_and_restartable() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.go", "");
        write(dir.path(), "a/z.go", "");
        write(dir.path(), "a/y/x.go", "");
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();

        let expected = vec![
            PathBuf::from("a").join("y").join("x.go"),
            PathBuf::from("a").join("z.go"),
            PathBuf::from("b.go"),
        ];
        for _ in 0..2 {
            let files: Vec<PathBuf> = relative_files(dir.path())
                .collect::<Result<_, _>>()
                .unwrap();
            assert_eq!(files, expected);
        }
    }

    #[test]
    fn report_modified_and_removed_files() {
        let vendor = tempfile::tempdir().unwrap();
        let upstream = tempfile::tempdir().unwrap();
        write(vendor.path(), "same.go", "package r\n");
        write(upstream.path(), "same.go", "package r\n");
        write(vendor.path(), "foo.go", "X\n");
        write(upstream.path(), "foo.go", "Y\n");
        write(vendor.path(), "sub/gone.go", "package sub\n");

        let report = verify_root("example.com/r", vendor.path(), upstream.path(), false).unwrap();

        assert_eq!(report.files_checked, 3);
        assert_eq!(
            report
                .mismatches
                .iter()
                .map(|m| (m.path.clone(), m.kind, m.repaired))
                .collect::<Vec<_>>(),
            vec![
                (PathBuf::from("foo.go"), MismatchKind::Modified, false),
                (
                    PathBuf::from("sub").join("gone.go"),
                    MismatchKind::RemovedUpstream,
                    false
                ),
            ]
        );
        assert_eq!(
            String::from_utf8_lossy(&report.mismatches[0].diff),
            "--- vendor\n+++ original\n@@ -1 +1 @@\n-X\n+Y\n"
        );
        assert!(String::from_utf8_lossy(&report.mismatches[1].diff).contains("-package sub\n"));
        assert_eq!(
            std::fs::read_to_string(vendor.path().join("foo.go")).unwrap(),
            "X\n"
        );
    }

    #[test]
    fn repair_then_verify_again() {
        let vendor = tempfile::tempdir().unwrap();
        let upstream = tempfile::tempdir().unwrap();
        write(vendor.path(), "foo.go", "X");
        write(upstream.path(), "foo.go", "Y");
        write(vendor.path(), "gone.go", "package r\n");

        let report = verify_root("example.com/r", vendor.path(), upstream.path(), true).unwrap();
        assert_eq!(report.mismatches.len(), 2);
        assert!(report.mismatches.iter().all(|m| m.repaired));
        assert_eq!(std::fs::read(vendor.path().join("foo.go")).unwrap(), b"Y");
        assert!(!vendor.path().join("gone.go").exists());

        let report = verify_root("example.com/r", vendor.path(), upstream.path(), false).unwrap();
        assert_eq!(report.mismatches, vec![]);
    }

    #[test]
    fn latin1_mismatch_is_diffed_line_by_line() {
        let vendor = tempfile::tempdir().unwrap();
        let upstream = tempfile::tempdir().unwrap();
        std::fs::write(vendor.path().join("doc.go"), b"// caf\xe9\npackage r\n").unwrap();
        std::fs::write(upstream.path().join("doc.go"), b"// caf\xe9!\npackage r\n").unwrap();

        let report = verify_root("example.com/r", vendor.path(), upstream.path(), false).unwrap();
        assert_eq!(
            report.mismatches[0].diff,
            b"--- vendor\n+++ original\n@@ -1,2 +1,2 @@\n-// caf\xe9\n+// caf\xe9!\n package r\n"
                .to_vec()
        );
    }

    #[test]
    fn upstream_directory_in_place_of_file() {
        let vendor = tempfile::tempdir().unwrap();
        let upstream = tempfile::tempdir().unwrap();
        write(vendor.path(), "pkg", "was a file\n");
        write(upstream.path(), "pkg/inner.go", "package pkg\n");

        let report = verify_root("example.com/r", vendor.path(), upstream.path(), false).unwrap();
        assert_eq!(report.mismatches[0].kind, MismatchKind::RemovedUpstream);
    }

    #[test]
    fn missing_vendor_tree_is_fatal() {
        let upstream = tempfile::tempdir().unwrap();
        let error = verify_root(
            "example.com/r",
            &upstream.path().join("missing"),
            upstream.path(),
            false,
        )
        .unwrap_err();
        assert!(matches!(error, VerifyError::MissingVendorTree { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_fatal() {
        use std::os::unix::fs::PermissionsExt;

        let vendor = tempfile::tempdir().unwrap();
        let upstream = tempfile::tempdir().unwrap();
        write(vendor.path(), "secret.go", "package r\n");
        write(upstream.path(), "secret.go", "package r\n");
        let path = vendor.path().join("secret.go");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can read the file anyway.
        if std::fs::read(&path).is_ok() {
            return;
        }
        let error = verify_root("example.com/r", vendor.path(), upstream.path(), false).unwrap_err();
        assert!(matches!(error, VerifyError::Read { .. }));
    }

    #[test]
    fn display_path_uses_forward_slashes() {
        assert_eq!(
            display_path("example.com/r", &PathBuf::from("a").join("b.go")),
            "example.com/r/a/b.go"
        );
    }
}
