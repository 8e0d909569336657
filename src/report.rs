use std::io::{self, Write};

use crate::verify::{display_path, RootReport};

pub const RESOLVING_MARKER: &str = "# Resolving package urls to repositories";
pub const COMPARING_MARKER: &str = "# Comparing file contents";
pub const PASSED_MARKER: &str = "# All done";
pub const FAILED_MARKER: &str = "# Failures were detected";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No unrepaired mismatches were found.
    Passed,
    /// At least one vendored file differs from upstream and was left as is.
    Failed,
}

impl Outcome {
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Passed => 0,
            Outcome::Failed => 1,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub roots: usize,
    pub files: usize,
    pub mismatches: usize,
    pub repaired: usize,
}

impl Summary {
    pub fn outcome(&self) -> Outcome {
        if self.mismatches > self.repaired {
            Outcome::Failed
        } else {
            Outcome::Passed
        }
    }
}

pub fn write_checkout_marker(out: &mut dyn Write, repositories: usize) -> io::Result<()> {
    writeln!(out, "# Checking out {} repositories locally", repositories)
}

/// Prints every mismatch of every root, in the given order.
pub fn write_reports(out: &mut dyn Write, reports: &[RootReport]) -> io::Result<Summary> {
    let mut summary = Summary::default();
    for report in reports {
        summary.roots += 1;
        summary.files += report.files_checked;
        for mismatch in &report.mismatches {
            let path = display_path(&report.root, &mismatch.path);
            summary.mismatches += 1;
            writeln!(out, "\n[!] file {} has changes", path)?;
            out.write_all(&mismatch.diff)?;
            if mismatch.repaired {
                summary.repaired += 1;
                writeln!(out, "[+] file {} repaired", path)?;
            }
        }
    }
    Ok(summary)
}

pub fn write_outcome(out: &mut dyn Write, outcome: Outcome) -> io::Result<()> {
    match outcome {
        Outcome::Passed => writeln!(out, "{}", PASSED_MARKER),
        Outcome::Failed => writeln!(out, "{}", FAILED_MARKER),
    }
}
