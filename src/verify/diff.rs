use std::io;

use similar::TextDiff;

/// Lines of unchanged context around each change.
pub const CONTEXT_LINES: usize = 3;

const VENDOR_LABEL: &str = "vendor";
const UPSTREAM_LABEL: &str = "original";

/// Unified diff turning the vendored content into the upstream content.
///
/// Lines are compared as raw bytes, so content in any encoding diffs
/// line by line. Content holding NUL bytes is reported as binary.
pub fn unified_diff(vendored: &[u8], upstream: &[u8]) -> io::Result<Vec<u8>> {
    if is_binary(vendored) || is_binary(upstream) {
        return Ok(format!(
            "Binary files {} and {} differ\n",
            VENDOR_LABEL, UPSTREAM_LABEL
        )
        .into_bytes());
    }

    let mut diff = Vec::new();
    TextDiff::from_lines(vendored, upstream)
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(VENDOR_LABEL, UPSTREAM_LABEL)
        .to_writer(&mut diff)?;
    Ok(diff)
}

fn is_binary(content: &[u8]) -> bool {
    content.contains(&0)
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn diff_text(vendored: &[u8], upstream: &[u8]) -> String {
        String::from_utf8(unified_diff(vendored, upstream).unwrap()).unwrap()
    }

    #[test]
    fn single_line_change() {
        assert_eq!(
            diff_text(b"X\n", b"Y\n"),
            "--- vendor\n+++ original\n@@ -1 +1 @@\n-X\n+Y\n"
        );
    }

    #[test]
    fn context_is_limited() {
        let vendored: String = (1..=20).map(|n| format!("line {n}\n")).collect();
        let upstream = vendored.replace("line 10\n", "line ten\n");
        let diff = diff_text(vendored.as_bytes(), upstream.as_bytes());

        assert!(diff.contains("@@ -7,7 +7,7 @@"), "{diff}");
        assert!(diff.contains("-line 10\n+line ten\n"));
        assert!(!diff.contains("line 6\n"));
        assert!(!diff.contains("line 14\n"));
    }

    #[test]
    fn removed_file_diffs_against_empty() {
        assert_eq!(
            diff_text(b"a\nb\n", b""),
            "--- vendor\n+++ original\n@@ -1,2 +0,0 @@\n-a\n-b\n"
        );
    }

    #[test]
    fn latin1_content_keeps_its_lines() {
        let vendored = b"package p\n// caf\xe9\nvar x = 1\n";
        let upstream = b"package p\n// caf\xe9\nvar x = 2\n";

        assert_eq!(
            unified_diff(vendored, upstream).unwrap(),
            b"--- vendor\n+++ original\n@@ -1,3 +1,3 @@\n package p\n // caf\xe9\n-var x = 1\n+var x = 2\n"
                .to_vec()
        );
    }

    #[test]
    fn binary_content() {
        assert_eq!(
            diff_text(&[0xff, 0x00, 0xfe], b"text\n"),
            "Binary files vendor and original differ\n"
        );
    }
}
