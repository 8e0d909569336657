use std::sync::OnceLock;

use regex_lite::Regex;

fn import_comment_regex() -> &'static Regex {
    static IMPORT_COMMENT: OnceLock<Regex> = OnceLock::new();
    IMPORT_COMMENT.get_or_init(|| {
        Regex::new(
            r#"(?m)^(package\s+[A-Za-z_][A-Za-z0-9_]*)[ \t]*(?://[ \t]*import[ \t]+"[^"]*"|/\*[ \t]*import[ \t]+"[^"]*"[ \t]*\*/)[ \t]*$"#,
        )
        .unwrap()
    })
}

fn strip_import_comments(source: &str) -> String {
    import_comment_regex()
        .replace_all(source, "$1")
        .into_owned()
}

/// Whether two Go sources differ only in canonical import comments on their
/// `package` clauses, which `go get` strips from vendored copies.
///
/// This is a hint for the reader of a report; such files still count as
/// mismatches.
pub fn only_import_comments_differ(vendored: &[u8], upstream: &[u8]) -> bool {
    match (std::str::from_utf8(vendored), std::str::from_utf8(upstream)) {
        (Ok(vendored), Ok(upstream)) => {
            vendored != upstream
                && strip_import_comments(vendored) == strip_import_comments(upstream)
        }
        _ => false,
    }
}
