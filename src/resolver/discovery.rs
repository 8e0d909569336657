use std::{sync::OnceLock, time::Duration};

use log::{debug, trace};
use regex_lite::Regex;
use reqwest::blocking::Client;

use crate::model::RepoRoot;

use super::{is_path_prefix, ResolveError};

/// Minimal HTTP seam used by import path discovery.
pub trait HttpClient {
    /// Returns the response body of a GET request, regardless of status code.
    fn get(&self, url: &str) -> anyhow::Result<String>;
}

pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("vendor-verify/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(ReqwestHttpClient { client })
    }
}

impl HttpClient for ReqwestHttpClient {
    fn get(&self, url: &str) -> anyhow::Result<String> {
        debug!("GET {}", url);
        let response = self.client.get(url).send()?;
        // Servers commonly answer go-get requests with a 404 page that still
        // carries the meta tags.
        trace!("{} responded with {}", url, response.status());
        Ok(response.text()?)
    }
}

/// A `<meta name="go-import" content="prefix vcs repo">` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaImport {
    pub prefix: String,
    pub vcs: String,
    pub repo: String,
}

fn meta_tag_regex() -> &'static Regex {
    static META: OnceLock<Regex> = OnceLock::new();
    META.get_or_init(|| Regex::new(r"(?is)<meta\s[^>]*>").unwrap())
}

fn attribute_regex() -> &'static Regex {
    static ATTRIBUTE: OnceLock<Regex> = OnceLock::new();
    ATTRIBUTE.get_or_init(|| {
        Regex::new(r#"(?is)([a-z][a-z0-9\-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
    })
}

/// Extracts go-import meta tags from the head of an HTML page.
pub fn parse_meta_imports(html: &str) -> Vec<MetaImport> {
    // Only the document head is considered, like the go tool does.
    let head = match html.to_ascii_lowercase().find("<body") {
        Some(end) => &html[..end],
        None => html,
    };

    meta_tag_regex()
        .find_iter(head)
        .filter_map(|tag| {
            let mut name = None;
            let mut content = None;
            for attribute in attribute_regex().captures_iter(tag.as_str()) {
                let value = attribute
                    .get(2)
                    .or_else(|| attribute.get(3))
                    .map(|m| m.as_str());
                match attribute.get(1).map(|m| m.as_str().to_ascii_lowercase()) {
                    Some(key) if key == "name" => name = value,
                    Some(key) if key == "content" => content = value,
                    _ => {}
                }
            }
            if !name.is_some_and(|name| name.eq_ignore_ascii_case("go-import")) {
                return None;
            }
            let fields: Vec<&str> = content?.split_whitespace().collect();
            match fields.as_slice() {
                [prefix, vcs, repo] => Some(MetaImport {
                    prefix: prefix.to_string(),
                    vcs: vcs.to_string(),
                    repo: repo.to_string(),
                }),
                _ => None,
            }
        })
        .collect()
}

pub(super) fn resolve<C: HttpClient>(
    import_path: &str,
    client: &C,
) -> Result<RepoRoot, ResolveError> {
    let host = import_path.split('/').next().unwrap_or_default();
    if !host.contains('.') {
        return Err(ResolveError::NoHostname(import_path.to_owned()));
    }

    let (url, imports) = fetch_meta_imports(import_path, client)?;
    let meta = match_meta_import(&imports, import_path, &url)?;

    if meta.prefix != import_path {
        // The repository root must advertise the same tag, otherwise any
        // page below it could redirect the whole prefix.
        let (root_url, root_imports) = fetch_meta_imports(&meta.prefix, client)?;
        let root_meta = match_meta_import(&root_imports, &meta.prefix, &root_url)?;
        if root_meta != meta {
            return Err(ResolveError::MetaMismatch {
                import_path: import_path.to_owned(),
                prefix: meta.prefix,
                url: root_url,
            });
        }
    }

    if !meta.repo.contains("://") {
        return Err(ResolveError::InvalidRepoUrl {
            import_path: import_path.to_owned(),
            repo: meta.repo,
        });
    }

    let vcs = meta.vcs.parse().map_err(|source| ResolveError::Vcs {
        import_path: import_path.to_owned(),
        source,
    })?;

    Ok(RepoRoot::new(meta.prefix, meta.repo, vcs))
}

fn fetch_meta_imports<C: HttpClient>(
    import_path: &str,
    client: &C,
) -> Result<(String, Vec<MetaImport>), ResolveError> {
    let url = format!("https://{}?go-get=1", import_path);
    let body = client.get(&url).map_err(|source| ResolveError::Http {
        url: url.clone(),
        source,
    })?;
    let imports = parse_meta_imports(&body);
    trace!("Found {} go-import tags at {}", imports.len(), url);
    Ok((url, imports))
}

fn match_meta_import(
    imports: &[MetaImport],
    import_path: &str,
    url: &str,
) -> Result<MetaImport, ResolveError> {
    let mut matching = imports
        .iter()
        .filter(|meta| is_path_prefix(&meta.prefix, import_path));
    match (matching.next(), matching.next()) {
        (Some(meta), None) => Ok(meta.clone()),
        (None, _) => Err(ResolveError::NoMatchingMeta {
            import_path: import_path.to_owned(),
            url: url.to_owned(),
        }),
        (Some(_), Some(_)) => Err(ResolveError::MultipleMeta {
            import_path: import_path.to_owned(),
            url: url.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{model::Vcs, resolver::testing::StaticHttpClient};

    use pretty_assertions::assert_eq;

    const GOPKG_PAGE: &str = r#"<html>
<head>
<meta name="go-import" content="gopkg.in/yaml.v2 git https://gopkg.in/yaml.v2">
<meta name='go-source' content='gopkg.in/yaml.v2 _ https://github.com/go-yaml/yaml/tree/v2{/dir}'>
</head>
<body>
<meta name="go-import" content="gopkg.in/evil git https://evil.example.com/repo">
</body>
</html>"#;

    #[test]
    fn parse_head_only() {
        assert_eq!(
            parse_meta_imports(GOPKG_PAGE),
            vec![MetaImport {
                prefix: "gopkg.in/yaml.v2".to_owned(),
                vcs: "git".to_owned(),
                repo: "https://gopkg.in/yaml.v2".to_owned(),
            }]
        );
    }

    #[test]
    fn parse_attribute_order_and_quotes() {
        let html = r#"<META content='example.org/pkg hg https://hg.example.org/pkg' NAME='go-import'/>"#;
        assert_eq!(
            parse_meta_imports(html),
            vec![MetaImport {
                prefix: "example.org/pkg".to_owned(),
                vcs: "hg".to_owned(),
                repo: "https://hg.example.org/pkg".to_owned(),
            }]
        );
    }

    #[test]
    fn resolve_exact_prefix() {
        let client =
            StaticHttpClient::default().with_page("https://gopkg.in/yaml.v2?go-get=1", GOPKG_PAGE);
        assert_eq!(
            resolve("gopkg.in/yaml.v2", &client).unwrap(),
            RepoRoot::new("gopkg.in/yaml.v2", "https://gopkg.in/yaml.v2", Vcs::Git)
        );
    }

    #[test]
    fn resolve_requires_matching_root_page() {
        let sub = r#"<meta name="go-import" content="example.org/lib git https://git.example.org/lib">"#;
        let root = r#"<meta name="go-import" content="example.org/lib git https://elsewhere.example.org/lib">"#;
        let client = StaticHttpClient::default()
            .with_page("https://example.org/lib/sub?go-get=1", sub)
            .with_page("https://example.org/lib?go-get=1", root);
        assert!(matches!(
            resolve("example.org/lib/sub", &client),
            Err(ResolveError::MetaMismatch { .. })
        ));
    }

    #[test]
    fn resolve_rejects_ambiguous_and_missing_tags() {
        let ambiguous = r#"
<meta name="go-import" content="example.org/a git https://example.org/a.git">
<meta name="go-import" content="example.org/a/b git https://example.org/b.git">"#;
        let client = StaticHttpClient::default()
            .with_page("https://example.org/a/b?go-get=1", ambiguous)
            .with_page("https://example.org/c?go-get=1", "<html></html>");
        assert!(matches!(
            resolve("example.org/a/b", &client),
            Err(ResolveError::MultipleMeta { .. })
        ));
        assert!(matches!(
            resolve("example.org/c", &client),
            Err(ResolveError::NoMatchingMeta { .. })
        ));
    }

    #[test]
    fn resolve_requires_hostname() {
        let client = StaticHttpClient::default();
        assert!(matches!(
            resolve("localpkg/sub", &client),
            Err(ResolveError::NoHostname(_))
        ));
    }

    #[test]
    fn resolve_rejects_repo_without_scheme() {
        let page = r#"<meta name="go-import" content="example.org/x git example.org/x.git">"#;
        let client = StaticHttpClient::default().with_page("https://example.org/x?go-get=1", page);
        assert!(matches!(
            resolve("example.org/x", &client),
            Err(ResolveError::InvalidRepoUrl { .. })
        ));
    }
}
