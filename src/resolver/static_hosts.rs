use std::sync::OnceLock;

use log::debug;
use regex_lite::{Captures, Regex};
use serde::Deserialize;

use crate::model::{RepoRoot, Vcs};

use super::{HttpClient, ResolveError};

/// How the VCS of a matched host is determined.
enum HostVcs {
    Fixed(Vcs),
    /// Named by the `vcs` capture group.
    Captured,
    /// Asked from the Bitbucket API.
    Bitbucket,
}

struct KnownHost {
    name: &'static str,
    prefix: &'static str,
    pattern: Regex,
    vcs: HostVcs,
    /// Repository names ending in `.git` are not valid for this host.
    no_vcs_suffix: bool,
}

fn known_hosts() -> &'static [KnownHost] {
    static HOSTS: OnceLock<Vec<KnownHost>> = OnceLock::new();
    HOSTS.get_or_init(|| {
        vec![
            KnownHost {
                name: "GitHub",
                prefix: "github.com/",
                pattern: Regex::new(
                    r"^(?P<root>github\.com/[A-Za-z0-9_.\-]+/[A-Za-z0-9_.\-]+)(/[A-Za-z0-9_.\-]+)*$",
                )
                .unwrap(),
                vcs: HostVcs::Fixed(Vcs::Git),
                no_vcs_suffix: true,
            },
            KnownHost {
                name: "Bitbucket",
                prefix: "bitbucket.org/",
                pattern: Regex::new(
                    r"^(?P<root>bitbucket\.org/(?P<bitname>[A-Za-z0-9_.\-]+/[A-Za-z0-9_.\-]+))(/[A-Za-z0-9_.\-]+)*$",
                )
                .unwrap(),
                vcs: HostVcs::Bitbucket,
                no_vcs_suffix: false,
            },
            KnownHost {
                name: "Launchpad",
                prefix: "launchpad.net/",
                pattern: Regex::new(
                    r"^(?P<root>launchpad\.net/(([A-Za-z0-9_.\-]+)(/[A-Za-z0-9_.\-]+)?|~[A-Za-z0-9_.\-]+/(\+junk|[A-Za-z0-9_.\-]+)/[A-Za-z0-9_.\-]+))(/[A-Za-z0-9_.\-]+)*$",
                )
                .unwrap(),
                vcs: HostVcs::Fixed(Vcs::Bazaar),
                no_vcs_suffix: false,
            },
            KnownHost {
                name: "IBM DevOps Services",
                prefix: "hub.jazz.net/git/",
                pattern: Regex::new(
                    r"^(?P<root>hub\.jazz\.net/git/[a-z0-9]+/[A-Za-z0-9_.\-]+)(/[A-Za-z0-9_.\-]+)*$",
                )
                .unwrap(),
                vcs: HostVcs::Fixed(Vcs::Git),
                no_vcs_suffix: true,
            },
            KnownHost {
                name: "Apache",
                prefix: "git.apache.org/",
                pattern: Regex::new(
                    r"^(?P<root>git\.apache\.org/[a-z0-9_.\-]+\.git)(/[A-Za-z0-9_.\-]+)*$",
                )
                .unwrap(),
                vcs: HostVcs::Fixed(Vcs::Git),
                no_vcs_suffix: false,
            },
            KnownHost {
                name: "OpenStack",
                prefix: "git.openstack.org/",
                pattern: Regex::new(
                    r"^(?P<root>git\.openstack\.org/[A-Za-z0-9_.\-]+/[A-Za-z0-9_.\-]+)(\.git)?(/[A-Za-z0-9_.\-]+)*$",
                )
                .unwrap(),
                vcs: HostVcs::Fixed(Vcs::Git),
                no_vcs_suffix: false,
            },
            // Any host, as long as the repository path ends in a VCS suffix:
            // example.com/repo.git/pkg
            KnownHost {
                name: "generic",
                prefix: "",
                pattern: Regex::new(
                    r"^(?P<root>(?P<repo>([a-z0-9.\-]+\.)+[a-z0-9.\-]+(:[0-9]+)?/[A-Za-z0-9_.\-/]*?)\.(?P<vcs>bzr|git|hg|svn))(/[A-Za-z0-9_.\-]+)*$",
                )
                .unwrap(),
                vcs: HostVcs::Captured,
                no_vcs_suffix: false,
            },
        ]
    })
}

/// Matches `import_path` against the table of well known hosts.
///
/// Returns `Ok(None)` when no host claims the path, in which case the caller
/// falls back to meta tag discovery.
pub(super) fn resolve<C: HttpClient>(
    import_path: &str,
    client: &C,
) -> Result<Option<RepoRoot>, ResolveError> {
    for host in known_hosts() {
        if !import_path.starts_with(host.prefix) {
            continue;
        }
        let Some(captures) = host.pattern.captures(import_path) else {
            if host.prefix.is_empty() {
                continue;
            }
            return Err(ResolveError::InvalidHostPath {
                host: host.name,
                import_path: import_path.to_owned(),
            });
        };

        let root = capture(&captures, "root");
        if host.no_vcs_suffix && root.ends_with(".git") {
            return Err(ResolveError::InvalidHostPath {
                host: host.name,
                import_path: import_path.to_owned(),
            });
        }

        let vcs = match host.vcs {
            HostVcs::Fixed(vcs) => vcs,
            HostVcs::Captured => capture(&captures, "vcs").parse().map_err(|source| {
                ResolveError::Vcs {
                    import_path: import_path.to_owned(),
                    source,
                }
            })?,
            HostVcs::Bitbucket => bitbucket_vcs(import_path, capture(&captures, "bitname"), client)?,
        };

        // The generic pattern clones from the path without its VCS suffix.
        let repo = captures.name("repo").map_or(root, |m| m.as_str());
        debug!("{} matched known host {}", import_path, host.name);
        return Ok(Some(RepoRoot::new(root, format!("https://{}", repo), vcs)));
    }
    Ok(None)
}

fn capture<'h>(captures: &Captures<'h>, name: &str) -> &'h str {
    captures.name(name).map(|m| m.as_str()).unwrap_or_default()
}

#[derive(Deserialize)]
struct BitbucketRepository {
    scm: String,
}

fn bitbucket_vcs<C: HttpClient>(
    import_path: &str,
    bitname: &str,
    client: &C,
) -> Result<Vcs, ResolveError> {
    let url = format!("https://api.bitbucket.org/2.0/repositories/{}", bitname);
    let body = client.get(&url).map_err(|source| ResolveError::Http {
        url: url.clone(),
        source,
    })?;
    let repository: BitbucketRepository =
        serde_json::from_str(&body).map_err(|source| ResolveError::Decode { url, source })?;
    repository
        .scm
        .parse()
        .map_err(|source| ResolveError::Vcs {
            import_path: import_path.to_owned(),
            source,
        })
}
