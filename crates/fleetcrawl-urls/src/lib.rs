// fleetcrawl is an open source distributed web scraping and crawling service.
// Copyright (C) 2026 fleetcrawl contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! URL canonicalization, www/scheme/trailing-slash permutation for
//! similarity dedup, and public-suffix-aware same-domain/subdomain checks.

pub mod error;
pub mod ext;

pub use error::{Error, Result};
pub use ext::UrlExt;

use url::Url;

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions {
    pub ignore_query_parameters: bool,
}

/// Drop the fragment (always), optionally the query string, and
/// lowercase the hostname. Idempotent: `normalize(normalize(u)) == normalize(u)`.
pub fn normalize(url: &Url, opts: NormalizeOptions) -> Url {
    let mut out = url.clone();
    out.set_fragment(None);
    if opts.ignore_query_parameters {
        out.set_query(None);
    }
    if let Some(host) = out.host_str() {
        let lowered = host.to_lowercase();
        if lowered != host {
            let _ = out.set_host(Some(&lowered));
        }
    }
    out
}

/// The 4-axis cross product of `{www, no-www} x {http, https} x
/// {bare, trailing-slash, index.html, index.php}`, deduplicated. For
/// non-http(s) schemes the scheme axis collapses to the URL's own scheme.
pub fn permutations(url: &Url) -> Vec<Url> {
    let Some(host) = url.host_str() else { return vec![url.clone()] };

    let bare_host = host.strip_prefix("www.").unwrap_or(host);
    let hosts = [bare_host.to_string(), format!("www.{bare_host}")];

    let schemes: Vec<&str> = if url.scheme() == "http" || url.scheme() == "https" {
        vec!["http", "https"]
    } else {
        vec![url.scheme()]
    };

    let path = url.path();
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    let path_variants: Vec<String> = vec![
        trimmed.to_string(),
        format!("{trimmed}/"),
        format!("{trimmed}/index.html"),
        format!("{trimmed}/index.php"),
    ];

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();

    for host in &hosts {
        for scheme in &schemes {
            for path in &path_variants {
                let mut candidate = url.clone();
                if candidate.set_scheme(scheme).is_err() {
                    continue;
                }
                if candidate.set_host(Some(host)).is_err() {
                    continue;
                }
                candidate.set_path(path);
                let key = candidate.to_string();
                if seen.insert(key) {
                    out.push(candidate);
                }
            }
        }
    }

    out
}

pub fn same_domain(a: &Url, b: &Url) -> bool {
    match (a.root_domain(), b.root_domain()) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
        _ => false,
    }
}

pub fn same_subdomain(a: &Url, b: &Url) -> bool {
    match (a.host_str(), b.host_str()) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
        _ => false,
    }
}

/// `https://{rootDomain}` for a URL's public-suffix root domain, e.g.
/// `https://docs.example.com/guide` -> `https://example.com`. Used to build
/// the "try crawling from base.tld" warning.
pub fn extract_base_domain(url: &Url) -> Option<Url> {
    let root = url.root_domain()?;
    Url::parse(&format!("{}://{}", url.scheme(), root)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_drops_fragment_and_lowercases_host() {
        let url = Url::parse("https://EXAMPLE.com/a?b=1#frag").unwrap();
        let out = normalize(&url, NormalizeOptions::default());
        assert_eq!(out.as_str(), "https://example.com/a?b=1");
    }

    #[test]
    fn normalize_drops_query_when_requested() {
        let url = Url::parse("https://example.com/a?b=1").unwrap();
        let out = normalize(&url, NormalizeOptions { ignore_query_parameters: true });
        assert_eq!(out.as_str(), "https://example.com/a");
    }

    #[test]
    fn normalize_is_idempotent() {
        let url = Url::parse("https://EXAMPLE.com/a?b=1#frag").unwrap();
        let once = normalize(&url, NormalizeOptions::default());
        let twice = normalize(&once, NormalizeOptions::default());
        assert_eq!(once, twice);
    }

    #[test]
    fn permutations_cover_the_www_and_scheme_axes() {
        let url = Url::parse("http://www.x.com/a").unwrap();
        let perms = permutations(&url);
        let strs: Vec<String> = perms.iter().map(|u| u.to_string()).collect();
        assert!(strs.contains(&"https://x.com/a".to_string()));
        assert!(strs.contains(&"http://www.x.com/a/index.html".to_string()));
    }

    #[test]
    fn permutations_collapse_scheme_axis_for_non_http() {
        let url = Url::parse("ftp://x.com/a").unwrap();
        let perms = permutations(&url);
        assert!(perms.iter().all(|u| u.scheme() == "ftp"));
    }

    #[test]
    fn same_domain_handles_multi_part_tlds() {
        let a = Url::parse("https://shop.example.co.uk").unwrap();
        let b = Url::parse("https://blog.example.co.uk").unwrap();
        assert!(same_domain(&a, &b));
        assert!(!same_subdomain(&a, &b));
    }

    #[test]
    fn extract_base_domain_round_trips_into_same_domain() {
        let url = Url::parse("https://docs.example.com/guide").unwrap();
        let base = extract_base_domain(&url).unwrap();
        assert!(same_domain(&url, &base));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// `normalize` idempotence, fuzzed over the axes it touches:
            /// host casing, query/fragment presence, ignore-query option.
            #[test]
            fn normalize_is_idempotent(
                host in "[a-z]{1,8}\\.[a-z]{2,4}",
                path in "[a-z0-9/]{0,12}",
                query in proptest::option::of("[a-z0-9=&]{0,10}"),
                fragment in proptest::option::of("[a-z0-9]{0,6}"),
                ignore_query_parameters: bool,
            ) {
                let mut raw = format!("https://{host}/{path}");
                if let Some(q) = &query {
                    raw.push('?');
                    raw.push_str(q);
                }
                if let Some(f) = &fragment {
                    raw.push('#');
                    raw.push_str(f);
                }
                let Ok(url) = Url::parse(&raw) else { return Ok(()) };

                let opts = NormalizeOptions { ignore_query_parameters };
                let once = normalize(&url, opts);
                let twice = normalize(&once, opts);
                prop_assert_eq!(once, twice);
            }
        }
    }
}
