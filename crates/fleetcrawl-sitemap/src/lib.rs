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

//! Sitemap discovery: recursively walks a sitemap index down
//! to its leaf urlsets, handing discovered content URLs off to a
//! [`UrlHandler`] implemented by the caller.

mod error;
mod parse;

use std::collections::HashSet;
use std::io::Read as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use url::Url;

pub use error::{Error, Result};
pub use parse::{parse_sitemap, SitemapEntry};

/// The sitemap crate's own narrow view of "fetch a URL", kept independent
/// of whatever HTTP client or engine the caller uses (mirrors
/// `fleetcrawl_robots::RobotsFetcher`).
#[async_trait]
pub trait SitemapFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchOutcome>;
}

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Found(Vec<u8>),
    NotFound,
    Unreachable,
}

/// Delegate for accepted content URLs; the coordinator wires this to a
/// `CrawlTracker::lock_url` + `add_job` pair without this crate needing to
/// know about crawls at all.
#[async_trait]
pub trait UrlHandler: Send + Sync {
    async fn handle(&self, crawl_id: &str, urls: Vec<Url>) -> Result<usize>;
}

#[derive(Debug, Clone)]
pub struct SitemapOptions {
    /// Max distinct sitemap URLs visited before giving up on this tree;
    /// bounds self-referential or mutually-referential sitemap cycles.
    pub hit_cap: usize,
    pub timeout: Duration,
    pub max_concurrent_fetches: usize,
}

impl Default for SitemapOptions {
    fn default() -> Self {
        Self { hit_cap: 100, timeout: Duration::from_secs(120), max_concurrent_fetches: 8 }
    }
}

struct Shared<'a> {
    fetcher: &'a dyn SitemapFetcher,
    handler: &'a dyn UrlHandler,
    crawl_id: String,
    options: SitemapOptions,
    visited: std::sync::Mutex<HashSet<String>>,
    accepted: AtomicUsize,
}

pub struct SitemapTraverser;

impl SitemapTraverser {
    /// Walks the sitemap tree rooted at `seed`, handing every content URL
    /// found to `handler`. Returns the number of URLs accepted by
    /// `handler`. A timeout stops the walk early and returns the partial
    /// count rather than erroring, since a crawl with a slow sitemap host
    /// is still better served by what we found before the deadline.
    pub async fn try_get_sitemap(
        crawl_id: &str,
        seed: Url,
        handler: &dyn UrlHandler,
        fetcher: &dyn SitemapFetcher,
        options: SitemapOptions,
    ) -> Result<usize> {
        let shared = Arc::new(Shared {
            fetcher,
            handler,
            crawl_id: crawl_id.to_string(),
            options: options.clone(),
            visited: std::sync::Mutex::new(HashSet::new()),
            accepted: AtomicUsize::new(0),
        });

        match tokio::time::timeout(options.timeout, walk(shared.clone(), seed)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::debug!(%err, crawl_id, "sitemap traversal ended with an error, keeping partial result");
            }
            Err(_) => {
                tracing::debug!(crawl_id, "sitemap traversal timed out, keeping partial result");
            }
        }

        Ok(shared.accepted.load(Ordering::Relaxed))
    }
}

fn walk<'a>(shared: Arc<Shared<'a>>, url: Url) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move { walk_inner(shared, url).await })
}

async fn walk_inner<'a>(shared: Arc<Shared<'a>>, url: Url) -> Result<()> {
    {
        let mut visited = shared.visited.lock().unwrap();
        if visited.len() >= shared.options.hit_cap {
            return Ok(());
        }
        if !visited.insert(url.to_string()) {
            return Ok(());
        }
    }

    let body = match shared.fetcher.fetch(&url).await? {
        FetchOutcome::Found(bytes) => bytes,
        FetchOutcome::NotFound | FetchOutcome::Unreachable => return Ok(()),
    };

    let text = decode_body(&url, &body);
    let entries = parse_sitemap(&text);

    let mut content_urls = vec![];
    let mut child_sitemaps = vec![];
    for entry in entries {
        match entry {
            SitemapEntry::Url(u) => content_urls.push(u),
            SitemapEntry::Sitemap(u) => child_sitemaps.push(u),
        }
    }

    if !content_urls.is_empty() {
        let accepted = shared.handler.handle(&shared.crawl_id, content_urls).await?;
        shared.accepted.fetch_add(accepted, Ordering::Relaxed);
    }

    for batch in child_sitemaps.chunks(shared.options.max_concurrent_fetches) {
        let futures = batch.iter().cloned().map(|child| {
            let shared = shared.clone();
            async move {
                if let Err(err) = walk(shared, child.clone()).await {
                    tracing::debug!(%err, sitemap = %child, "child sitemap fetch failed");
                }
            }
        });
        join_all(futures).await;
    }

    Ok(())
}

/// If `origin` is a subdomain of its public-suffix root domain, additionally
/// walks the root domain's `/sitemap.xml`, handing the handler only the
/// content URLs that match `origin`'s own hostname. A no-op when `origin`
/// already is the root domain.
pub async fn try_get_maindomain_sitemap_for_subdomain(
    crawl_id: &str,
    origin: &Url,
    handler: &dyn UrlHandler,
    fetcher: &dyn SitemapFetcher,
    options: SitemapOptions,
) -> Result<usize> {
    let Some(base) = fleetcrawl_urls::extract_base_domain(origin) else { return Ok(0) };
    if fleetcrawl_urls::same_subdomain(origin, &base) {
        return Ok(0);
    }
    let Ok(seed) = base.join("/sitemap.xml") else { return Ok(0) };

    let filter = HostFilteredHandler { inner: handler, host: origin.host_str().map(str::to_string) };
    SitemapTraverser::try_get_sitemap(crawl_id, seed, &filter, fetcher, options).await
}

/// Wraps a [`UrlHandler`], dropping any URL whose host doesn't match the
/// one it was constructed with before delegating.
struct HostFilteredHandler<'a> {
    inner: &'a dyn UrlHandler,
    host: Option<String>,
}

#[async_trait]
impl<'a> UrlHandler for HostFilteredHandler<'a> {
    async fn handle(&self, crawl_id: &str, urls: Vec<Url>) -> Result<usize> {
        let filtered: Vec<Url> =
            urls.into_iter().filter(|u| u.host_str().is_some_and(|h| self.host.as_deref() == Some(h))).collect();
        if filtered.is_empty() {
            return Ok(0);
        }
        self.inner.handle(crawl_id, filtered).await
    }
}

/// sitemap.org allows gzip-compressed sitemaps served either with a `.gz`
/// suffix or a gzip magic number; fall back to lossy UTF-8 either way so a
/// misdetected encoding degrades gracefully instead of aborting the walk.
fn decode_body(url: &Url, body: &[u8]) -> String {
    let looks_gzipped = url.path().ends_with(".gz") || body.starts_with(&[0x1f, 0x8b]);
    if looks_gzipped {
        let mut decoder = flate2::read::GzDecoder::new(body);
        let mut out = String::new();
        if decoder.read_to_string(&mut out).is_ok() {
            return out;
        }
    }
    String::from_utf8_lossy(body).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    struct MapFetcher {
        pages: HashMap<String, Vec<u8>>,
    }

    #[async_trait]
    impl SitemapFetcher for MapFetcher {
        async fn fetch(&self, url: &Url) -> Result<FetchOutcome> {
            match self.pages.get(url.as_str()) {
                Some(body) => Ok(FetchOutcome::Found(body.clone())),
                None => Ok(FetchOutcome::NotFound),
            }
        }
    }

    struct CollectingHandler {
        seen: StdMutex<Vec<Url>>,
    }

    #[async_trait]
    impl UrlHandler for CollectingHandler {
        async fn handle(&self, _crawl_id: &str, urls: Vec<Url>) -> Result<usize> {
            let mut seen = self.seen.lock().unwrap();
            let n = urls.len();
            seen.extend(urls);
            Ok(n)
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn recurses_through_sitemap_index() {
        let root = r#"<sitemapindex>
            <sitemap><loc>https://example.com/a.xml</loc></sitemap>
            <sitemap><loc>https://example.com/b.xml</loc></sitemap>
        </sitemapindex>"#;
        let a = r#"<urlset><url><loc>https://example.com/page1</loc></url></urlset>"#;
        let b = r#"<urlset><url><loc>https://example.com/page2</loc></url></urlset>"#;

        let mut pages = HashMap::new();
        pages.insert("https://example.com/sitemap.xml".to_string(), root.as_bytes().to_vec());
        pages.insert("https://example.com/a.xml".to_string(), a.as_bytes().to_vec());
        pages.insert("https://example.com/b.xml".to_string(), b.as_bytes().to_vec());

        let fetcher = MapFetcher { pages };
        let handler = CollectingHandler { seen: StdMutex::new(vec![]) };

        let n = SitemapTraverser::try_get_sitemap(
            "crawl-1",
            url("https://example.com/sitemap.xml"),
            &handler,
            &fetcher,
            SitemapOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(n, 2);
        assert_eq!(handler.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn self_referential_cycle_is_bounded_by_hit_cap() {
        let cyclic = r#"<sitemapindex><sitemap><loc>https://example.com/sitemap.xml</loc></sitemap></sitemapindex>"#;
        let mut pages = HashMap::new();
        pages.insert("https://example.com/sitemap.xml".to_string(), cyclic.as_bytes().to_vec());

        let fetcher = MapFetcher { pages };
        let handler = CollectingHandler { seen: StdMutex::new(vec![]) };

        let n = SitemapTraverser::try_get_sitemap(
            "crawl-1",
            url("https://example.com/sitemap.xml"),
            &handler,
            &fetcher,
            SitemapOptions { hit_cap: 5, ..Default::default() },
        )
        .await
        .unwrap();

        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn gzip_encoded_sitemap_is_decoded() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let body = r#"<urlset><url><loc>https://example.com/gz-page</loc></url></urlset>"#;
        let mut encoder = GzEncoder::new(vec![], Compression::default());
        encoder.write_all(body.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut pages = HashMap::new();
        pages.insert("https://example.com/sitemap.xml.gz".to_string(), compressed);

        let fetcher = MapFetcher { pages };
        let handler = CollectingHandler { seen: StdMutex::new(vec![]) };

        let n = SitemapTraverser::try_get_sitemap(
            "crawl-1",
            url("https://example.com/sitemap.xml.gz"),
            &handler,
            &fetcher,
            SitemapOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(n, 1);
    }

    #[tokio::test]
    async fn subdomain_fallback_queries_maindomain_sitemap_filtered_to_subdomain_host() {
        let root = r#"<urlset>
            <url><loc>https://docs.example.com/guide</loc></url>
            <url><loc>https://shop.example.com/item</loc></url>
        </urlset>"#;
        let mut pages = HashMap::new();
        pages.insert("https://example.com/sitemap.xml".to_string(), root.as_bytes().to_vec());

        let fetcher = MapFetcher { pages };
        let handler = CollectingHandler { seen: StdMutex::new(vec![]) };

        let n = try_get_maindomain_sitemap_for_subdomain(
            "crawl-1",
            &url("https://docs.example.com/"),
            &handler,
            &fetcher,
            SitemapOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(n, 1);
        let seen = handler.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].as_str(), "https://docs.example.com/guide");
    }

    #[tokio::test]
    async fn subdomain_fallback_is_a_noop_for_root_domain_origin() {
        let fetcher = MapFetcher { pages: HashMap::new() };
        let handler = CollectingHandler { seen: StdMutex::new(vec![]) };

        let n = try_get_maindomain_sitemap_for_subdomain(
            "crawl-1",
            &url("https://example.com/"),
            &handler,
            &fetcher,
            SitemapOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(n, 0);
        assert!(handler.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_sitemap_yields_zero_without_erroring() {
        let fetcher = MapFetcher { pages: HashMap::new() };
        let handler = CollectingHandler { seen: StdMutex::new(vec![]) };

        let n = SitemapTraverser::try_get_sitemap(
            "crawl-1",
            url("https://example.com/sitemap.xml"),
            &handler,
            &fetcher,
            SitemapOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(n, 0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn node_url(i: usize) -> Url {
            url(&format!("https://example.com/node-{i}.xml"))
        }

        /// Serves an arbitrary (possibly cyclic) graph of sitemap-index
        /// nodes and counts how many times `fetch` was called.
        struct GraphFetcher {
            edges: Vec<Vec<usize>>,
            fetch_count: AtomicUsize,
        }

        #[async_trait]
        impl SitemapFetcher for GraphFetcher {
            async fn fetch(&self, url: &Url) -> Result<FetchOutcome> {
                self.fetch_count.fetch_add(1, Ordering::Relaxed);
                let Some(idx) = url.path().strip_prefix("/node-").and_then(|s| s.strip_suffix(".xml")).and_then(|s| s.parse::<usize>().ok())
                else {
                    return Ok(FetchOutcome::NotFound);
                };
                let Some(children) = self.edges.get(idx) else { return Ok(FetchOutcome::NotFound) };
                let body = children
                    .iter()
                    .map(|&c| format!("<sitemap><loc>{}</loc></sitemap>", node_url(c)))
                    .collect::<String>();
                Ok(FetchOutcome::Found(format!("<sitemapindex>{body}</sitemapindex>").into_bytes()))
            }
        }

        proptest! {
            /// The number of distinct sitemap URLs fetched never
            /// exceeds `hit_cap`, even when the sitemap graph is cyclic.
            #[test]
            fn hit_set_is_bounded_under_adversarial_cycles(
                node_count in 1usize..12,
                hit_cap in 1usize..8,
                seed_edges in proptest::collection::vec(0usize..12, 0..40),
            ) {
                let edges: Vec<Vec<usize>> = (0..node_count)
                    .map(|i| seed_edges.iter().filter(|&&e| e % node_count.max(1) != i).map(|&e| e % node_count.max(1)).take(4).collect())
                    .collect();

                let rt = tokio::runtime::Runtime::new().unwrap();
                let fetch_count = rt.block_on(async {
                    let fetcher = GraphFetcher { edges, fetch_count: AtomicUsize::new(0) };
                    let handler = CollectingHandler { seen: StdMutex::new(vec![]) };
                    let _ = SitemapTraverser::try_get_sitemap(
                        "crawl-1",
                        node_url(0),
                        &handler,
                        &fetcher,
                        SitemapOptions { hit_cap, ..Default::default() },
                    )
                    .await
                    .unwrap();
                    fetcher.fetch_count.load(Ordering::Relaxed)
                });

                prop_assert!(fetch_count <= hit_cap);
            }
        }
    }
}
