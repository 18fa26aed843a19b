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

//! Map pipeline: fan out to search, domain index, and
//! sitemap sources, merge, dedupe, rank, and filter down to a bounded
//! link set for one origin.

mod error;
mod model;
mod rerank;
mod traits;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use fleetcrawl_coordination::CoordinationStore;
use fleetcrawl_sitemap::{SitemapFetcher, SitemapOptions, SitemapTraverser, UrlHandler as SitemapUrlHandler};
use url::Url;

pub use error::{Error, Result};
pub use model::{dedupe_preferring_titled, MapEntry, MapOptions, MapResult, SitemapMode};
pub use rerank::rerank_by_query;
pub use traits::{DomainIndex, SearchProvider};

const DOMAIN_INDEX_FRESHNESS_DAYS: u32 = 14;
const CACHE_TTL: Duration = Duration::from_secs(48 * 60 * 60);

pub struct MapPipeline {
    store: Arc<dyn CoordinationStore>,
    search: Arc<dyn SearchProvider>,
    domain_index: Arc<dyn DomainIndex>,
    sitemap_options: SitemapOptions,
}

impl MapPipeline {
    pub fn new(store: Arc<dyn CoordinationStore>, search: Arc<dyn SearchProvider>, domain_index: Arc<dyn DomainIndex>) -> Self {
        Self::with_sitemap_options(store, search, domain_index, SitemapOptions::default())
    }

    pub fn with_sitemap_options(
        store: Arc<dyn CoordinationStore>,
        search: Arc<dyn SearchProvider>,
        domain_index: Arc<dyn DomainIndex>,
        sitemap_options: SitemapOptions,
    ) -> Self {
        Self { store, search, domain_index, sitemap_options }
    }

    /// Runs the full map pipeline for one origin. `origin` is assumed
    /// already redirect-resolved by the caller (an engine-level HTTP
    /// concern, out of this crate's narrow scope).
    /// `robots_blocked` carries the caller's best-effort robots.txt check
    /// for the origin and only ever contributes a warning, never a
    /// failure.
    pub async fn get_map_results(
        &self,
        job_id: &str,
        options: MapOptions,
        origin: &Url,
        robots_blocked: bool,
        sitemap_fetcher: Option<&dyn SitemapFetcher>,
    ) -> Result<MapResult> {
        let started = Instant::now();
        let mut warning = None;

        if robots_blocked {
            warning = Some("robots.txt disallows fetching this origin; map results may be incomplete".to_string());
        }

        let entries = if options.sitemap == SitemapMode::Only {
            let fetcher = sitemap_fetcher.ok_or_else(|| Error::AllSourcesFailed("no sitemap fetcher configured".into()))?;
            let found = self.run_sitemap(job_id, origin, fetcher).await;
            if found.is_empty() {
                return Err(Error::AllSourcesFailed("sitemap-only map produced no URLs".into()));
            }
            found
        } else {
            self.run_parallel_sources(job_id, &options, origin, sitemap_fetcher).await
        };

        let mut entries = dedupe_preferring_titled(entries);

        if let Some(query) = &options.search {
            rerank_by_query(&mut entries, query);
        }

        entries.retain(|e| self.passes_domain_filters(&options, origin, e));

        let mut entries = dedupe_preferring_titled(dedupe_by_canonical_form(entries));

        // Based on what was actually found for this origin, not the caller's
        // requested `limit` — a `limit=1` request against a site with many
        // links shouldn't warn, and a high-limit request that only turned up
        // 0-1 links should.
        if entries.len() <= 1 && origin.path() != "/" && !origin.path().is_empty() {
            warning = Some("try mapping the base domain instead of a sub-page".to_string());
        }

        entries.truncate(options.max_map_limit.min(options.limit.max(1)));

        Ok(MapResult {
            links: entries.iter().map(|e| e.url.clone()).collect(),
            map_results: entries,
            job_id: job_id.to_string(),
            time_taken_ms: started.elapsed().as_millis() as u64,
            warning,
        })
    }

    async fn run_parallel_sources(
        &self,
        job_id: &str,
        options: &MapOptions,
        origin: &Url,
        sitemap_fetcher: Option<&dyn SitemapFetcher>,
    ) -> Vec<MapEntry> {
        let host = origin.host_str().unwrap_or_default();
        let site_query = match &options.search {
            Some(q) => format!("site:{host} {q}"),
            None => format!("site:{host}"),
        };

        let search_fut = self.cached_search(&site_query, options.limit);
        let index_fut = self.domain_index.query(host, Some(origin.path()), DOMAIN_INDEX_FRESHNESS_DAYS);

        let (search_res, index_res) = tokio::join!(search_fut, index_fut);

        let mut merged = vec![];
        match search_res {
            Ok(mut r) => merged.append(&mut r),
            Err(err) => tracing::debug!(job_id, %err, "map search source failed, continuing without it"),
        }
        match index_res {
            Ok(mut r) => merged.append(&mut r),
            Err(err) => tracing::debug!(job_id, %err, "map domain-index source failed, continuing without it"),
        }

        if options.sitemap == SitemapMode::Include {
            if let Some(fetcher) = sitemap_fetcher {
                merged.append(&mut self.run_sitemap(job_id, origin, fetcher).await);
            }
        }

        merged
    }

    async fn run_sitemap(&self, job_id: &str, origin: &Url, fetcher: &dyn SitemapFetcher) -> Vec<MapEntry> {
        let collector = Arc::new(CollectingUrlHandler::default());
        let seed = match origin.join("/sitemap.xml") {
            Ok(u) => u,
            Err(err) => {
                tracing::debug!(job_id, %err, "could not build sitemap seed url");
                return vec![];
            }
        };

        if let Err(err) =
            SitemapTraverser::try_get_sitemap(job_id, seed, collector.as_ref(), fetcher, self.sitemap_options.clone()).await
        {
            tracing::debug!(job_id, %err, "sitemap source failed, continuing without it");
        }

        if let Err(err) = fleetcrawl_sitemap::try_get_maindomain_sitemap_for_subdomain(
            job_id,
            origin,
            collector.as_ref(),
            fetcher,
            self.sitemap_options.clone(),
        )
        .await
        {
            tracing::debug!(job_id, %err, "main-domain sitemap source failed, continuing without it");
        }

        collector.drain().into_iter().map(|u| MapEntry::bare(u.to_string())).collect()
    }

    async fn cached_search(&self, site_query: &str, limit: usize) -> Result<Vec<MapEntry>> {
        let key = format!("fireEngineMap:{site_query}");
        if let Some(cached) = self.store.get(&key).await? {
            if let Ok(entries) = serde_json::from_str::<Vec<MapEntry>>(&cached) {
                return Ok(entries);
            }
        }

        let results = self.search.search(site_query, limit).await?;
        let serialized = serde_json::to_string(&results)?;
        self.store.set(&key, &serialized, Some(CACHE_TTL)).await?;
        Ok(results)
    }

    fn passes_domain_filters(&self, options: &MapOptions, origin: &Url, entry: &MapEntry) -> bool {
        let Ok(candidate) = Url::parse(&entry.url) else { return false };

        if !fleetcrawl_urls::same_domain(origin, &candidate) {
            return false;
        }
        if !options.include_subdomains && !fleetcrawl_urls::same_subdomain(origin, &candidate) {
            return false;
        }
        if options.filter_by_path && !options.allow_external_links {
            let origin_path = origin.path().trim_end_matches('/');
            if !origin_path.is_empty() && !candidate.path().starts_with(origin_path) {
                return false;
            }
        }
        true
    }
}

fn canonical_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    let bare_host = host.strip_prefix("www.").unwrap_or(host);
    let path = url.path().trim_end_matches('/');
    format!("{bare_host}{path}")
}

fn dedupe_by_canonical_form(entries: Vec<MapEntry>) -> Vec<MapEntry> {
    let mut seen = HashSet::new();
    let mut out = vec![];
    for entry in entries {
        let key = Url::parse(&entry.url).map(|u| canonical_key(&u)).unwrap_or_else(|_| entry.url.clone());
        if seen.insert(key) {
            out.push(entry);
        }
    }
    out
}

#[derive(Default)]
struct CollectingUrlHandler {
    seen: Mutex<Vec<Url>>,
    count: AtomicUsize,
}

impl CollectingUrlHandler {
    fn drain(&self) -> Vec<Url> {
        std::mem::take(&mut self.seen.lock().unwrap())
    }
}

#[async_trait]
impl SitemapUrlHandler for CollectingUrlHandler {
    async fn handle(&self, _crawl_id: &str, urls: Vec<Url>) -> fleetcrawl_sitemap::Result<usize> {
        let n = urls.len();
        self.seen.lock().unwrap().extend(urls);
        self.count.fetch_add(n, Ordering::Relaxed);
        Ok(n)
    }
}
