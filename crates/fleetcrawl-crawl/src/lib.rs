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

//! Crawl group tracker: visited-URL dedup, kickoff/completion bookkeeping,
//! and status rollup for one crawl's child jobs.

pub mod error;
pub mod model;

pub use error::{Error, Result};
pub use model::{Crawl, CrawlRollup, CrawlState, CrawlerOptions};

use async_trait::async_trait;
use fleetcrawl_coordination::{CoordinationStore, Pipeline};
use fleetcrawl_urls::NormalizeOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use url::Url;

#[derive(Debug, Clone, Copy)]
pub struct CrawlTrackerConfig {
    pub ttl: Duration,
}

pub struct CrawlTracker {
    store: Arc<dyn CoordinationStore>,
    clock: Arc<dyn fleetcrawl_common::Clock>,
    config: CrawlTrackerConfig,
}

fn crawl_key(id: &str) -> String {
    format!("crawl:{id}")
}
fn jobs_key(id: &str) -> String {
    format!("crawl:{id}:jobs")
}
fn jobs_done_key(id: &str) -> String {
    format!("crawl:{id}:jobs_done")
}
fn jobs_done_ordered_key(id: &str) -> String {
    format!("crawl:{id}:jobs_done_ordered")
}
fn visited_key(id: &str) -> String {
    format!("crawl:{id}:visited")
}
fn visited_unique_key(id: &str) -> String {
    format!("crawl:{id}:visited_unique")
}
fn kickoff_finish_key(id: &str) -> String {
    format!("crawl:{id}:kickoff:finish")
}
fn finish_key(id: &str) -> String {
    format!("crawl:{id}:finish")
}
fn robots_blocked_key(id: &str) -> String {
    format!("crawl:{id}:robots_blocked")
}
fn crawls_by_team_key(tenant_id: &str) -> String {
    format!("crawls_by_team_id:{tenant_id}")
}

impl CrawlTracker {
    pub fn new(store: Arc<dyn CoordinationStore>, clock: Arc<dyn fleetcrawl_common::Clock>, config: CrawlTrackerConfig) -> Self {
        Self { store, clock, config }
    }

    pub async fn create(&self, crawl: &Crawl) -> Result<()> {
        let serialized = serde_json::to_string(crawl)?;
        self.store.set(&crawl_key(&crawl.crawl_id), &serialized, Some(self.config.ttl)).await?;
        self.store.set_add(&crawls_by_team_key(&crawl.tenant_id), std::slice::from_ref(&crawl.crawl_id)).await?;
        self.store.expire(&crawls_by_team_key(&crawl.tenant_id), self.config.ttl).await?;
        Ok(())
    }

    pub async fn get(&self, crawl_id: &str) -> Result<Option<Crawl>> {
        let Some(raw) = self.store.get(&crawl_key(crawl_id)).await? else { return Ok(None) };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn get_or_not_found(&self, crawl_id: &str) -> Result<Crawl> {
        self.get(crawl_id).await?.ok_or_else(|| Error::NotFound(crawl_id.to_string()))
    }

    /// Overwrite the stored record (best-effort read-modify-write; crawl
    /// records are mutated by many workers but field-level races here are
    /// limited to `cancelled` and accepted).
    async fn put(&self, crawl: &Crawl) -> Result<()> {
        let serialized = serde_json::to_string(crawl)?;
        self.store.set(&crawl_key(&crawl.crawl_id), &serialized, Some(self.config.ttl)).await?;
        Ok(())
    }

    pub async fn cancel(&self, crawl_id: &str) -> Result<()> {
        let mut crawl = self.get_or_not_found(crawl_id).await?;
        crawl.cancelled = true;
        self.put(&crawl).await
    }

    pub async fn mark_kickoff_finished(&self, crawl_id: &str) -> Result<()> {
        self.store.set(&kickoff_finish_key(crawl_id), "yes", Some(self.config.ttl)).await?;
        Ok(())
    }

    async fn kickoff_finished(&self, crawl_id: &str) -> Result<bool> {
        Ok(self.store.get(&kickoff_finish_key(crawl_id)).await?.is_some())
    }

    async fn sealed(&self, crawl_id: &str) -> Result<bool> {
        Ok(self.store.get(&finish_key(crawl_id)).await?.is_some())
    }

    /// Normalize `url`, add it (and, if the crawl dedups similar URLs, every
    /// permutation of it) to `visited`, and accept iff every candidate was
    /// new and the crawl's `visited_unique` bound hasn't been reached.
    pub async fn lock_url(&self, crawl_id: &str, url: &Url) -> Result<bool> {
        let crawl = self.get_or_not_found(crawl_id).await?;
        if self.sealed(crawl_id).await? {
            return Ok(false);
        }

        let normalized = fleetcrawl_urls::normalize(url, NormalizeOptions::default());
        let candidates: Vec<String> = if crawl.crawler_options.deduplicate_similar_urls {
            fleetcrawl_urls::permutations(&normalized).iter().map(|u| u.to_string()).collect()
        } else {
            vec![normalized.to_string()]
        };

        let visited = visited_key(crawl_id);
        let mut all_new = true;
        for candidate in &candidates {
            let added = self.store.set_add(&visited, std::slice::from_ref(candidate)).await?;
            if added == 0 {
                all_new = false;
            }
        }
        if !all_new {
            return Ok(false);
        }

        let visited_unique = visited_unique_key(crawl_id);
        let current = self.store.set_card(&visited_unique).await?;
        if current >= crawl.crawler_options.limit as u64 {
            return Ok(false);
        }
        self.store.set_add(&visited_unique, &[normalized.to_string()]).await?;
        Ok(true)
    }

    pub async fn add_job(&self, crawl_id: &str, job_id: &str) -> Result<()> {
        self.store.set_add(&jobs_key(crawl_id), &[job_id.to_string()]).await?;
        Ok(())
    }

    pub async fn add_jobs_batch(&self, crawl_id: &str, job_ids: &[String]) -> Result<()> {
        if job_ids.is_empty() {
            return Ok(());
        }
        self.store.set_add(&jobs_key(crawl_id), job_ids).await?;
        Ok(())
    }

    /// On-job-done bookkeeping: add to `jobs_done`, append to (or evict
    /// from) `jobs_done_ordered`, and refresh every TTL in one batched,
    /// non-atomic round trip — these writes are independent and don't need
    /// the atomicity a script buys.
    /// Ignored once the crawl is sealed: no mutation is permitted after
    /// `:finish` is set.
    pub async fn mark_done(&self, crawl_id: &str, job_id: &str, success: bool) -> Result<()> {
        if self.sealed(crawl_id).await? {
            warn!(crawl_id, job_id, "mark_done called after seal, ignoring");
            return Ok(());
        }

        let mut pipeline = Pipeline::new()
            .set_add(jobs_done_key(crawl_id), job_id)
            .expire(crawl_key(crawl_id), self.config.ttl)
            .expire(jobs_key(crawl_id), self.config.ttl)
            .expire(jobs_done_key(crawl_id), self.config.ttl)
            .expire(jobs_done_ordered_key(crawl_id), self.config.ttl);

        pipeline = if success {
            pipeline.list_push(jobs_done_ordered_key(crawl_id), job_id)
        } else {
            pipeline.list_rem(jobs_done_ordered_key(crawl_id), job_id)
        };

        self.store.pipeline(pipeline.into_ops()).await?;
        Ok(())
    }

    pub async fn is_finished(&self, crawl_id: &str) -> Result<bool> {
        if !self.kickoff_finished(crawl_id).await? {
            return Ok(false);
        }
        let done = self.store.set_card(&jobs_done_key(crawl_id)).await?;
        let total = self.store.set_card(&jobs_key(crawl_id)).await?;
        Ok(done == total)
    }

    /// Irreversible completion: set `:finish`, drop the crawl from its
    /// tenant's active set, and free the visited sets (they're no longer
    /// needed once no more URLs will be locked against this crawl).
    pub async fn seal(&self, crawl_id: &str) -> Result<()> {
        let crawl = self.get_or_not_found(crawl_id).await?;
        self.store.set(&finish_key(crawl_id), "yes", Some(self.config.ttl)).await?;
        self.store.set_rem(&crawls_by_team_key(&crawl.tenant_id), crawl_id).await?;
        self.store.del(&visited_key(crawl_id)).await?;
        self.store.del(&visited_unique_key(crawl_id)).await?;
        Ok(())
    }

    pub async fn mark_robots_blocked(&self, crawl_id: &str, url: &Url) -> Result<()> {
        self.store.set_add(&robots_blocked_key(crawl_id), &[url.to_string()]).await?;
        Ok(())
    }

    pub async fn robots_blocked(&self, crawl_id: &str) -> Result<Vec<String>> {
        Ok(self.store.set_members(&robots_blocked_key(crawl_id)).await?)
    }

    pub async fn ordered_done_range(&self, crawl_id: &str, skip: i64, limit: i64) -> Result<Vec<String>> {
        let stop = if limit < 0 { -1 } else { skip + limit - 1 };
        Ok(self.store.list_range(&jobs_done_ordered_key(crawl_id), skip, stop).await?)
    }

    pub async fn rollup(&self, crawl_id: &str) -> Result<CrawlRollup> {
        let crawl = self.get_or_not_found(crawl_id).await?;
        let completed = self.store.set_card(&jobs_done_key(crawl_id)).await?;
        let succeeded = self.store.list_len(&jobs_done_ordered_key(crawl_id)).await?;
        let total = self.store.set_card(&jobs_key(crawl_id)).await?;
        let sealed = self.sealed(crawl_id).await?;

        let state = if crawl.cancelled {
            CrawlState::Cancelled
        } else if sealed {
            CrawlState::Completed
        } else {
            CrawlState::Scraping
        };

        Ok(CrawlRollup { completed, succeeded, total, cancelled: crawl.cancelled, state })
    }

    pub async fn active_crawls_for_tenant(&self, tenant_id: &str) -> Result<Vec<String>> {
        Ok(self.store.set_members(&crawls_by_team_key(tenant_id)).await?)
    }
}

/// Lets the queue crate ask "what's this crawl's sub-concurrency policy?"
/// without depending on this crate's concrete types.
#[async_trait]
impl fleetcrawl_queue::CrawlPolicyLookup for CrawlTracker {
    async fn crawl_delay_seconds(&self, crawl_id: &str) -> fleetcrawl_queue::Result<Option<u64>> {
        match self.get(crawl_id).await {
            Ok(Some(crawl)) => Ok(crawl.crawler_options.delay_secs.filter(|d| *d > 0)),
            Ok(None) => Ok(None),
            Err(err) => {
                warn!(crawl_id, %err, "failed to look up crawl delay, treating as unset");
                Ok(None)
            }
        }
    }

    async fn max_concurrency(&self, crawl_id: &str) -> fleetcrawl_queue::Result<Option<u64>> {
        match self.get(crawl_id).await {
            Ok(Some(crawl)) => Ok(crawl.max_concurrency),
            Ok(None) => Ok(None),
            Err(err) => {
                warn!(crawl_id, %err, "failed to look up crawl max_concurrency, treating as unbounded");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetcrawl_common::clock::FakeClock;
    use fleetcrawl_coordination::fake::FakeStore;

    fn tracker() -> (CrawlTracker, Arc<FakeClock>) {
        let clock = Arc::new(FakeClock::new(0));
        let store = Arc::new(FakeStore::new(clock.clone()));
        let config = CrawlTrackerConfig { ttl: Duration::from_secs(3600) };
        (CrawlTracker::new(store, clock.clone(), config), clock)
    }

    fn crawl(id: &str, limit: usize, dedup: bool) -> Crawl {
        Crawl {
            crawl_id: id.to_string(),
            tenant_id: "t1".to_string(),
            origin_url: "https://x.com".to_string(),
            crawler_options: CrawlerOptions { limit, deduplicate_similar_urls: dedup, ..Default::default() },
            scrape_options: serde_json::json!({}),
            created_at_epoch_ms: 0,
            cancelled: false,
            robots_txt: None,
            max_concurrency: None,
            zero_data_retention: false,
        }
    }

    #[tokio::test]
    async fn lock_url_rejects_fragment_only_duplicate() {
        let (tracker, _clock) = tracker();
        tracker.create(&crawl("c1", 100, false)).await.unwrap();

        assert!(tracker.lock_url("c1", &Url::parse("https://x.com/a#frag").unwrap()).await.unwrap());
        assert!(!tracker.lock_url("c1", &Url::parse("https://x.com/a").unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn lock_url_with_dedup_similar_rejects_permutation() {
        let (tracker, _clock) = tracker();
        tracker.create(&crawl("c1", 100, true)).await.unwrap();

        assert!(tracker.lock_url("c1", &Url::parse("https://x.com/a").unwrap()).await.unwrap());
        assert!(!tracker.lock_url("c1", &Url::parse("http://www.x.com/a/index.html").unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn lock_url_respects_visited_unique_limit() {
        let (tracker, _clock) = tracker();
        tracker.create(&crawl("c1", 1, false)).await.unwrap();

        assert!(tracker.lock_url("c1", &Url::parse("https://x.com/a").unwrap()).await.unwrap());
        assert!(!tracker.lock_url("c1", &Url::parse("https://x.com/b").unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn jobs_done_is_always_a_subset_of_jobs() {
        let (tracker, _clock) = tracker();
        tracker.create(&crawl("c1", 100, false)).await.unwrap();
        tracker.add_jobs_batch("c1", &["j1".to_string(), "j2".to_string(), "j3".to_string()]).await.unwrap();
        tracker.mark_done("c1", "j1", true).await.unwrap();
        tracker.mark_done("c1", "j2", false).await.unwrap();
        tracker.mark_kickoff_finished("c1").await.unwrap();

        assert!(!tracker.is_finished("c1").await.unwrap());
        let rollup = tracker.rollup("c1").await.unwrap();
        assert_eq!(rollup.completed, 2);
        assert_eq!(rollup.succeeded, 1);
        assert_eq!(rollup.total, 3);
        assert_eq!(rollup.state, CrawlState::Scraping);

        tracker.mark_done("c1", "j3", true).await.unwrap();
        assert!(tracker.is_finished("c1").await.unwrap());
        tracker.seal("c1").await.unwrap();

        let rollup = tracker.rollup("c1").await.unwrap();
        assert_eq!(rollup.state, CrawlState::Completed);
        assert_eq!(rollup.completed, 3);
        assert_eq!(rollup.succeeded, 2);
    }

    #[tokio::test]
    async fn mark_done_then_ordered_done_contains_job_exactly_once_at_tail() {
        let (tracker, _clock) = tracker();
        tracker.create(&crawl("c1", 100, false)).await.unwrap();
        tracker.add_job("c1", "j1").await.unwrap();
        tracker.mark_done("c1", "j1", true).await.unwrap();

        let ordered = tracker.ordered_done_range("c1", 0, -1).await.unwrap();
        assert_eq!(ordered, vec!["j1".to_string()]);
    }

    #[tokio::test]
    async fn mutation_after_seal_is_ignored() {
        let (tracker, _clock) = tracker();
        tracker.create(&crawl("c1", 100, false)).await.unwrap();
        tracker.add_job("c1", "j1").await.unwrap();
        tracker.mark_done("c1", "j1", true).await.unwrap();
        tracker.mark_kickoff_finished("c1").await.unwrap();
        tracker.seal("c1").await.unwrap();

        tracker.mark_done("c1", "j2", true).await.unwrap();
        let rollup = tracker.rollup("c1").await.unwrap();
        assert_eq!(rollup.completed, 1);
    }

    #[tokio::test]
    async fn cancel_is_reflected_in_rollup() {
        let (tracker, _clock) = tracker();
        tracker.create(&crawl("c1", 100, false)).await.unwrap();
        tracker.cancel("c1").await.unwrap();
        let rollup = tracker.rollup("c1").await.unwrap();
        assert_eq!(rollup.state, CrawlState::Cancelled);
        assert!(rollup.cancelled);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// `visited_unique` never exceeds the crawl's
            /// configured `limit`, regardless of how many distinct URLs are
            /// offered to `lock_url`.
            #[test]
            fn visited_unique_never_exceeds_limit(limit in 1usize..20, offered in 1usize..60) {
                let rt = tokio::runtime::Runtime::new().unwrap();
                let card = rt.block_on(async {
                    let (tracker, _clock) = tracker();
                    tracker.create(&crawl("c1", limit, false)).await.unwrap();
                    for i in 0..offered {
                        let url = Url::parse(&format!("https://x.com/page-{i}")).unwrap();
                        let _ = tracker.lock_url("c1", &url).await.unwrap();
                    }
                    tracker.store.set_card(&visited_unique_key("c1")).await.unwrap()
                });
                prop_assert!(card <= limit as u64);
            }
        }
    }
}
