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

//! The tenant waiting queue: a per-tenant `queue:{tenantId}` sorted set of
//! jobs that lost a semaphore admission race, with scan-and-promote that
//! respects an optional per-crawl sub-concurrency cap.

pub mod error;
pub mod job;

pub use error::{Error, Result};
pub use job::QueuedJob;

use async_trait::async_trait;
use fleetcrawl_common::{Clock, RandomBackoff};
use fleetcrawl_coordination::CoordinationStore;
use fleetcrawl_semaphore::{Semaphore, SemaphoreConfig};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const TENANTS_WITH_QUEUES_KEY: &str = "tenants_with_queues";

#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    pub default_job_timeout: Duration,
    pub promote_scan_count: u64,
    pub max_promote_scan_iters: u32,
    pub warn_promote_scan_iters: u32,
    pub max_on_job_done_promotions: u32,
    pub promote_backoff_min: Duration,
    pub promote_backoff_max: Duration,
}

/// Read-only view onto a crawl's concurrency policy, so the queue can
/// apply the sub-concurrency rule without depending on the crawl tracker
/// crate directly.
#[async_trait]
pub trait CrawlPolicyLookup: Send + Sync {
    /// `Some(seconds)` if the crawl's `crawlerOptions.delay` is set and
    /// positive — forces effective concurrency to 1.
    async fn crawl_delay_seconds(&self, crawl_id: &str) -> Result<Option<u64>>;
    /// The crawl's configured `maxConcurrency`, or `None` for unbounded.
    async fn max_concurrency(&self, crawl_id: &str) -> Result<Option<u64>>;
}

/// Where a promoted job is handed off once it's ready to run. Kept
/// in-process (the coordination-store schema has no "ready" key): workers
/// subscribe to whatever backs this trait, typically an in-memory channel.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, job: QueuedJob) -> Result<()>;
}

pub struct Queue {
    store: Arc<dyn CoordinationStore>,
    clock: Arc<dyn Clock>,
    config: QueueConfig,
    tenant_semaphore: Arc<Semaphore>,
    crawl_semaphore: Arc<Semaphore>,
    policy: Arc<dyn CrawlPolicyLookup>,
    dispatcher: Arc<dyn JobDispatcher>,
    in_flight: Mutex<HashSet<String>>,
}

impl Queue {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        clock: Arc<dyn Clock>,
        config: QueueConfig,
        semaphore_config: SemaphoreConfig,
        policy: Arc<dyn CrawlPolicyLookup>,
        dispatcher: Arc<dyn JobDispatcher>,
    ) -> Self {
        let tenant_semaphore = Arc::new(Semaphore::new(store.clone(), clock.clone(), semaphore_config));
        let crawl_semaphore = Arc::new(Semaphore::new(store.clone(), clock.clone(), semaphore_config));
        Self {
            store,
            clock,
            config,
            tenant_semaphore,
            crawl_semaphore,
            policy,
            dispatcher,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn queue_key(tenant_id: &str) -> String {
        format!("queue:{tenant_id}")
    }

    /// Distinct namespace from a tenant's own `sem:{tenantId}` key so the
    /// per-crawl sub-concurrency cap doesn't collide with tenant leases.
    fn crawl_lease_id(crawl_id: &str) -> String {
        format!("crawl-lease:{crawl_id}")
    }

    pub async fn enqueue(&self, tenant_id: &str, mut job: QueuedJob, timeout: Duration) -> Result<()> {
        let now = self.clock.now_ms();
        job.deadline_epoch_ms = now + timeout.as_millis() as i64;
        let serialized = serde_json::to_string(&job)?;
        self.store.z_add(&Self::queue_key(tenant_id), job.deadline_epoch_ms as f64, &serialized).await?;
        self.store.set_add(TENANTS_WITH_QUEUES_KEY, std::slice::from_ref(&tenant_id.to_string())).await?;
        Ok(())
    }

    /// Every tenant that has ever had a job waiting in the queue. A
    /// standalone worker process uses this to sweep for promotions after a
    /// restart, when there's no in-process `on_job_done` call to trigger
    /// the backfill loop.
    pub async fn tenants_with_pending(&self) -> Result<Vec<String>> {
        Ok(self.store.set_members(TENANTS_WITH_QUEUES_KEY).await?)
    }

    async fn crawl_sub_concurrency_cap(&self, crawl_id: &str) -> Result<u64> {
        match self.policy.crawl_delay_seconds(crawl_id).await? {
            Some(delay) if delay > 0 => Ok(1),
            _ => Ok(self.policy.max_concurrency(crawl_id).await?.unwrap_or(u64::MAX)),
        }
    }

    /// Scan-and-promote: find the first queued job (in score order) whose
    /// crawl sub-concurrency cap isn't exhausted, and atomically claim it.
    /// Bounded retry with randomized backoff; bails with a log rather than
    /// spinning forever under heavy contention.
    pub async fn promote_next(&self, tenant_id: &str) -> Result<Option<QueuedJob>> {
        let backoff = RandomBackoff::new(self.config.promote_backoff_min, self.config.promote_backoff_max);
        let key = Self::queue_key(tenant_id);
        let now = self.clock.now_ms();

        for iteration in 1..=self.config.max_promote_scan_iters {
            let scan = self.store.z_scan(&key, 0, self.config.promote_scan_count).await?;

            for entry in &scan.members {
                if (entry.score as i64) < now {
                    let _ = self.store.z_rem(&key, &entry.member).await?;
                    continue;
                }
                let job: QueuedJob = match serde_json::from_str(&entry.member) {
                    Ok(job) => job,
                    Err(err) => {
                        warn!(tenant_id, %err, "dropping unparseable queue entry");
                        let _ = self.store.z_rem(&key, &entry.member).await?;
                        continue;
                    }
                };
                let crawl_delay = if let Some(crawl_id) = &job.crawl_id {
                    let cap = self.crawl_sub_concurrency_cap(crawl_id).await?;
                    let lease = self.crawl_semaphore.acquire(&Self::crawl_lease_id(crawl_id), &job.job_id, cap).await?;
                    if !lease.granted {
                        continue; // crawl sub-concurrency cap exhausted; try the next candidate
                    }
                    self.policy.crawl_delay_seconds(crawl_id).await?.filter(|d| *d > 0)
                } else {
                    None
                };

                let removed = self.store.run_script("queue_try_remove", &[key.clone()], &[entry.member.clone()]).await?;
                if removed.first().map(|s| s == "1").unwrap_or(false) {
                    if let Some(delay) = crawl_delay {
                        tokio::time::sleep(Duration::from_secs(delay)).await;
                    }
                    return Ok(Some(job));
                }
                // another worker won the race for this candidate; release any
                // crawl lease we just took and keep scanning
                if let Some(crawl_id) = &job.crawl_id {
                    self.crawl_semaphore.release(&Self::crawl_lease_id(crawl_id), &job.job_id).await;
                }
            }

            if iteration == self.config.warn_promote_scan_iters {
                warn!(tenant_id, iteration, "promote_next scan retrying well past the usual count");
            }
            if iteration >= self.config.max_promote_scan_iters {
                warn!(tenant_id, iteration, "promote_next bailing after exhausting scan retries");
                return Ok(None);
            }
            tokio::time::sleep(backoff.sample()).await;
        }
        Ok(None)
    }

    /// Hook run after a job finishes: releases its lease(s), then tries to
    /// backfill the freed capacity from the waiting queue.
    pub async fn on_job_done(&self, tenant_id: &str, holder_id: &str, tenant_limit: u64, crawl_id: Option<&str>) -> Result<()> {
        self.tenant_semaphore.release(tenant_id, holder_id).await;
        if let Some(crawl_id) = crawl_id {
            self.crawl_semaphore.release(&Self::crawl_lease_id(crawl_id), holder_id).await;
        }

        for _ in 0..self.config.max_on_job_done_promotions {
            let active = self.tenant_semaphore.active_count(tenant_id).await?;
            if active >= tenant_limit {
                break;
            }
            let Some(job) = self.promote_next(tenant_id).await? else { break };

            let already_dispatched = {
                let mut in_flight = self.in_flight.lock().unwrap();
                !in_flight.insert(job.job_id.clone())
            };
            if already_dispatched {
                warn!(tenant_id, job_id = %job.job_id, "promoted job already in flight, skipping");
                continue;
            }
            self.dispatcher.dispatch(job).await?;
        }
        Ok(())
    }

    /// Called once a dispatched job truly completes, so a later promotion
    /// of the same job id isn't mistaken for a duplicate.
    pub fn forget_in_flight(&self, job_id: &str) {
        self.in_flight.lock().unwrap().remove(job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetcrawl_common::clock::FakeClock;
    use fleetcrawl_coordination::fake::FakeStore;
    use tokio::sync::Mutex as AsyncMutex;

    struct NoCrawlPolicy;

    #[async_trait]
    impl CrawlPolicyLookup for NoCrawlPolicy {
        async fn crawl_delay_seconds(&self, _crawl_id: &str) -> Result<Option<u64>> {
            Ok(None)
        }
        async fn max_concurrency(&self, _crawl_id: &str) -> Result<Option<u64>> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct RecordingDispatcher {
        jobs: AsyncMutex<Vec<QueuedJob>>,
    }

    #[async_trait]
    impl JobDispatcher for RecordingDispatcher {
        async fn dispatch(&self, job: QueuedJob) -> Result<()> {
            self.jobs.lock().await.push(job);
            Ok(())
        }
    }

    fn job(id: &str, tenant: &str) -> QueuedJob {
        QueuedJob {
            job_id: id.to_string(),
            tenant_id: tenant.to_string(),
            priority: 0,
            payload: serde_json::json!({}),
            deadline_epoch_ms: 0,
            listenable: false,
            crawl_id: None,
        }
    }

    fn queue() -> (Queue, Arc<FakeClock>, Arc<RecordingDispatcher>) {
        let clock = Arc::new(FakeClock::new(0));
        let store = Arc::new(FakeStore::new(clock.clone()));
        let config = QueueConfig {
            default_job_timeout: Duration::from_secs(60),
            promote_scan_count: 20,
            max_promote_scan_iters: 5,
            warn_promote_scan_iters: 3,
            max_on_job_done_promotions: 10,
            promote_backoff_min: Duration::from_millis(0),
            promote_backoff_max: Duration::from_millis(1),
        };
        let sem_config = SemaphoreConfig {
            ttl: Duration::from_secs(30),
            backoff_base: Duration::from_millis(1),
            backoff_max: Duration::from_millis(5),
            backoff_jitter_frac: 0.1,
            self_hosted: false,
        };
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let q = Queue::new(store, clock.clone(), config, sem_config, Arc::new(NoCrawlPolicy), dispatcher.clone());
        (q, clock, dispatcher)
    }

    #[tokio::test]
    async fn enqueue_then_promote_returns_the_exact_payload() {
        let (q, _clock, _d) = queue();
        let j = job("j1", "t1");
        q.enqueue("t1", j.clone(), Duration::from_secs(60)).await.unwrap();
        let promoted = q.promote_next("t1").await.unwrap().unwrap();
        assert_eq!(promoted.job_id, j.job_id);
        assert_eq!(promoted.tenant_id, j.tenant_id);
    }

    #[tokio::test]
    async fn promote_next_on_empty_queue_returns_none_without_hanging() {
        let (q, _clock, _d) = queue();
        assert!(q.promote_next("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_skipped_and_reclaimed() {
        let (q, clock, _d) = queue();
        q.enqueue("t1", job("stale", "t1"), Duration::from_millis(10)).await.unwrap();
        clock.advance(1000);
        assert!(q.promote_next("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn on_job_done_promotes_from_the_queue() {
        let (q, _clock, dispatcher) = queue();
        q.enqueue("t1", job("j1", "t1"), Duration::from_secs(60)).await.unwrap();
        q.on_job_done("t1", "holder-0", 1, None).await.unwrap();
        let dispatched = dispatcher.jobs.lock().await;
        assert_eq!(dispatched.len(), 1);
        assert_eq!(dispatched[0].job_id, "j1");
    }

    #[tokio::test]
    async fn on_job_done_does_not_promote_when_tenant_already_at_limit() {
        let (q, _clock, dispatcher) = queue();
        q.tenant_semaphore.acquire("t1", "other-holder", 1).await.unwrap();
        q.enqueue("t1", job("j1", "t1"), Duration::from_secs(60)).await.unwrap();
        q.on_job_done("t1", "holder-0", 1, None).await.unwrap();
        assert!(dispatcher.jobs.lock().await.is_empty());
    }
}
