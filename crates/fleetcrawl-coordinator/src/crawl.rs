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

//! Crawl kickoff, background draining, and status/cancel: wires the crawl
//! tracker, waiting queue, semaphore, robots policy and sitemap traverser
//! together.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use fleetcrawl_common::Clock;
use fleetcrawl_coordination::CoordinationStore;
use fleetcrawl_crawl::{Crawl, CrawlState, CrawlTracker, CrawlTrackerConfig};
use fleetcrawl_engine::{Billing, HttpClient, ScrapeEngine, Telemetry, TelemetryEvent};
use fleetcrawl_queue::{JobDispatcher, Queue, QueueConfig, QueuedJob};
use fleetcrawl_robots::RobotsPolicy;
use fleetcrawl_semaphore::{Semaphore, SemaphoreConfig};
use fleetcrawl_sitemap::{SitemapOptions, SitemapTraverser, UrlHandler};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use url::Url;
use uuid::Uuid;

use crate::error::JobError;
use crate::model::{CrawlRequestBody, CrawlStatusResponseBody};
use crate::tenant::TenantLookup;

#[derive(Debug, Clone)]
pub struct CrawlCoordinatorConfig {
    pub default_job_timeout: Duration,
    pub default_scrape_timeout: Duration,
    pub sitemap: SitemapOptions,
}

/// Surfaced separately from [`JobError`]: the status/cancel routes return a
/// plain `404` body, not the `{success,code,error}` wire shape the
/// scrape/map routes use. Once a crawl's TTL has elapsed there
/// is no way to tell "never existed" apart from "expired" — both collapse
/// to the same response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlStatusError {
    NotFound,
}

/// Executes one queued child job to completion: admits it through the
/// semaphore, dispatches to the scraping engine, records the outcome, runs
/// the sitemap follow-up for the crawl's origin job, and hands control back
/// to the waiting queue so it can promote the next candidate.
struct CrawlWorker {
    crawl: Arc<CrawlTracker>,
    semaphore: Arc<Semaphore>,
    queue: OnceLock<Arc<Queue>>,
    engine: Arc<dyn ScrapeEngine>,
    robots: Arc<RobotsPolicy<HttpClient>>,
    sitemap_fetcher: Arc<HttpClient>,
    tenants: Arc<dyn TenantLookup>,
    billing: Arc<dyn Billing>,
    telemetry: Arc<dyn Telemetry>,
    config: CrawlCoordinatorConfig,
}

impl CrawlWorker {
    fn queue(&self) -> &Arc<Queue> {
        self.queue.get().expect("queue bound before any job is dispatched")
    }

    async fn run_job(&self, job: QueuedJob) {
        let crawl_id = match job.crawl_id.clone() {
            Some(id) => id,
            None => {
                warn!(job_id = %job.job_id, "crawl worker received a job with no crawl_id, dropping");
                return;
            }
        };

        let Some(tenant) = self.tenants.lookup(&job.tenant_id).await else {
            warn!(crawl_id, job_id = %job.job_id, "tenant vanished before dispatch, dropping job");
            return;
        };
        let url = match job.payload.get("url").and_then(|v| v.as_str()).and_then(|s| Url::parse(s).ok()) {
            Some(url) => url,
            None => {
                warn!(crawl_id, job_id = %job.job_id, "crawl job payload missing a valid url, dropping");
                return;
            }
        };
        let is_origin = job.payload.get("isOrigin").and_then(|v| v.as_bool()).unwrap_or(false);
        let scrape_options = job.payload.get("scrapeOptions").cloned().unwrap_or_else(|| serde_json::json!({}));

        let engine = self.engine.clone();
        let job_id = job.job_id.clone();
        let url_for_engine = url.clone();
        let scrape_timeout = self.config.default_scrape_timeout;
        let cancel = CancellationToken::new();

        let outcome = self
            .semaphore
            .with_semaphore(&job.tenant_id, &job_id, tenant.concurrency_limit, &cancel, scrape_timeout, move |_limited| async move {
                engine.scrape(&job_id, &url_for_engine, &scrape_options, scrape_timeout).await
            })
            .await;

        let success = matches!(outcome, Ok(Ok(_)));
        if success {
            self.billing.record_usage(&job.tenant_id, &job.job_id, 1).await;
        }
        self.telemetry.record(TelemetryEvent::new(if success { "crawl_job_completed" } else { "crawl_job_failed" }, &job.tenant_id, &job.job_id));

        if let Err(err) = self.crawl.mark_done(&crawl_id, &job.job_id, success).await {
            warn!(crawl_id, job_id = %job.job_id, %err, "failed to record crawl job completion");
        }

        if success && is_origin {
            self.run_sitemap_followup(&crawl_id, &job.tenant_id, &url).await;
        }

        if let Err(err) = self.queue().on_job_done(&job.tenant_id, &job.job_id, tenant.concurrency_limit, Some(&crawl_id)).await {
            warn!(crawl_id, job_id = %job.job_id, %err, "on_job_done failed");
        }

        match self.crawl.is_finished(&crawl_id).await {
            Ok(true) => {
                if let Err(err) = self.crawl.seal(&crawl_id).await {
                    warn!(crawl_id, %err, "failed to seal crawl");
                }
            }
            Ok(false) => {}
            Err(err) => warn!(crawl_id, %err, "failed to check crawl completion"),
        }
    }

    /// Once the origin page is scraped, follow any sitemaps robots.txt
    /// advertised (falling back to `/sitemap.xml`) and enqueue whatever new
    /// URLs the traversal discovers.
    async fn run_sitemap_followup(&self, crawl_id: &str, tenant_id: &str, origin: &Url) {
        let discovered = self.robots.sitemaps(origin).await;
        let seeds = if discovered.is_empty() {
            match origin.join("/sitemap.xml") {
                Ok(seed) => vec![seed],
                Err(_) => return,
            }
        } else {
            discovered
        };

        let scrape_options = match self.crawl.get(crawl_id).await {
            Ok(Some(crawl)) => crawl.scrape_options,
            _ => serde_json::json!({}),
        };
        let handler = CrawlSitemapHandler {
            worker: self,
            tenant_id: tenant_id.to_string(),
            scrape_options,
        };

        for seed in seeds {
            if let Err(err) =
                SitemapTraverser::try_get_sitemap(crawl_id, seed, &handler, self.sitemap_fetcher.as_ref(), self.config.sitemap.clone()).await
            {
                warn!(crawl_id, %err, "sitemap follow-up traversal failed");
            }
        }

        if let Err(err) = fleetcrawl_sitemap::try_get_maindomain_sitemap_for_subdomain(
            crawl_id,
            origin,
            &handler,
            self.sitemap_fetcher.as_ref(),
            self.config.sitemap.clone(),
        )
        .await
        {
            warn!(crawl_id, %err, "main-domain sitemap follow-up failed");
        }
    }
}

/// Delegate handed to [`SitemapTraverser`]: applies crawl dedup (D) to each
/// discovered URL and, for every newly-accepted one, registers and enqueues
/// a child job (C) — without the sitemap crate needing to know crawls exist.
struct CrawlSitemapHandler<'a> {
    worker: &'a CrawlWorker,
    tenant_id: String,
    scrape_options: serde_json::Value,
}

#[async_trait]
impl<'a> UrlHandler for CrawlSitemapHandler<'a> {
    async fn handle(&self, crawl_id: &str, urls: Vec<Url>) -> fleetcrawl_sitemap::Result<usize> {
        let mut accepted = 0usize;
        for url in urls {
            let locked = match self.worker.crawl.lock_url(crawl_id, &url).await {
                Ok(locked) => locked,
                Err(err) => {
                    warn!(crawl_id, %err, "lock_url failed during sitemap follow-up");
                    continue;
                }
            };
            if !locked {
                continue;
            }

            let job_id = Uuid::now_v7().to_string();
            if let Err(err) = self.worker.crawl.add_job(crawl_id, &job_id).await {
                warn!(crawl_id, %err, "failed to register sitemap-discovered job");
                continue;
            }

            let payload = serde_json::json!({
                "url": url.to_string(),
                "scrapeOptions": self.scrape_options,
                "isOrigin": false,
            });
            let job = QueuedJob {
                job_id,
                tenant_id: self.tenant_id.clone(),
                priority: 0,
                payload,
                deadline_epoch_ms: 0,
                listenable: false,
                crawl_id: Some(crawl_id.to_string()),
            };
            if let Err(err) = self.worker.queue().enqueue(&self.tenant_id, job, self.worker.config.default_job_timeout).await {
                warn!(crawl_id, %err, "failed to enqueue sitemap-discovered job");
                continue;
            }
            accepted += 1;
        }
        Ok(accepted)
    }
}

/// Bridges the queue's synchronous dispatch call to a detached task so a
/// long-running scrape never blocks the promotion loop that invoked it.
struct DispatchHandle(Arc<CrawlWorker>);

#[async_trait]
impl JobDispatcher for DispatchHandle {
    async fn dispatch(&self, job: QueuedJob) -> fleetcrawl_queue::Result<()> {
        let worker = self.0.clone();
        tokio::spawn(async move { worker.run_job(job).await });
        Ok(())
    }
}

pub struct CrawlCoordinator {
    crawl: Arc<CrawlTracker>,
    queue: Arc<Queue>,
    clock: Arc<dyn Clock>,
    tenants: Arc<dyn TenantLookup>,
    config: CrawlCoordinatorConfig,
}

impl CrawlCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        clock: Arc<dyn Clock>,
        crawl_config: CrawlTrackerConfig,
        queue_config: QueueConfig,
        semaphore_config: SemaphoreConfig,
        engine: Arc<dyn ScrapeEngine>,
        robots: Arc<RobotsPolicy<HttpClient>>,
        sitemap_fetcher: Arc<HttpClient>,
        tenants: Arc<dyn TenantLookup>,
        billing: Arc<dyn Billing>,
        telemetry: Arc<dyn Telemetry>,
        config: CrawlCoordinatorConfig,
    ) -> Arc<Self> {
        let crawl = Arc::new(CrawlTracker::new(store.clone(), clock.clone(), crawl_config));
        let semaphore = Arc::new(Semaphore::new(store.clone(), clock.clone(), semaphore_config));

        let worker = Arc::new(CrawlWorker {
            crawl: crawl.clone(),
            semaphore,
            queue: OnceLock::new(),
            engine,
            robots,
            sitemap_fetcher,
            tenants: tenants.clone(),
            billing,
            telemetry,
            config: config.clone(),
        });
        let dispatcher: Arc<dyn JobDispatcher> = Arc::new(DispatchHandle(worker.clone()));
        let queue = Arc::new(Queue::new(store, clock.clone(), queue_config, semaphore_config, crawl.clone(), dispatcher));
        worker.queue.set(queue.clone()).unwrap_or_else(|_| unreachable!("queue bound exactly once"));

        Arc::new(Self { crawl, queue, clock, tenants, config })
    }

    pub async fn kickoff(&self, tenant_id: &str, request: CrawlRequestBody) -> std::result::Result<String, JobError> {
        let origin = Url::parse(&request.url).map_err(|_| JobError::BadRequest)?;
        let tenant = self.tenants.lookup(tenant_id).await.ok_or(JobError::BadRequest)?;
        if tenant.concurrency_limit == 0 {
            return Err(JobError::CrawlDenial);
        }

        let crawl_id = Uuid::now_v7().to_string();
        let crawl = Crawl {
            crawl_id: crawl_id.clone(),
            tenant_id: tenant_id.to_string(),
            origin_url: origin.to_string(),
            crawler_options: request.crawler_options.clone(),
            scrape_options: request.scrape_options.clone(),
            created_at_epoch_ms: self.clock.now_ms(),
            cancelled: false,
            robots_txt: None,
            max_concurrency: None,
            zero_data_retention: tenant.flags.zero_data_retention,
        };
        self.crawl.create(&crawl).await?;
        self.crawl.lock_url(&crawl_id, &origin).await?;

        let job_id = Uuid::now_v7().to_string();
        self.crawl.add_job(&crawl_id, &job_id).await?;

        let payload = serde_json::json!({
            "url": origin.to_string(),
            "scrapeOptions": request.scrape_options,
            "isOrigin": true,
        });
        let job = QueuedJob {
            job_id,
            tenant_id: tenant_id.to_string(),
            priority: 0,
            payload,
            deadline_epoch_ms: 0,
            listenable: false,
            crawl_id: Some(crawl_id.clone()),
        };
        self.queue.enqueue(tenant_id, job, self.config.default_job_timeout).await?;
        self.crawl.mark_kickoff_finished(&crawl_id).await?;

        // Seeds the same backfill pump `on_job_done` uses, since kickoff has
        // no prior lease to release: a synthetic holder id that was never
        // acquired is a harmless no-op release.
        let seed_holder = Uuid::now_v7().to_string();
        if let Err(err) = self.queue.on_job_done(tenant_id, &seed_holder, tenant.concurrency_limit, None).await {
            warn!(crawl_id, %err, "failed to seed initial promotion after kickoff");
        }

        Ok(crawl_id)
    }

    pub async fn status(&self, crawl_id: &str, skip: i64, limit: i64) -> std::result::Result<CrawlStatusResponseBody, CrawlStatusError> {
        let rollup = match self.crawl.rollup(crawl_id).await {
            Ok(rollup) => rollup,
            Err(fleetcrawl_crawl::Error::NotFound(_)) => return Err(CrawlStatusError::NotFound),
            Err(err) => {
                warn!(crawl_id, %err, "status rollup failed");
                return Err(CrawlStatusError::NotFound);
            }
        };

        let data = self.crawl.ordered_done_range(crawl_id, skip, limit).await.unwrap_or_default();
        let warning = match self.crawl.robots_blocked(crawl_id).await {
            Ok(blocked) if !blocked.is_empty() => Some(format!("{} url(s) blocked by robots.txt", blocked.len())),
            _ => None,
        };
        let status = match rollup.state {
            CrawlState::Scraping => "scraping",
            CrawlState::Cancelled => "cancelled",
            CrawlState::Completed => "completed",
        };
        let next = if limit > 0 && (skip + limit) < rollup.total as i64 {
            Some(format!("/crawl/{crawl_id}?skip={}&limit={limit}", skip + limit))
        } else {
            None
        };

        Ok(CrawlStatusResponseBody {
            status,
            completed: rollup.completed,
            total: rollup.total,
            credits_used: rollup.succeeded,
            next,
            data,
            warning,
        })
    }

    /// Sweeps every tenant with jobs waiting in the queue and retries the
    /// promote-and-dispatch loop for each, the same way [`Self::kickoff`]
    /// seeds it after enqueueing: a synthetic holder id that was never
    /// acquired is a harmless no-op release. A standalone worker process
    /// with no HTTP surface calls this periodically so jobs that missed a
    /// backfill (e.g. after a crash) still get promoted.
    pub async fn drain_pending(&self) -> usize {
        let tenant_ids = match self.queue.tenants_with_pending().await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(%err, "failed to list tenants with pending queues");
                return 0;
            }
        };

        let mut swept = 0;
        for tenant_id in tenant_ids {
            let Some(tenant) = self.tenants.lookup(&tenant_id).await else { continue };
            let seed_holder = Uuid::now_v7().to_string();
            if let Err(err) = self.queue.on_job_done(&tenant_id, &seed_holder, tenant.concurrency_limit, None).await {
                warn!(tenant_id, %err, "drain sweep failed to promote");
                continue;
            }
            swept += 1;
        }
        swept
    }

    pub async fn cancel(&self, crawl_id: &str) -> std::result::Result<(), CrawlStatusError> {
        match self.crawl.cancel(crawl_id).await {
            Ok(()) => Ok(()),
            Err(fleetcrawl_crawl::Error::NotFound(_)) => Err(CrawlStatusError::NotFound),
            Err(err) => {
                warn!(crawl_id, %err, "cancel failed");
                Err(CrawlStatusError::NotFound)
            }
        }
    }
}
