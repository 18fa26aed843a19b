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

use std::sync::Arc;
use std::time::Duration;

use fleetcrawl_common::{Clock, SystemClock};
use fleetcrawl_config::Config;
use fleetcrawl_coordination::redis_store::RedisStore;
use fleetcrawl_coordination::CoordinationStore;
use fleetcrawl_coordinator::{AppState, CrawlCoordinator, CrawlCoordinatorConfig, MapCoordinator, ScrapeCoordinator};
use fleetcrawl_crawl::CrawlTrackerConfig;
use fleetcrawl_engine::{HttpClient, NullBilling, NullDomainIndex, NullSearchProvider, NullTelemetry, ScrapeEngine};
use fleetcrawl_map::MapPipeline;
use fleetcrawl_queue::QueueConfig;
use fleetcrawl_robots::{RobotsPolicy, RobotsPolicyConfig};
use fleetcrawl_semaphore::SemaphoreConfig;
use fleetcrawl_sitemap::SitemapOptions;

use crate::engine::HttpScrapeEngine;
use crate::tenant::StaticTenantLookup;

/// Everything the `serve` and `worker` entrypoints share: the three
/// per-endpoint coordinators, built once from config and wired to the
/// same coordination store and robots/sitemap fetcher.
pub struct Services {
    pub scrape: Arc<ScrapeCoordinator>,
    pub crawl: Arc<CrawlCoordinator>,
    pub map: Arc<MapCoordinator>,
}

pub async fn build(config: &Config) -> anyhow::Result<Services> {
    let store: Arc<dyn CoordinationStore> = Arc::new(RedisStore::connect(&config.redis.url).await?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let tenants = Arc::new(StaticTenantLookup::new(config.server.default_concurrency_limit));

    let semaphore_config = SemaphoreConfig {
        ttl: Duration::from_millis(config.semaphore.ttl_ms),
        backoff_base: Duration::from_millis(config.semaphore.backoff_base_ms),
        backoff_max: Duration::from_millis(config.semaphore.backoff_max_ms),
        backoff_jitter_frac: config.semaphore.backoff_jitter_frac,
        self_hosted: config.semaphore.self_hosted,
    };
    let semaphore = Arc::new(fleetcrawl_semaphore::Semaphore::new(store.clone(), clock.clone(), semaphore_config));

    let engine: Arc<dyn ScrapeEngine> = Arc::new(HttpScrapeEngine::new()?);

    let scrape = Arc::new(ScrapeCoordinator::new(
        semaphore,
        engine.clone(),
        tenants.clone(),
        Arc::new(NullBilling),
        Arc::new(NullTelemetry),
        config.server.scrape_budget_fraction,
        Duration::from_millis(config.queue.default_job_timeout_ms),
    ));

    let http = Arc::new(HttpClient::new(Duration::from_secs(30))?);
    let robots_config = RobotsPolicyConfig {
        user_agent: config.robots.user_agent.clone(),
        alternate_user_agent: config.robots.alternate_user_agent.clone(),
        ignore_robots_txt_default: config.robots.ignore_robots_txt_default,
        cache_ttl: Duration::from_secs(config.crawl.ttl_secs),
    };
    let robots = Arc::new(RobotsPolicy::new((*http).clone(), robots_config, clock.clone()));

    let crawl_config = CrawlTrackerConfig { ttl: Duration::from_secs(config.crawl.ttl_secs) };
    let queue_config = QueueConfig {
        default_job_timeout: Duration::from_millis(config.queue.default_job_timeout_ms),
        promote_scan_count: config.queue.promote_scan_count as u64,
        max_promote_scan_iters: config.queue.max_promote_scan_iters,
        warn_promote_scan_iters: config.queue.warn_promote_scan_iters,
        max_on_job_done_promotions: config.queue.max_on_job_done_promotions,
        promote_backoff_min: Duration::from_millis(config.queue.promote_backoff_min_ms),
        promote_backoff_max: Duration::from_millis(config.queue.promote_backoff_max_ms),
    };
    let crawl_coordinator_config = CrawlCoordinatorConfig {
        default_job_timeout: Duration::from_millis(config.queue.default_job_timeout_ms),
        default_scrape_timeout: Duration::from_millis(config.queue.default_job_timeout_ms).mul_f64(config.server.scrape_budget_fraction),
        sitemap: SitemapOptions {
            hit_cap: config.crawl.sitemap_hit_cap,
            timeout: Duration::from_secs(config.crawl.sitemap_timeout_secs),
            max_concurrent_fetches: config.crawl.max_concurrent_sitemap_fetches,
        },
    };
    let crawl = CrawlCoordinator::new(
        store.clone(),
        clock.clone(),
        crawl_config,
        queue_config,
        semaphore_config,
        engine,
        robots.clone(),
        http.clone(),
        tenants.clone(),
        Arc::new(NullBilling),
        Arc::new(NullTelemetry),
        crawl_coordinator_config,
    );

    let map_sitemap_options = SitemapOptions {
        hit_cap: config.map.sitemap_hit_cap,
        timeout: Duration::from_secs(config.map.sitemap_timeout_secs),
        max_concurrent_fetches: config.map.max_concurrent_sitemap_fetches,
    };
    let pipeline = Arc::new(MapPipeline::with_sitemap_options(
        store,
        Arc::new(NullSearchProvider),
        Arc::new(NullDomainIndex),
        map_sitemap_options,
    ));
    let map = Arc::new(MapCoordinator::new(pipeline, http, robots, config.map.max_map_limit, Duration::from_millis(config.queue.default_job_timeout_ms)));

    Ok(Services { scrape, crawl, map })
}

impl Services {
    pub fn into_app_state(self) -> Arc<AppState> {
        Arc::new(AppState { scrape: self.scrape, crawl: self.crawl, map: self.map })
    }
}
