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

use crate::defaults;
use std::net::SocketAddr;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub semaphore: SemaphoreConfig,
    pub queue: QueueConfig,
    pub crawl: CrawlConfig,
    pub robots: RobotsConfig,
    pub map: MapConfig,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,

    #[serde(default = "defaults::Server::num_worker_tasks")]
    pub num_worker_tasks: usize,

    #[serde(default = "defaults::Server::scrape_budget_fraction")]
    pub scrape_budget_fraction: f64,

    /// Concurrency budget granted to every tenant when no external tenant
    /// service is wired in /// Self-hosted deployments with a single implicit tenant use this as
    /// their whole rate-limit policy.
    #[serde(default = "defaults::Server::default_concurrency_limit")]
    pub default_concurrency_limit: u64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RedisConfig {
    pub url: String,

    #[serde(default = "defaults::Redis::pool_size")]
    pub pool_size: usize,
}

/// Per-tenant concurrency semaphore tuning.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SemaphoreConfig {
    #[serde(default = "defaults::Semaphore::ttl_ms")]
    pub ttl_ms: u64,

    #[serde(default = "defaults::Semaphore::backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "defaults::Semaphore::backoff_max_ms")]
    pub backoff_max_ms: u64,

    #[serde(default = "defaults::Semaphore::backoff_jitter_frac")]
    pub backoff_jitter_frac: f64,

    /// Self-hosted deployments bypass acquire/heartbeat/release entirely
    ///.
    #[serde(default = "defaults::Semaphore::self_hosted")]
    pub self_hosted: bool,
}

impl Default for SemaphoreConfig {
    fn default() -> Self {
        Self {
            ttl_ms: defaults::Semaphore::ttl_ms(),
            backoff_base_ms: defaults::Semaphore::backoff_base_ms(),
            backoff_max_ms: defaults::Semaphore::backoff_max_ms(),
            backoff_jitter_frac: defaults::Semaphore::backoff_jitter_frac(),
            self_hosted: defaults::Semaphore::self_hosted(),
        }
    }
}

/// Tenant waiting queue tuning.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QueueConfig {
    #[serde(default = "defaults::Queue::default_job_timeout_ms")]
    pub default_job_timeout_ms: u64,

    #[serde(default = "defaults::Queue::promote_scan_count")]
    pub promote_scan_count: usize,

    #[serde(default = "defaults::Queue::max_promote_scan_iters")]
    pub max_promote_scan_iters: u32,

    #[serde(default = "defaults::Queue::warn_promote_scan_iters")]
    pub warn_promote_scan_iters: u32,

    #[serde(default = "defaults::Queue::max_on_job_done_promotions")]
    pub max_on_job_done_promotions: u32,

    #[serde(default = "defaults::Queue::promote_backoff_min_ms")]
    pub promote_backoff_min_ms: u64,

    #[serde(default = "defaults::Queue::promote_backoff_max_ms")]
    pub promote_backoff_max_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            default_job_timeout_ms: defaults::Queue::default_job_timeout_ms(),
            promote_scan_count: defaults::Queue::promote_scan_count(),
            max_promote_scan_iters: defaults::Queue::max_promote_scan_iters(),
            warn_promote_scan_iters: defaults::Queue::warn_promote_scan_iters(),
            max_on_job_done_promotions: defaults::Queue::max_on_job_done_promotions(),
            promote_backoff_min_ms: defaults::Queue::promote_backoff_min_ms(),
            promote_backoff_max_ms: defaults::Queue::promote_backoff_max_ms(),
        }
    }
}

/// Crawl group tracker tuning.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrawlConfig {
    #[serde(default = "defaults::Crawl::ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "defaults::Crawl::sitemap_hit_cap")]
    pub sitemap_hit_cap: usize,

    #[serde(default = "defaults::Crawl::sitemap_timeout_secs")]
    pub sitemap_timeout_secs: u64,

    #[serde(default = "defaults::Crawl::max_concurrent_sitemap_fetches")]
    pub max_concurrent_sitemap_fetches: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            ttl_secs: defaults::Crawl::ttl_secs(),
            sitemap_hit_cap: defaults::Crawl::sitemap_hit_cap(),
            sitemap_timeout_secs: defaults::Crawl::sitemap_timeout_secs(),
            max_concurrent_sitemap_fetches: defaults::Crawl::max_concurrent_sitemap_fetches(),
        }
    }
}

/// Robots policy tuning.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RobotsConfig {
    pub user_agent: String,

    #[serde(default = "defaults::Robots::alternate_user_agent")]
    pub alternate_user_agent: Option<String>,

    #[serde(default = "defaults::Robots::ignore_robots_txt_default")]
    pub ignore_robots_txt_default: bool,
}

/// Map pipeline tuning.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MapConfig {
    #[serde(default = "defaults::Map::max_map_limit")]
    pub max_map_limit: usize,

    #[serde(default = "defaults::Map::search_cache_ttl_secs")]
    pub search_cache_ttl_secs: u64,

    #[serde(default = "defaults::Map::index_freshness_days")]
    pub index_freshness_days: u64,

    #[serde(default = "defaults::Map::sitemap_timeout_secs")]
    pub sitemap_timeout_secs: u64,

    #[serde(default = "defaults::Map::sitemap_hit_cap")]
    pub sitemap_hit_cap: usize,

    #[serde(default = "defaults::Map::max_concurrent_sitemap_fetches")]
    pub max_concurrent_sitemap_fetches: usize,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            max_map_limit: defaults::Map::max_map_limit(),
            search_cache_ttl_secs: defaults::Map::search_cache_ttl_secs(),
            index_freshness_days: defaults::Map::index_freshness_days(),
            sitemap_timeout_secs: defaults::Map::sitemap_timeout_secs(),
            sitemap_hit_cap: defaults::Map::sitemap_hit_cap(),
            max_concurrent_sitemap_fetches: defaults::Map::max_concurrent_sitemap_fetches(),
        }
    }
}
