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

//! Default values for optional config fields, referenced from `#[serde(default = "...")]`
//! attributes on the structs in [`crate::model`].

pub struct Semaphore;

impl Semaphore {
    pub fn ttl_ms() -> u64 {
        30_000
    }

    pub fn backoff_base_ms() -> u64 {
        25
    }

    pub fn backoff_max_ms() -> u64 {
        250
    }

    pub fn backoff_jitter_frac() -> f64 {
        0.25
    }

    pub fn self_hosted() -> bool {
        false
    }
}

pub struct Queue;

impl Queue {
    pub fn default_job_timeout_ms() -> u64 {
        60_000
    }

    pub fn promote_scan_count() -> usize {
        20
    }

    pub fn max_promote_scan_iters() -> u32 {
        100
    }

    pub fn warn_promote_scan_iters() -> u32 {
        15
    }

    pub fn max_on_job_done_promotions() -> u32 {
        10
    }

    pub fn promote_backoff_min_ms() -> u64 {
        0
    }

    pub fn promote_backoff_max_ms() -> u64 {
        300
    }
}

pub struct Crawl;

impl Crawl {
    pub fn ttl_secs() -> u64 {
        24 * 60 * 60
    }

    pub fn sitemap_hit_cap() -> usize {
        100
    }

    pub fn sitemap_timeout_secs() -> u64 {
        120
    }

    pub fn max_concurrent_sitemap_fetches() -> usize {
        8
    }
}

pub struct Robots;

impl Robots {
    pub fn ignore_robots_txt_default() -> bool {
        false
    }

    pub fn alternate_user_agent() -> Option<String> {
        None
    }
}

pub struct Map;

impl Map {
    pub fn max_map_limit() -> usize {
        5_000
    }

    pub fn search_cache_ttl_secs() -> u64 {
        48 * 60 * 60
    }

    pub fn index_freshness_days() -> u64 {
        14
    }

    pub fn sitemap_timeout_secs() -> u64 {
        120
    }

    pub fn sitemap_hit_cap() -> usize {
        100
    }

    pub fn max_concurrent_sitemap_fetches() -> usize {
        8
    }
}

pub struct Server;

impl Server {
    pub fn num_worker_tasks() -> usize {
        16
    }

    pub fn scrape_budget_fraction() -> f64 {
        2.0 / 3.0
    }

    pub fn default_concurrency_limit() -> u64 {
        16
    }
}

pub struct Redis;

impl Redis {
    pub fn pool_size() -> usize {
        16
    }
}
