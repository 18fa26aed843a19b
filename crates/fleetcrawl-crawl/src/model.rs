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

use serde::{Deserialize, Serialize};

/// Crawl-scoped knobs that bound traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerOptions {
    /// Upper bound on `visited_unique`; `lockURL` rejects once reached.
    pub limit: usize,
    /// When set and positive, forces effective per-crawl concurrency to 1
    /// and the queue inserts this many seconds of delay after dispatch.
    pub delay_secs: Option<u64>,
    pub deduplicate_similar_urls: bool,
    pub ignore_robots_txt: bool,
}

impl Default for CrawlerOptions {
    fn default() -> Self {
        Self { limit: 10_000, delay_secs: None, deduplicate_similar_urls: false, ignore_robots_txt: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crawl {
    pub crawl_id: String,
    pub tenant_id: String,
    pub origin_url: String,
    pub crawler_options: CrawlerOptions,
    pub scrape_options: serde_json::Value,
    pub created_at_epoch_ms: i64,
    pub cancelled: bool,
    pub robots_txt: Option<String>,
    pub max_concurrency: Option<u64>,
    pub zero_data_retention: bool,
}

/// Terminal/non-terminal state of a crawl's lifecycle.
/// `Completed` dominates once reached; `Cancelled` is set externally and is
/// otherwise terminal too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlState {
    Scraping,
    Cancelled,
    Completed,
}

/// Rollup owned by the crawl tracker: only what `crawl:{id}:jobs` and
/// `:jobs_done` can answer. Active-lease / queue-backlog counts come from
/// the semaphore and queue crates and are composed on top by the
/// coordinator, since D has no visibility into B/C's own keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlRollup {
    pub completed: u64,
    /// Jobs that finished successfully — the length of `jobs_done_ordered`,
    /// which `mark_done` only ever appends to on success (and evicts from on
    /// failure), unlike `jobs_done` which counts both outcomes.
    pub succeeded: u64,
    pub total: u64,
    pub cancelled: bool,
    pub state: CrawlState,
}
