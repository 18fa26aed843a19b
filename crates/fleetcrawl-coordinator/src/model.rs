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

//! Wire DTOs for the three inbound routes. Request-shape
//! validation beyond these narrow shapes happens upstream of this
//! crate; these structs only describe the shape, not a
//! validation policy.

use fleetcrawl_crawl::CrawlerOptions;
use fleetcrawl_map::{MapOptions, SitemapMode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeRequestBody {
    pub url: String,
    #[serde(default)]
    pub options: serde_json::Value,
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeResponseBody {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Only set for the well-formed-but-unfetchable case: `200
    /// {success:false, code:"SCRAPE_DNS_RESOLUTION_ERROR"}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlRequestBody {
    pub url: String,
    #[serde(default)]
    pub crawler_options: CrawlerOptions,
    #[serde(default)]
    pub scrape_options: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlKickoffResponseBody {
    pub job_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlStatusQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_status_limit")]
    pub limit: i64,
}

fn default_status_limit() -> i64 {
    -1
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlStatusResponseBody {
    pub status: &'static str,
    pub completed: u64,
    pub total: u64,
    pub credits_used: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    pub data: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapRequestBody {
    pub url: String,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "default_map_limit")]
    pub limit: usize,
    #[serde(default)]
    pub sitemap: Option<SitemapModeWire>,
    #[serde(default)]
    pub include_subdomains: bool,
    #[serde(default)]
    pub allow_external_links: bool,
    #[serde(default = "default_true")]
    pub filter_by_path: bool,
}

fn default_map_limit() -> usize {
    100
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SitemapModeWire {
    Only,
    Include,
    Skip,
}

impl From<SitemapModeWire> for SitemapMode {
    fn from(value: SitemapModeWire) -> Self {
        match value {
            SitemapModeWire::Only => SitemapMode::Only,
            SitemapModeWire::Include => SitemapMode::Include,
            SitemapModeWire::Skip => SitemapMode::Skip,
        }
    }
}

impl MapRequestBody {
    pub fn into_options(self, max_map_limit: usize) -> MapOptions {
        MapOptions {
            url: self.url,
            search: self.search,
            limit: self.limit,
            sitemap: self.sitemap.map(Into::into).unwrap_or(SitemapMode::Skip),
            include_subdomains: self.include_subdomains,
            allow_external_links: self.allow_external_links,
            filter_by_path: self.filter_by_path,
            max_map_limit,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MapResponseBody {
    pub links: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}
