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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitemapMode {
    Only,
    Include,
    Skip,
}

#[derive(Debug, Clone)]
pub struct MapOptions {
    pub url: String,
    pub search: Option<String>,
    pub limit: usize,
    pub sitemap: SitemapMode,
    pub include_subdomains: bool,
    pub allow_external_links: bool,
    pub filter_by_path: bool,
    pub max_map_limit: usize,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            search: None,
            limit: 100,
            sitemap: SitemapMode::Skip,
            include_subdomains: false,
            allow_external_links: false,
            filter_by_path: true,
            max_map_limit: 30_000,
        }
    }
}

/// One discovered link, possibly carrying title/description metadata from
/// a search-provider or domain-index source; sitemap-sourced entries have
/// neither.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MapEntry {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl MapEntry {
    pub fn bare(url: String) -> Self {
        Self { url, title: None, description: None }
    }

    fn has_title(&self) -> bool {
        self.title.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapResult {
    pub links: Vec<String>,
    pub map_results: Vec<MapEntry>,
    pub job_id: String,
    pub time_taken_ms: u64,
    pub warning: Option<String>,
}

/// Keep the first occurrence of each URL, except that a later entry with
/// a title replaces an earlier untitled duplicate.
pub fn dedupe_preferring_titled(entries: Vec<MapEntry>) -> Vec<MapEntry> {
    let mut order = vec![];
    let mut by_url: std::collections::HashMap<String, MapEntry> = std::collections::HashMap::new();

    for entry in entries {
        match by_url.get(&entry.url) {
            None => {
                order.push(entry.url.clone());
                by_url.insert(entry.url.clone(), entry);
            }
            Some(existing) => {
                if !existing.has_title() && entry.has_title() {
                    by_url.insert(entry.url.clone(), entry);
                }
            }
        }
    }

    order.into_iter().filter_map(|url| by_url.remove(&url)).collect()
}
