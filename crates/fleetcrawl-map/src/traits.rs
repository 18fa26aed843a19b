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

use async_trait::async_trait;

use crate::model::MapEntry;

/// Narrow view of an external search service, queried in `site:host` form
/// (joined with the caller's query when present). Kept local to this
/// crate so it doesn't depend on `fleetcrawl-engine`.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, site_query: &str, limit: usize) -> crate::Result<Vec<MapEntry>>;
}

/// Narrow view of the domain index, queried at both the per-hostname and
/// per-path-prefix split levels, scoped to a freshness window in days.
#[async_trait]
pub trait DomainIndex: Send + Sync {
    async fn query(&self, host: &str, path_prefix: Option<&str>, freshness_days: u32) -> crate::Result<Vec<MapEntry>>;
}
