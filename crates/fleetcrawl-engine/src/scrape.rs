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

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::Result;

/// A scraped document, opaque to everything except the engine that
/// produced it and whatever renders it to the client: the payload is
/// treated as an opaque value keyed by job id.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ScrapeDocument {
    pub job_id: String,
    pub payload: serde_json::Value,
}

/// The one capability the job lifecycle coordinator needs from the actual
/// scraping stack (headless browser, TLS client, fetch); everything else
/// about how that happens lives behind this trait.
#[async_trait]
pub trait ScrapeEngine: Send + Sync {
    async fn scrape(&self, job_id: &str, url: &Url, options: &serde_json::Value, timeout: Duration) -> Result<ScrapeDocument>;
}
