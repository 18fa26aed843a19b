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

//! Map orchestration: redirect resolution and a
//! best-effort robots check happen here, ahead of handing off to
//! [`fleetcrawl_map::MapPipeline`] for fan-out, dedup, rerank and filter.

use std::sync::Arc;
use std::time::Duration;

use fleetcrawl_engine::HttpClient;
use fleetcrawl_map::MapPipeline;
use fleetcrawl_robots::RobotsPolicy;
use tokio::time::timeout;

use crate::error::JobError;
use crate::model::MapRequestBody;

pub struct MapCoordinator {
    pipeline: Arc<MapPipeline>,
    http: Arc<HttpClient>,
    robots: Arc<RobotsPolicy<HttpClient>>,
    max_map_limit: usize,
    default_timeout: Duration,
}

impl MapCoordinator {
    pub fn new(pipeline: Arc<MapPipeline>, http: Arc<HttpClient>, robots: Arc<RobotsPolicy<HttpClient>>, max_map_limit: usize, default_timeout: Duration) -> Self {
        Self { pipeline, http, robots, max_map_limit, default_timeout }
    }

    pub async fn map(&self, job_id: &str, request: MapRequestBody, ignore_robots_txt: bool) -> Result<fleetcrawl_map::MapResult, JobError> {
        let requested = url::Url::parse(&request.url).map_err(|_| JobError::BadRequest)?;
        let options = request.into_options(self.max_map_limit);

        let origin = self.http.resolve_redirects(&requested).await.unwrap_or(requested);
        let robots_blocked = !self.robots.is_allowed(&origin, ignore_robots_txt).await;

        let include_sitemap = options.sitemap != fleetcrawl_map::SitemapMode::Skip;
        let fetcher: Option<&dyn fleetcrawl_sitemap::SitemapFetcher> = if include_sitemap { Some(self.http.as_ref()) } else { None };

        match timeout(self.default_timeout, self.pipeline.get_map_results(job_id, options, &origin, robots_blocked, fetcher)).await {
            Ok(result) => result.map_err(JobError::from),
            Err(_) => Err(JobError::MapTimeout),
        }
    }
}
