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

//! Job lifecycle coordinator: wires the coordination store,
//! semaphore, waiting queue, crawl tracker, robots policy, sitemap
//! traverser and map pipeline together behind the three inbound routes.

mod crawl;
mod error;
mod http;
mod map;
mod model;
mod scrape;
mod tenant;

pub use crate::crawl::{CrawlCoordinator, CrawlCoordinatorConfig, CrawlStatusError};
pub use crate::error::JobError;
pub use crate::http::{router, AppState};
pub use crate::map::MapCoordinator;
pub use crate::model::*;
pub use crate::scrape::{ScrapeCoordinator, ScrapeOutcome};
pub use crate::tenant::{TenantFlags, TenantLookup, TenantView};
