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

//! Narrow trait boundaries for the external collaborators this crate
//! treats as out of scope: the scraping engine itself, billing, and
//! telemetry. Also
//! a plain HTTP-based implementation of the fetch traits `fleetcrawl-robots`
//! and `fleetcrawl-sitemap` depend on, and no-op search/index stand-ins so
//! the workspace is runnable without a real vendor integration.

mod billing;
mod error;
mod http_client;
mod scrape;

pub use billing::{Billing, NullBilling, NullTelemetry, Telemetry, TelemetryEvent};
pub use error::{Error, Result};
pub use http_client::{HttpClient, NullDomainIndex, NullSearchProvider};
pub use scrape::{ScrapeDocument, ScrapeEngine};
