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

use thiserror::Error;

/// Typed failure modes a [`crate::ScrapeEngine`] can report, one per
/// wire-stable error code that originates at the engine
/// boundary rather than in the coordinator itself.
#[derive(Error, Debug)]
pub enum Error {
    #[error("dns resolution failed for host")]
    DnsResolution,

    #[error("all scraping engines failed")]
    AllEnginesFailed,

    #[error("tls/ssl error")]
    Ssl,

    #[error("site returned an unrecoverable error")]
    Site,

    #[error("scrape would violate zero data retention")]
    ZdrViolation,

    #[error("redirect chain raced with a concurrent request")]
    RacedRedirect,

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
