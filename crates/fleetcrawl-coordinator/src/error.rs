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

//! The wire-stable error taxonomy: every error the HTTP
//! surface can return maps 1:1 to one of these codes and an HTTP status.
//! Internal/unexpected errors are caught here, logged with the job id as
//! a correlation id, and downgraded to `UNKNOWN_ERROR` so nothing about
//! the failure's internals leaks to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobError {
    #[error("SCRAPE_TIMEOUT")]
    ScrapeTimeout,
    #[error("MAP_TIMEOUT")]
    MapTimeout,
    #[error("SCRAPE_DNS_RESOLUTION_ERROR")]
    ScrapeDnsResolutionError,
    #[error("SCRAPE_ALL_ENGINES_FAILED")]
    ScrapeAllEnginesFailed,
    #[error("SCRAPE_SSL_ERROR")]
    ScrapeSslError,
    #[error("SCRAPE_SITE_ERROR")]
    ScrapeSiteError,
    #[error("SCRAPE_ZDR_VIOLATION_ERROR")]
    ScrapeZdrViolationError,
    #[error("SCRAPE_RACED_REDIRECT_ERROR")]
    ScrapeRacedRedirectError,
    #[error("SCRAPE_SITEMAP_ERROR")]
    ScrapeSitemapError,
    #[error("CRAWL_DENIAL")]
    CrawlDenial,
    #[error("BAD_REQUEST")]
    BadRequest,
    #[error("UNKNOWN_ERROR")]
    UnknownError,
}

impl JobError {
    /// The wire-stable string returned to clients in the `code` field.
    pub fn code(self) -> &'static str {
        match self {
            JobError::ScrapeTimeout => "SCRAPE_TIMEOUT",
            JobError::MapTimeout => "MAP_TIMEOUT",
            JobError::ScrapeDnsResolutionError => "SCRAPE_DNS_RESOLUTION_ERROR",
            JobError::ScrapeAllEnginesFailed => "SCRAPE_ALL_ENGINES_FAILED",
            JobError::ScrapeSslError => "SCRAPE_SSL_ERROR",
            JobError::ScrapeSiteError => "SCRAPE_SITE_ERROR",
            JobError::ScrapeZdrViolationError => "SCRAPE_ZDR_VIOLATION_ERROR",
            JobError::ScrapeRacedRedirectError => "SCRAPE_RACED_REDIRECT_ERROR",
            JobError::ScrapeSitemapError => "SCRAPE_SITEMAP_ERROR",
            JobError::CrawlDenial => "CRAWL_DENIAL",
            JobError::BadRequest => "BAD_REQUEST",
            JobError::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// HTTP status for each error. Scrape's DNS
    /// failure is deliberately 200 (the request was well-formed; the
    /// *document* just isn't fetchable) — every other scrape/map failure
    /// is 408 (timeout) or 500 (everything else), and `CRAWL_DENIAL` is
    /// 403 since it represents a policy refusal, not a server fault.
    pub fn status(self) -> StatusCode {
        match self {
            JobError::ScrapeTimeout | JobError::MapTimeout => StatusCode::REQUEST_TIMEOUT,
            JobError::ScrapeDnsResolutionError => StatusCode::OK,
            JobError::CrawlDenial => StatusCode::FORBIDDEN,
            JobError::BadRequest => StatusCode::BAD_REQUEST,
            JobError::ScrapeAllEnginesFailed
            | JobError::ScrapeSslError
            | JobError::ScrapeSiteError
            | JobError::ScrapeZdrViolationError
            | JobError::ScrapeRacedRedirectError
            | JobError::ScrapeSitemapError
            | JobError::UnknownError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    code: &'static str,
    error: String,
}

impl IntoResponse for JobError {
    fn into_response(self) -> Response {
        let body = ErrorBody { success: false, code: self.code(), error: self.to_string() };
        (self.status(), Json(body)).into_response()
    }
}

/// Maps a semaphore-layer failure onto the wire taxonomy: every one of
/// these (timeout, cancellation, lease loss) surfaces identically to the
/// client as `SCRAPE_TIMEOUT`.
impl From<fleetcrawl_semaphore::Error> for JobError {
    fn from(_: fleetcrawl_semaphore::Error) -> Self {
        JobError::ScrapeTimeout
    }
}

impl From<fleetcrawl_engine::Error> for JobError {
    fn from(err: fleetcrawl_engine::Error) -> Self {
        match err {
            fleetcrawl_engine::Error::DnsResolution => JobError::ScrapeDnsResolutionError,
            fleetcrawl_engine::Error::AllEnginesFailed => JobError::ScrapeAllEnginesFailed,
            fleetcrawl_engine::Error::Ssl => JobError::ScrapeSslError,
            fleetcrawl_engine::Error::Site => JobError::ScrapeSiteError,
            fleetcrawl_engine::Error::ZdrViolation => JobError::ScrapeZdrViolationError,
            fleetcrawl_engine::Error::RacedRedirect => JobError::ScrapeRacedRedirectError,
            fleetcrawl_engine::Error::Http(_) => JobError::UnknownError,
        }
    }
}

impl From<fleetcrawl_map::Error> for JobError {
    fn from(_: fleetcrawl_map::Error) -> Self {
        JobError::MapTimeout
    }
}

impl From<fleetcrawl_crawl::Error> for JobError {
    fn from(_: fleetcrawl_crawl::Error) -> Self {
        JobError::UnknownError
    }
}

impl From<fleetcrawl_queue::Error> for JobError {
    fn from(_: fleetcrawl_queue::Error) -> Self {
        JobError::UnknownError
    }
}

impl From<fleetcrawl_coordination::Error> for JobError {
    fn from(_: fleetcrawl_coordination::Error) -> Self {
        JobError::UnknownError
    }
}
