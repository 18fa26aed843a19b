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

//! The inbound HTTP surface: `POST /scrape`, `POST /crawl`,
//! `GET /crawl/:id`, `POST /crawl/:id/cancel`, `POST /map`. Request-shape
//! validation and authentication live upstream — the
//! tenant id is taken as given from a header, the way an upstream gateway
//! would have already attached it.
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::crawl::{CrawlCoordinator, CrawlStatusError};
use crate::map::MapCoordinator;
use crate::model::{CrawlKickoffResponseBody, CrawlRequestBody, CrawlStatusQuery, MapRequestBody, MapResponseBody, ScrapeRequestBody, ScrapeResponseBody};
use crate::scrape::{ScrapeCoordinator, ScrapeOutcome};

const TENANT_HEADER: &str = "x-tenant-id";

pub struct AppState {
    pub scrape: Arc<ScrapeCoordinator>,
    pub crawl: Arc<CrawlCoordinator>,
    pub map: Arc<MapCoordinator>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/scrape", post(scrape))
        .route("/crawl", post(crawl_kickoff))
        .route("/crawl/:id", get(crawl_status))
        .route("/crawl/:id/cancel", post(crawl_cancel))
        .route("/map", post(map))
        .with_state(state)
}

fn tenant_id(headers: &HeaderMap) -> Result<&str, Response> {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| crate::error::JobError::BadRequest.into_response())
}

async fn scrape(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<ScrapeRequestBody>) -> Response {
    let tenant_id = match tenant_id(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let job_id = Uuid::now_v7().to_string();
    let cancel = CancellationToken::new();

    match state.scrape.scrape(tenant_id, &job_id, body, &cancel).await {
        Ok(ScrapeOutcome::Success(data)) => (StatusCode::OK, Json(ScrapeResponseBody { success: true, data: Some(data), code: None })).into_response(),
        Ok(ScrapeOutcome::DnsFailure) => {
            let code = crate::error::JobError::ScrapeDnsResolutionError.code();
            (StatusCode::OK, Json(ScrapeResponseBody { success: false, data: None, code: Some(code) })).into_response()
        }
        Err(err) => err.into_response(),
    }
}

async fn crawl_kickoff(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<CrawlRequestBody>) -> Response {
    let tenant_id = match tenant_id(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.crawl.kickoff(tenant_id, body).await {
        Ok(job_id) => (StatusCode::OK, Json(CrawlKickoffResponseBody { job_id })).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn crawl_status(State(state): State<Arc<AppState>>, Path(crawl_id): Path<String>, Query(query): Query<CrawlStatusQuery>) -> Response {
    match state.crawl.status(&crawl_id, query.skip, query.limit).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(CrawlStatusError::NotFound) => (StatusCode::NOT_FOUND, "Job not found").into_response(),
    }
}

async fn crawl_cancel(State(state): State<Arc<AppState>>, Path(crawl_id): Path<String>) -> Response {
    match state.crawl.cancel(&crawl_id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(CrawlStatusError::NotFound) => (StatusCode::NOT_FOUND, "Job not found").into_response(),
    }
}

async fn map(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<MapRequestBody>) -> Response {
    let job_id = Uuid::now_v7().to_string();
    let ignore_robots_txt = headers.get("x-ignore-robots-txt").is_some();
    match state.map.map(&job_id, body, ignore_robots_txt).await {
        Ok(result) => (StatusCode::OK, Json(MapResponseBody { links: result.links, warning: result.warning })).into_response(),
        Err(err) => err.into_response(),
    }
}
