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

//! Single-scrape orchestration: admission through the
//! per-tenant semaphore, dispatch to the scraping engine, and the
//! non-blocking billing/telemetry sidecars.

use std::sync::Arc;
use std::time::Duration;

use fleetcrawl_engine::{Billing, ScrapeEngine, Telemetry, TelemetryEvent};
use fleetcrawl_semaphore::Semaphore;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::JobError;
use crate::model::ScrapeRequestBody;
use crate::tenant::TenantLookup;

/// What dispatching a scrape produced, for the HTTP layer to map onto the
/// exact status/body combinations expected on the wire (the DNS case is
/// `200 {success:false}`, not an error response).
pub enum ScrapeOutcome {
    Success(serde_json::Value),
    DnsFailure,
}

pub struct ScrapeCoordinator {
    semaphore: Arc<Semaphore>,
    engine: Arc<dyn ScrapeEngine>,
    tenants: Arc<dyn TenantLookup>,
    billing: Arc<dyn Billing>,
    telemetry: Arc<dyn Telemetry>,
    /// Fraction of the request's total timeout budget handed to the
    /// engine call itself, leaving headroom for semaphore acquire
    /// (roughly 2/3 of the total budget by default).
    scrape_budget_fraction: f64,
    default_timeout: Duration,
}

impl ScrapeCoordinator {
    pub fn new(
        semaphore: Arc<Semaphore>,
        engine: Arc<dyn ScrapeEngine>,
        tenants: Arc<dyn TenantLookup>,
        billing: Arc<dyn Billing>,
        telemetry: Arc<dyn Telemetry>,
        scrape_budget_fraction: f64,
        default_timeout: Duration,
    ) -> Self {
        Self { semaphore, engine, tenants, billing, telemetry, scrape_budget_fraction, default_timeout }
    }

    pub async fn scrape(
        &self,
        tenant_id: &str,
        job_id: &str,
        request: ScrapeRequestBody,
        cancel: &CancellationToken,
    ) -> Result<ScrapeOutcome, JobError> {
        let url = Url::parse(&request.url).map_err(|_| JobError::BadRequest)?;

        let tenant = self.tenants.lookup(tenant_id).await.ok_or(JobError::BadRequest)?;
        if tenant.concurrency_limit == 0 {
            return Err(JobError::CrawlDenial);
        }

        let total_timeout = request.timeout.map(Duration::from_millis).unwrap_or(self.default_timeout);
        let scrape_budget = total_timeout.mul_f64(self.scrape_budget_fraction);

        let engine = self.engine.clone();
        let options = request.options.clone();
        let url_for_engine = url.clone();
        let job_id_owned = job_id.to_string();

        let outcome = self
            .semaphore
            .with_semaphore(tenant_id, job_id, tenant.concurrency_limit, cancel, total_timeout, move |_limited| async move {
                engine.scrape(&job_id_owned, &url_for_engine, &options, scrape_budget).await
            })
            .await?;

        match outcome {
            Ok(doc) => {
                self.record_success(tenant_id, job_id).await;
                Ok(ScrapeOutcome::Success(doc.payload))
            }
            Err(fleetcrawl_engine::Error::DnsResolution) => {
                self.record_success(tenant_id, job_id).await;
                Ok(ScrapeOutcome::DnsFailure)
            }
            Err(err) => {
                self.telemetry.record(
                    TelemetryEvent::new("scrape_failed", tenant_id, job_id)
                        .with_fields(serde_json::json!({ "error": err.to_string() })),
                );
                Err(err.into())
            }
        }
    }

    /// Billing/telemetry are fire-and-forget sidecars whose failures must
    /// never alter the response.
    async fn record_success(&self, tenant_id: &str, job_id: &str) {
        self.billing.record_usage(tenant_id, job_id, 1).await;
        self.telemetry.record(TelemetryEvent::new("scrape_completed", tenant_id, job_id));
    }
}
