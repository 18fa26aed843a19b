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

/// Billing *records* live outside this crate; this is the narrow
/// callback the coordinator fires to report usage, fire-and-forget —
/// billing and logging are non-blocking sidecar effects.
#[async_trait]
pub trait Billing: Send + Sync {
    async fn record_usage(&self, tenant_id: &str, job_id: &str, credits: u64);
}

/// Telemetry sinks live outside this crate; this is the narrow event
/// surface the coordinator emits to, independent of whatever backend
/// (Datadog, Honeycomb, ...) a deployment wires in.
pub trait Telemetry: Send + Sync {
    fn record(&self, event: TelemetryEvent);
}

#[derive(Debug, Clone)]
pub struct TelemetryEvent {
    pub name: &'static str,
    pub tenant_id: String,
    pub job_id: String,
    pub fields: serde_json::Value,
}

impl TelemetryEvent {
    pub fn new(name: &'static str, tenant_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self { name, tenant_id: tenant_id.into(), job_id: job_id.into(), fields: serde_json::Value::Null }
    }

    pub fn with_fields(mut self, fields: serde_json::Value) -> Self {
        self.fields = fields;
        self
    }
}

/// No-op implementations so a deployment without a real billing/telemetry
/// backend (e.g. local dev, tests) still has something to wire in.
pub struct NullBilling;

#[async_trait]
impl Billing for NullBilling {
    async fn record_usage(&self, _tenant_id: &str, _job_id: &str, _credits: u64) {}
}

pub struct NullTelemetry;

impl Telemetry for NullTelemetry {
    fn record(&self, _event: TelemetryEvent) {}
}
