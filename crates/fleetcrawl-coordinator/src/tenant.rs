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

/// The read-through view the coordinator consumes for a tenant:
/// billing/auth/rate-limit *policy* live elsewhere —
/// this is the narrow shape the core actually needs.
#[derive(Debug, Clone)]
pub struct TenantView {
    pub tenant_id: String,
    /// `0` means "reject all".
    pub concurrency_limit: u64,
    pub credits_available: i64,
    pub flags: TenantFlags,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TenantFlags {
    pub ignore_robots_txt: bool,
    pub zero_data_retention: bool,
    /// Preview tenants get relaxed persistence rules; the exact
    /// read-after-write semantics for preview-scoped crawl records is
    /// left unresolved here — see DESIGN.md.
    pub preview: bool,
}

#[async_trait]
pub trait TenantLookup: Send + Sync {
    async fn lookup(&self, tenant_id: &str) -> Option<TenantView>;
}
