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
use fleetcrawl_coordinator::{TenantFlags, TenantLookup, TenantView};

/// Stand-in for the real tenant/billing service: every tenant id gets the
/// same configured concurrency budget and no flags set. Fine for a
/// self-hosted, single-tenant deployment; a multi-tenant one would swap
/// this for a lookup against its own billing store.
pub struct StaticTenantLookup {
    concurrency_limit: u64,
}

impl StaticTenantLookup {
    pub fn new(concurrency_limit: u64) -> Self {
        Self { concurrency_limit }
    }
}

#[async_trait]
impl TenantLookup for StaticTenantLookup {
    async fn lookup(&self, tenant_id: &str) -> Option<TenantView> {
        Some(TenantView {
            tenant_id: tenant_id.to_string(),
            concurrency_limit: self.concurrency_limit,
            credits_available: i64::MAX,
            flags: TenantFlags::default(),
        })
    }
}
