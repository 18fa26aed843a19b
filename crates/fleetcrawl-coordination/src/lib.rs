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

//! The coordination store gateway: every cross-process piece of state
//! (leases, queues, crawl bookkeeping) lives behind [`CoordinationStore`].
//! Nothing upstream of this crate is allowed to assume Redis specifically —
//! they depend only on the trait, so tests can run against [`fake::FakeStore`]
//! instead of a live server.

pub mod error;
pub mod fake;
pub mod pipeline;
pub mod redis_store;
pub mod script;

pub use error::{Error, Result};
pub use pipeline::{Pipeline, PipelineOp};

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::time::Duration;

/// A single entry returned by `zScan`: member plus score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

/// Result of a `zScan` call: a cursor to resume from (0 means done) plus
/// the batch of members visited.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub cursor: u64,
    pub members: Vec<ScoredMember>,
}

/// Abstract KV/coordination operations. All cross-process state in
/// fleetcrawl flows through this trait; individual operations are atomic,
/// but composing several calls client-side is not — multi-step protocols
/// that need atomicity go through [`CoordinationStore::run_script`]
/// instead of a read-modify-write loop.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;
    async fn del(&self, key: &str) -> Result<()>;

    async fn set_add(&self, key: &str, members: &[String]) -> Result<u64>;
    async fn set_contains(&self, key: &str, member: &str) -> Result<bool>;
    async fn set_card(&self, key: &str) -> Result<u64>;
    async fn set_members(&self, key: &str) -> Result<Vec<String>>;
    async fn set_rem(&self, key: &str, member: &str) -> Result<u64>;

    async fn z_add(&self, key: &str, score: f64, member: &str) -> Result<()>;
    async fn z_range_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>>;
    async fn z_rem_range_by_score(&self, key: &str, min: f64, max: f64) -> Result<u64>;
    async fn z_scan(&self, key: &str, cursor: u64, count: u64) -> Result<ScanResult>;
    async fn z_rem(&self, key: &str, member: &str) -> Result<u64>;
    async fn z_card(&self, key: &str) -> Result<u64>;
    async fn z_score(&self, key: &str, member: &str) -> Result<Option<f64>>;

    async fn list_push(&self, key: &str, value: &str) -> Result<()>;
    async fn list_pop(&self, key: &str, n: u64) -> Result<Vec<String>>;
    async fn list_len(&self, key: &str) -> Result<u64>;
    async fn list_range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>>;
    async fn list_rem(&self, key: &str, value: &str) -> Result<u64>;

    /// Invoke a named server-side atomic script; see [`script`] for the
    /// catalog of scripts and their key/arg contracts.
    async fn run_script(&self, name: &str, keys: &[String], args: &[String]) -> Result<Vec<String>>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    async fn publish(&self, channel: &str, message: &str) -> Result<()>;

    /// Subscribe to a channel; the stream yields messages until dropped.
    async fn subscribe(&self, channel: &str) -> Result<BoxStream<'static, String>>;

    /// Batch a set of unrelated writes into one round trip. No atomicity
    /// guarantee — use [`CoordinationStore::run_script`] when ops must be
    /// all-or-nothing.
    async fn pipeline(&self, ops: Vec<PipelineOp>) -> Result<()>;
}
