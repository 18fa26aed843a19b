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

use std::time::Duration;

/// One write in an unordered, non-atomic batch submitted through
/// [`crate::CoordinationStore::pipeline`]. Used by the crawl tracker to
/// fold several independent writes (e.g. `jobs_done` insert, the
/// `jobs_done_ordered` append, and a TTL refresh) into one round trip.
#[derive(Debug, Clone)]
pub enum PipelineOp {
    Set { key: String, value: String, ttl: Option<Duration> },
    SetAdd { key: String, member: String },
    ListPush { key: String, value: String },
    ListRem { key: String, value: String },
    Expire { key: String, ttl: Duration },
}

/// A fluent builder so callers can assemble a batch without constructing
/// the enum variants by hand.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    ops: Vec<PipelineOp>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>, ttl: Option<Duration>) -> Self {
        self.ops.push(PipelineOp::Set { key: key.into(), value: value.into(), ttl });
        self
    }

    pub fn set_add(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.ops.push(PipelineOp::SetAdd { key: key.into(), member: member.into() });
        self
    }

    pub fn list_push(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ops.push(PipelineOp::ListPush { key: key.into(), value: value.into() });
        self
    }

    pub fn list_rem(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ops.push(PipelineOp::ListRem { key: key.into(), value: value.into() });
        self
    }

    pub fn expire(mut self, key: impl Into<String>, ttl: Duration) -> Self {
        self.ops.push(PipelineOp::Expire { key: key.into(), ttl });
        self
    }

    pub fn into_ops(self) -> Vec<PipelineOp> {
        self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
