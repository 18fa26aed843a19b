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

//! Catalog of server-side atomic scripts. The expire-then-count-then-add
//! (semaphore acquire) and scan-then-remove (queue promotion) protocols
//! need multi-step atomicity the gateway's individual ops can't give them;
//! reconstructing them with client-side read-modify-write would race
//! under concurrent callers, so they run as Lua scripts against the store
//! instead.

/// `KEYS[1]` = `sem:{tenantId}`, `ARGV` = `[holderId, limit, nowMs, expiresAtMs]`.
/// Returns `[granted(0|1), count, removed]`.
pub const SEMAPHORE_ACQUIRE: &str = r#"
local key = KEYS[1]
local holder = ARGV[1]
local limit = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local expires_at = tonumber(ARGV[4])

local removed = redis.call('ZREMRANGEBYSCORE', key, '-inf', now)
local count = redis.call('ZCARD', key)

if count >= limit then
  return {0, count, removed}
end

redis.call('ZADD', key, expires_at, holder)
return {1, count + 1, removed}
"#;

/// `KEYS[1]` = `sem:{tenantId}`, `ARGV` = `[holderId, nowMs, expiresAtMs]`.
/// Returns `1` if the holder was still present and its lease was
/// refreshed, `0` if it had already been reclaimed.
pub const SEMAPHORE_HEARTBEAT: &str = r#"
local key = KEYS[1]
local holder = ARGV[1]
local now = tonumber(ARGV[2])
local expires_at = tonumber(ARGV[3])

local score = redis.call('ZSCORE', key, holder)
if not score or tonumber(score) < now then
  return 0
end

redis.call('ZADD', key, expires_at, holder)
return 1
"#;

/// `KEYS[1]` = `queue:{tenantId}`, `ARGV` = `[member, nowMs]`. Removes
/// `member` only if it is still present, returning `1`/`0` — used so a
/// losing promoter doesn't accidentally drop a different worker's catch.
pub const QUEUE_TRY_REMOVE: &str = r#"
local key = KEYS[1]
local member = ARGV[1]

local removed = redis.call('ZREM', key, member)
return removed
"#;

pub fn lua_source(name: &str) -> Option<&'static str> {
    match name {
        "semaphore_acquire" => Some(SEMAPHORE_ACQUIRE),
        "semaphore_heartbeat" => Some(SEMAPHORE_HEARTBEAT),
        "queue_try_remove" => Some(QUEUE_TRY_REMOVE),
        _ => None,
    }
}
