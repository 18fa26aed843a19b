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

use crate::script::lua_source;
use crate::{CoordinationStore, Error, PipelineOp, Result, ScanResult, ScoredMember};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::time::Duration;

/// [`CoordinationStore`] backed by a real Redis (or Redis-protocol-compatible)
/// server, reached through a [`ConnectionManager`] that reconnects
/// transparently on connection loss.
pub struct RedisStore {
    conn: ConnectionManager,
    client: redis::Client,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::Unreachable(e.to_string()))?;
        Ok(Self { conn, client })
    }
}

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn set_add(&self, key: &str, members: &[String]) -> Result<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        Ok(conn.sadd(key, members).await?)
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.sismember(key, member).await?)
    }

    async fn set_card(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        Ok(conn.scard(key).await?)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.smembers(key).await?)
    }

    async fn set_rem(&self, key: &str, member: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        Ok(conn.srem(key, member).await?)
    }

    async fn z_add(&self, key: &str, score: f64, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.zadd(key, member, score).await?;
        Ok(())
    }

    async fn z_range_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.zrangebyscore(key, min, max).await?)
    }

    async fn z_rem_range_by_score(&self, key: &str, min: f64, max: f64) -> Result<u64> {
        let mut conn = self.conn.clone();
        Ok(conn.zrembyscore(key, min, max).await?)
    }

    async fn z_scan(&self, key: &str, cursor: u64, count: u64) -> Result<ScanResult> {
        let mut conn = self.conn.clone();
        let (next, raw): (u64, Vec<(String, f64)>) = redis::cmd("ZSCAN")
            .arg(key)
            .arg(cursor)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;
        Ok(ScanResult {
            cursor: next,
            members: raw.into_iter().map(|(member, score)| ScoredMember { member, score }).collect(),
        })
    }

    async fn z_rem(&self, key: &str, member: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        Ok(conn.zrem(key, member).await?)
    }

    async fn z_card(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        Ok(conn.zcard(key).await?)
    }

    async fn z_score(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let mut conn = self.conn.clone();
        Ok(conn.zscore(key, member).await?)
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.rpush(key, value).await?;
        Ok(())
    }

    async fn list_pop(&self, key: &str, n: u64) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let popped: Vec<String> = conn.lpop(key, std::num::NonZeroUsize::new(n.max(1) as usize)).await?;
        Ok(popped)
    }

    async fn list_len(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        Ok(conn.llen(key).await?)
    }

    async fn list_range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.lrange(key, start as isize, stop as isize).await?)
    }

    async fn list_rem(&self, key: &str, value: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        Ok(conn.lrem(key, 0, value).await?)
    }

    async fn run_script(&self, name: &str, keys: &[String], args: &[String]) -> Result<Vec<String>> {
        let source = lua_source(name).ok_or_else(|| Error::UnknownScript(name.to_string()))?;
        let mut conn = self.conn.clone();
        let mut invocation = Script::new(source).prepare_invoke();
        for k in keys {
            invocation.key(k);
        }
        for a in args {
            invocation.arg(a);
        }
        let raw: redis::Value = invocation.invoke_async(&mut conn).await?;
        parse_script_reply(name, raw)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.expire(key, ttl.as_secs().max(1) as i64).await?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let mut conn = self.conn.clone();
        let secs: i64 = conn.ttl(key).await?;
        Ok(if secs < 0 { None } else { Some(Duration::from_secs(secs as u64)) })
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.publish(channel, message).await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<BoxStream<'static, String>> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        let stream = pubsub
            .into_on_message()
            .filter_map(|msg| futures::future::ready(msg.get_payload::<String>().ok()));
        Ok(Box::pin(stream))
    }

    async fn pipeline(&self, ops: Vec<PipelineOp>) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        for op in ops {
            match op {
                PipelineOp::Set { key, value, ttl } => match ttl {
                    Some(ttl) => {
                        pipe.set_ex(key, value, ttl.as_secs().max(1)).ignore();
                    }
                    None => {
                        pipe.set(key, value).ignore();
                    }
                },
                PipelineOp::SetAdd { key, member } => {
                    pipe.sadd(key, member).ignore();
                }
                PipelineOp::ListPush { key, value } => {
                    pipe.rpush(key, value).ignore();
                }
                PipelineOp::ListRem { key, value } => {
                    pipe.lrem(key, 0, value).ignore();
                }
                PipelineOp::Expire { key, ttl } => {
                    pipe.expire(key, ttl.as_secs().max(1) as i64).ignore();
                }
            }
        }
        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}

fn parse_script_reply(name: &str, value: redis::Value) -> Result<Vec<String>> {
    match value {
        redis::Value::Bulk(items) => items
            .into_iter()
            .map(|item| match item {
                redis::Value::Int(i) => Ok(i.to_string()),
                redis::Value::Data(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
                other => Err(Error::MalformedScriptResponse {
                    name: name.to_string(),
                    detail: format!("unexpected element {other:?}"),
                }),
            })
            .collect(),
        redis::Value::Int(i) => Ok(vec![i.to_string()]),
        other => Err(Error::MalformedScriptResponse {
            name: name.to_string(),
            detail: format!("unexpected top-level reply {other:?}"),
        }),
    }
}
