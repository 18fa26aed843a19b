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

//! In-memory [`CoordinationStore`] used by every other crate's test suite
//! instead of a live Redis. Scripts are interpreted directly rather than
//! through a Lua VM — the two known scripts are small enough to hand-port,
//! and keeping them here makes the fake's behavior exactly match
//! [`crate::script`] without bundling a Lua interpreter just for tests.

use crate::{CoordinationStore, Error, PipelineOp, Result, ScanResult, ScoredMember};
use async_trait::async_trait;
use fleetcrawl_common::Clock;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Debug, Default)]
struct State {
    strings: std::collections::HashMap<String, String>,
    sets: std::collections::HashMap<String, HashSet<String>>,
    zsets: std::collections::HashMap<String, BTreeMap<String, f64>>,
    lists: std::collections::HashMap<String, Vec<String>>,
    expires_at_ms: std::collections::HashMap<String, i64>,
}

pub struct FakeStore {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
    channels: Mutex<std::collections::HashMap<String, broadcast::Sender<String>>>,
}

impl FakeStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            clock,
            channels: Mutex::new(std::collections::HashMap::new()),
        }
    }

    fn now(&self) -> i64 {
        self.clock.now_ms()
    }
}

#[async_trait]
impl CoordinationStore for FakeStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state.lock().unwrap().strings.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        st.strings.insert(key.to_string(), value.to_string());
        if let Some(ttl) = ttl {
            st.expires_at_ms.insert(key.to_string(), self.now() + ttl.as_millis() as i64);
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        st.strings.remove(key);
        st.sets.remove(key);
        st.zsets.remove(key);
        st.lists.remove(key);
        st.expires_at_ms.remove(key);
        Ok(())
    }

    async fn set_add(&self, key: &str, members: &[String]) -> Result<u64> {
        let mut st = self.state.lock().unwrap();
        let set = st.sets.entry(key.to_string()).or_default();
        let mut added = 0u64;
        for m in members {
            if set.insert(m.clone()) {
                added += 1;
            }
        }
        Ok(added)
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().sets.get(key).is_some_and(|s| s.contains(member)))
    }

    async fn set_card(&self, key: &str) -> Result<u64> {
        Ok(self.state.lock().unwrap().sets.get(key).map(|s| s.len() as u64).unwrap_or(0))
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().sets.get(key).map(|s| s.iter().cloned().collect()).unwrap_or_default())
    }

    async fn set_rem(&self, key: &str, member: &str) -> Result<u64> {
        let mut st = self.state.lock().unwrap();
        match st.sets.get_mut(key) {
            Some(s) if s.remove(member) => Ok(1),
            _ => Ok(0),
        }
    }

    async fn z_add(&self, key: &str, score: f64, member: &str) -> Result<()> {
        self.state.lock().unwrap().zsets.entry(key.to_string()).or_default().insert(member.to_string(), score);
        Ok(())
    }

    async fn z_range_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>> {
        let st = self.state.lock().unwrap();
        let mut out: Vec<(String, f64)> = st
            .zsets
            .get(key)
            .map(|z| z.iter().filter(|(_, &s)| s >= min && s <= max).map(|(m, &s)| (m.clone(), s)).collect())
            .unwrap_or_default();
        out.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        Ok(out.into_iter().map(|(m, _)| m).collect())
    }

    async fn z_rem_range_by_score(&self, key: &str, min: f64, max: f64) -> Result<u64> {
        let mut st = self.state.lock().unwrap();
        let Some(z) = st.zsets.get_mut(key) else { return Ok(0) };
        let before = z.len();
        z.retain(|_, &mut s| !(s >= min && s <= max));
        Ok((before - z.len()) as u64)
    }

    async fn z_scan(&self, key: &str, cursor: u64, count: u64) -> Result<ScanResult> {
        let st = self.state.lock().unwrap();
        let mut entries: Vec<(String, f64)> = st.zsets.get(key).map(|z| z.iter().map(|(m, &s)| (m.clone(), s)).collect()).unwrap_or_default();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let start = cursor as usize;
        let end = (start + count as usize).min(entries.len());
        let batch = entries[start.min(entries.len())..end]
            .iter()
            .map(|(m, s)| ScoredMember { member: m.clone(), score: *s })
            .collect();
        let next_cursor = if end >= entries.len() { 0 } else { end as u64 };
        Ok(ScanResult { cursor: next_cursor, members: batch })
    }

    async fn z_rem(&self, key: &str, member: &str) -> Result<u64> {
        let mut st = self.state.lock().unwrap();
        match st.zsets.get_mut(key) {
            Some(z) if z.remove(member).is_some() => Ok(1),
            _ => Ok(0),
        }
    }

    async fn z_card(&self, key: &str) -> Result<u64> {
        Ok(self.state.lock().unwrap().zsets.get(key).map(|z| z.len() as u64).unwrap_or(0))
    }

    async fn z_score(&self, key: &str, member: &str) -> Result<Option<f64>> {
        Ok(self.state.lock().unwrap().zsets.get(key).and_then(|z| z.get(member).copied()))
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<()> {
        self.state.lock().unwrap().lists.entry(key.to_string()).or_default().push(value.to_string());
        Ok(())
    }

    async fn list_pop(&self, key: &str, n: u64) -> Result<Vec<String>> {
        let mut st = self.state.lock().unwrap();
        let Some(list) = st.lists.get_mut(key) else { return Ok(vec![]) };
        let take = (n as usize).min(list.len());
        Ok(list.drain(..take).collect())
    }

    async fn list_len(&self, key: &str) -> Result<u64> {
        Ok(self.state.lock().unwrap().lists.get(key).map(|l| l.len() as u64).unwrap_or(0))
    }

    async fn list_range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let st = self.state.lock().unwrap();
        let Some(list) = st.lists.get(key) else { return Ok(vec![]) };
        let len = list.len() as i64;
        let norm = |i: i64| -> i64 { if i < 0 { (len + i).max(0) } else { i.min(len) } };
        let (s, e) = (norm(start), norm(stop) + 1);
        if s >= e || s >= len {
            return Ok(vec![]);
        }
        Ok(list[s as usize..e.min(len) as usize].to_vec())
    }

    async fn list_rem(&self, key: &str, value: &str) -> Result<u64> {
        let mut st = self.state.lock().unwrap();
        let Some(list) = st.lists.get_mut(key) else { return Ok(0) };
        let before = list.len();
        list.retain(|v| v != value);
        Ok((before - list.len()) as u64)
    }

    async fn run_script(&self, name: &str, keys: &[String], args: &[String]) -> Result<Vec<String>> {
        match name {
            "semaphore_acquire" => {
                let key = keys.first().ok_or_else(|| Error::MalformedScriptResponse {
                    name: name.to_string(),
                    detail: "missing key".to_string(),
                })?;
                let holder = &args[0];
                let limit: u64 = args[1].parse().unwrap_or(0);
                let now: i64 = args[2].parse().unwrap_or(0);
                let expires_at: i64 = args[3].parse().unwrap_or(0);

                let mut st = self.state.lock().unwrap();
                let z = st.zsets.entry(key.clone()).or_default();
                let before = z.len();
                z.retain(|_, &mut s| s as i64 >= now);
                let removed = (before - z.len()) as u64;
                let count = z.len() as u64;

                if count >= limit {
                    Ok(vec!["0".into(), count.to_string(), removed.to_string()])
                } else {
                    z.insert(holder.clone(), expires_at as f64);
                    Ok(vec!["1".into(), (count + 1).to_string(), removed.to_string()])
                }
            }
            "semaphore_heartbeat" => {
                let key = &keys[0];
                let holder = &args[0];
                let now: i64 = args[1].parse().unwrap_or(0);
                let expires_at: i64 = args[2].parse().unwrap_or(0);

                let mut st = self.state.lock().unwrap();
                let z = st.zsets.entry(key.clone()).or_default();
                match z.get(holder).copied() {
                    Some(score) if score as i64 >= now => {
                        z.insert(holder.clone(), expires_at as f64);
                        Ok(vec!["1".into()])
                    }
                    _ => Ok(vec!["0".into()]),
                }
            }
            "queue_try_remove" => {
                let key = &keys[0];
                let member = &args[0];
                let mut st = self.state.lock().unwrap();
                match st.zsets.get_mut(key) {
                    Some(z) if z.remove(member).is_some() => Ok(vec!["1".into()]),
                    _ => Ok(vec!["0".into()]),
                }
            }
            other => Err(Error::UnknownScript(other.to_string())),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        self.state.lock().unwrap().expires_at_ms.insert(key.to_string(), self.now() + ttl.as_millis() as i64);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let st = self.state.lock().unwrap();
        Ok(st.expires_at_ms.get(key).map(|&exp| Duration::from_millis((exp - self.now()).max(0) as u64)))
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        let channels = self.channels.lock().unwrap();
        if let Some(tx) = channels.get(channel) {
            let _ = tx.send(message.to_string());
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<BoxStream<'static, String>> {
        let mut channels = self.channels.lock().unwrap();
        let tx = channels.entry(channel.to_string()).or_insert_with(|| broadcast::channel(256).0);
        let rx = tx.subscribe();
        Ok(Box::pin(tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(|r| futures::future::ready(r.ok()))))
    }

    async fn pipeline(&self, ops: Vec<PipelineOp>) -> Result<()> {
        for op in ops {
            match op {
                PipelineOp::Set { key, value, ttl } => self.set(&key, &value, ttl).await?,
                PipelineOp::SetAdd { key, member } => {
                    self.set_add(&key, std::slice::from_ref(&member)).await?;
                }
                PipelineOp::ListPush { key, value } => self.list_push(&key, &value).await?,
                PipelineOp::ListRem { key, value } => {
                    self.list_rem(&key, &value).await?;
                }
                PipelineOp::Expire { key, ttl } => self.expire(&key, ttl).await?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetcrawl_common::clock::FakeClock;

    fn store() -> FakeStore {
        FakeStore::new(Arc::new(FakeClock::new(0)))
    }

    #[tokio::test]
    async fn set_add_reports_only_newly_added() {
        let s = store();
        let added = s.set_add("k", &["a".into(), "b".into()]).await.unwrap();
        assert_eq!(added, 2);
        let added = s.set_add("k", &["a".into(), "c".into()]).await.unwrap();
        assert_eq!(added, 1);
        assert_eq!(s.set_card("k").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn semaphore_acquire_script_enforces_limit_and_expires_stale() {
        let s = store();
        let keys = vec!["sem:t1".to_string()];

        let r = s.run_script("semaphore_acquire", &keys, &["h1".into(), "1".into(), "0".into(), "100".into()]).await.unwrap();
        assert_eq!(r, vec!["1", "1", "0"]);

        let r = s.run_script("semaphore_acquire", &keys, &["h2".into(), "1".into(), "50".into(), "150".into()]).await.unwrap();
        assert_eq!(r[0], "0");

        let r = s.run_script("semaphore_acquire", &keys, &["h2".into(), "1".into(), "200".into(), "300".into()]).await.unwrap();
        assert_eq!(r[0], "1");
        assert_eq!(r[2], "1");
    }

    #[tokio::test]
    async fn list_range_supports_negative_indices() {
        let s = store();
        for v in ["a", "b", "c"] {
            s.list_push("l", v).await.unwrap();
        }
        assert_eq!(s.list_range("l", 0, -1).await.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(s.list_range("l", -1, -1).await.unwrap(), vec!["c"]);
    }

    #[tokio::test]
    async fn pubsub_round_trips_a_message() {
        let s = store();
        let mut stream = s.subscribe("ch").await.unwrap();
        s.publish("ch", "hello").await.unwrap();
        use futures::StreamExt;
        let msg = stream.next().await;
        assert_eq!(msg, Some("hello".to_string()));
    }
}
