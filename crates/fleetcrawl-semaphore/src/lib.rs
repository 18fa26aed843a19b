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

//! Per-tenant concurrency semaphore: a lease-based admission gate backed by
//! the coordination store's `sem:{tenantId}` sorted set, with heartbeated
//! leases so a crashed holder's slot is reclaimable after its TTL.

pub mod error;

pub use error::{Error, Result};

use fleetcrawl_common::{Clock, JitteredBackoff};
use fleetcrawl_coordination::CoordinationStore;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const ACTIVE_LEASES_GAUGE: &str = "fleetcrawl_semaphore_active_leases";
const ACQUIRE_DURATION_HISTOGRAM: &str = "fleetcrawl_semaphore_acquire_duration_seconds";
const HOLD_DURATION_HISTOGRAM: &str = "fleetcrawl_semaphore_hold_duration_seconds";

#[derive(Debug, Clone, Copy)]
pub struct SemaphoreConfig {
    pub ttl: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub backoff_jitter_frac: f64,
    pub self_hosted: bool,
}

/// Outcome of a granted `acquire`: how many prior attempts were rejected
/// before this one succeeded, surfaced to `fn` as the `limited` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireOutcome {
    pub granted: bool,
    pub count: u64,
    pub removed: u64,
}

pub struct Semaphore {
    store: Arc<dyn CoordinationStore>,
    clock: Arc<dyn Clock>,
    config: SemaphoreConfig,
}

impl Semaphore {
    pub fn new(store: Arc<dyn CoordinationStore>, clock: Arc<dyn Clock>, config: SemaphoreConfig) -> Self {
        Self { store, clock, config }
    }

    fn key(tenant_id: &str) -> String {
        format!("sem:{tenant_id}")
    }

    /// Single non-blocking admission attempt.
    pub async fn acquire(&self, tenant_id: &str, holder_id: &str, limit: u64) -> Result<AcquireOutcome> {
        let now = self.clock.now_ms();
        let expires_at = now + self.config.ttl.as_millis() as i64;
        let raw = self
            .store
            .run_script(
                "semaphore_acquire",
                &[Self::key(tenant_id)],
                &[holder_id.to_string(), limit.to_string(), now.to_string(), expires_at.to_string()],
            )
            .await?;
        let granted = raw.first().map(|s| s == "1").unwrap_or(false);
        let count: u64 = raw.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
        let removed: u64 = raw.get(2).and_then(|s| s.parse().ok()).unwrap_or(0);
        if granted {
            metrics::gauge!(ACTIVE_LEASES_GAUGE, "tenant_id" => tenant_id.to_string()).set(count as f64);
        }
        Ok(AcquireOutcome { granted, count, removed })
    }

    /// Refresh the holder's lease; `false` means the lease was already
    /// reclaimed and the caller must abort.
    pub async fn heartbeat(&self, tenant_id: &str, holder_id: &str) -> Result<bool> {
        let now = self.clock.now_ms();
        let expires_at = now + self.config.ttl.as_millis() as i64;
        let raw = self
            .store
            .run_script(
                "semaphore_heartbeat",
                &[Self::key(tenant_id)],
                &[holder_id.to_string(), now.to_string(), expires_at.to_string()],
            )
            .await?;
        Ok(raw.first().map(|s| s == "1").unwrap_or(false))
    }

    /// Current number of unexpired leases, without attempting to acquire one.
    pub async fn active_count(&self, tenant_id: &str) -> Result<u64> {
        Ok(self.store.z_card(&Self::key(tenant_id)).await?)
    }

    /// Best-effort release; never fails the caller even if the lease was
    /// already gone.
    pub async fn release(&self, tenant_id: &str, holder_id: &str) {
        if let Err(err) = self.store.z_rem(&Self::key(tenant_id), holder_id).await {
            warn!(tenant_id, holder_id, %err, "failed to release semaphore lease");
        }
    }

    /// Run `fn(limited)` only once a lease has been granted, maintaining a
    /// background heartbeat for its duration and releasing unconditionally
    /// on every exit path (success, error, timeout, or cancellation).
    pub async fn with_semaphore<T, E, F, Fut>(
        &self,
        tenant_id: &str,
        holder_id: &str,
        limit: u64,
        cancel: &CancellationToken,
        timeout: Duration,
        f: F,
    ) -> Result<std::result::Result<T, E>>
    where
        F: FnOnce(bool) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if self.config.self_hosted {
            return Ok(f(false).await);
        }

        let acquire_started = Instant::now();
        let mut backoff = JitteredBackoff::new(self.config.backoff_base, self.config.backoff_max, self.config.backoff_jitter_frac);
        let deadline = Instant::now() + timeout;
        let mut limited = false;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let outcome = self.acquire(tenant_id, holder_id, limit).await?;
            if outcome.granted {
                break;
            }
            limited = true;
            if Instant::now() >= deadline {
                return Err(Error::Timeout);
            }
            let delay = backoff.next_delay();
            let remaining = deadline.saturating_duration_since(Instant::now());
            let wait = delay.min(remaining);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            }
        }
        metrics::histogram!(ACQUIRE_DURATION_HISTOGRAM, "tenant_id" => tenant_id.to_string())
            .record(acquire_started.elapsed().as_secs_f64());

        let hold_started = Instant::now();
        let heartbeat_ttl = self.config.ttl / 2;
        let lost = Arc::new(tokio::sync::Notify::new());
        let heartbeat_handle = {
            let store = self.store.clone();
            let clock = self.clock.clone();
            let tenant_id = tenant_id.to_string();
            let holder_id = holder_id.to_string();
            let config = self.config;
            let lost = lost.clone();
            tokio::spawn(async move {
                let sem = Semaphore::new(store, clock, config);
                loop {
                    tokio::time::sleep(heartbeat_ttl).await;
                    match sem.heartbeat(&tenant_id, &holder_id).await {
                        Ok(true) => {}
                        Ok(false) => {
                            lost.notify_one();
                            return;
                        }
                        Err(err) => {
                            warn!(tenant_id, holder_id, %err, "heartbeat call failed, assuming lease lost");
                            lost.notify_one();
                            return;
                        }
                    }
                }
            })
        };

        let result = tokio::select! {
            biased;
            _ = lost.notified() => Err(Error::LeaseLost),
            _ = cancel.cancelled() => Err(Error::Cancelled),
            output = f(limited) => Ok(output),
        };

        heartbeat_handle.abort();
        self.release(tenant_id, holder_id).await;
        metrics::histogram!(HOLD_DURATION_HISTOGRAM, "tenant_id" => tenant_id.to_string())
            .record(hold_started.elapsed().as_secs_f64());
        debug!(tenant_id, holder_id, "semaphore lease released");

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetcrawl_common::clock::FakeClock;
    use fleetcrawl_coordination::fake::FakeStore;

    fn semaphore(config: SemaphoreConfig) -> (Semaphore, Arc<FakeClock>) {
        let clock = Arc::new(FakeClock::new(0));
        let store = Arc::new(FakeStore::new(clock.clone()));
        (Semaphore::new(store, clock.clone(), config), clock)
    }

    fn cfg() -> SemaphoreConfig {
        SemaphoreConfig {
            ttl: Duration::from_millis(100),
            backoff_base: Duration::from_millis(5),
            backoff_max: Duration::from_millis(20),
            backoff_jitter_frac: 0.1,
            self_hosted: false,
        }
    }

    #[tokio::test]
    async fn grants_up_to_limit_then_rejects() {
        let (sem, _clock) = semaphore(cfg());
        assert!(sem.acquire("t1", "h1", 2).await.unwrap().granted);
        assert!(sem.acquire("t1", "h2", 2).await.unwrap().granted);
        assert!(!sem.acquire("t1", "h3", 2).await.unwrap().granted);
    }

    #[tokio::test]
    async fn release_frees_the_slot() {
        let (sem, _clock) = semaphore(cfg());
        sem.acquire("t1", "h1", 1).await.unwrap();
        assert!(!sem.acquire("t1", "h2", 1).await.unwrap().granted);
        sem.release("t1", "h1").await;
        assert!(sem.acquire("t1", "h2", 1).await.unwrap().granted);
    }

    #[tokio::test]
    async fn expired_lease_is_reclaimed_and_heartbeat_reports_loss() {
        let (sem, clock) = semaphore(cfg());
        sem.acquire("t1", "h1", 1).await.unwrap();
        clock.advance(200);
        let outcome = sem.acquire("t1", "h2", 1).await.unwrap();
        assert!(outcome.granted);
        assert_eq!(outcome.removed, 1);
        assert!(!sem.heartbeat("t1", "h1").await.unwrap());
    }

    #[tokio::test]
    async fn with_semaphore_runs_fn_once_granted() {
        let (sem, _clock) = semaphore(cfg());
        let cancel = CancellationToken::new();
        let result = sem
            .with_semaphore("t1", "h1", 1, &cancel, Duration::from_millis(200), |limited| async move {
                assert!(!limited);
                Ok::<_, Error>(42)
            })
            .await
            .unwrap();
        assert_eq!(result.unwrap(), 42);
        assert!(sem.acquire("t1", "h2", 1).await.unwrap().granted);
    }

    #[tokio::test]
    async fn with_semaphore_times_out_when_limit_held() {
        let (sem, _clock) = semaphore(cfg());
        sem.acquire("t1", "holder-0", 1).await.unwrap();
        let cancel = CancellationToken::new();
        let result = sem
            .with_semaphore("t1", "h1", 1, &cancel, Duration::from_millis(30), |_| async { Ok::<_, Error>(()) })
            .await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn with_semaphore_respects_cancellation() {
        let (sem, _clock) = semaphore(cfg());
        sem.acquire("t1", "holder-0", 1).await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = sem
            .with_semaphore("t1", "h1", 1, &cancel, Duration::from_millis(500), |_| async { Ok::<_, Error>(()) })
            .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// The number of unexpired leases never exceeds the
            /// limit passed to `acquire`, no matter how many holders race
            /// for it.
            #[test]
            fn lease_count_never_exceeds_limit(limit in 1u64..6, attempts in 1usize..30) {
                let rt = tokio::runtime::Runtime::new().unwrap();
                let counts: Vec<u64> = rt.block_on(async {
                    let (sem, _clock) = semaphore(cfg());
                    let mut counts = Vec::with_capacity(attempts);
                    for i in 0..attempts {
                        let holder = format!("h{i}");
                        let _ = sem.acquire("t1", &holder, limit).await.unwrap();
                        counts.push(sem.active_count("t1").await.unwrap());
                    }
                    counts
                });
                prop_assert!(counts.iter().all(|&c| c <= limit));
            }
        }
    }

    #[tokio::test]
    async fn self_hosted_mode_bypasses_the_store() {
        let mut config = cfg();
        config.self_hosted = true;
        let (sem, _clock) = semaphore(config);
        let cancel = CancellationToken::new();
        let result = sem
            .with_semaphore("t1", "h1", 0, &cancel, Duration::from_millis(10), |limited| async move {
                assert!(!limited);
                Ok::<_, Error>(7)
            })
            .await
            .unwrap();
        assert_eq!(result.unwrap(), 7);
    }
}
