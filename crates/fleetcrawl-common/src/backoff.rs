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

/*
 * JitteredBackoff is partially modeled on tokio_retry's exponential backoff
 * strategy, adapted to add the symmetric jitter the semaphore's acquire
 * loop needs.
 */
use rand::Rng;
use std::time::Duration;

/// Exponential backoff with a base delay, a cap, and symmetric jitter of
/// `jitter_frac` (e.g. `0.25` for +/-25%).
///
/// Used by the per-tenant semaphore's `acquire` retry loop: base 25ms,
/// max 250ms, 25% jitter.
#[derive(Debug, Clone)]
pub struct JitteredBackoff {
    base: Duration,
    max: Duration,
    jitter_frac: f64,
    attempt: u32,
}

impl JitteredBackoff {
    pub fn new(base: Duration, max: Duration, jitter_frac: f64) -> Self {
        Self {
            base,
            max,
            jitter_frac,
            attempt: 0,
        }
    }

    /// Resets the backoff to its initial state, e.g. after a successful
    /// acquire.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Returns the next delay to wait, advancing the internal attempt
    /// counter. The un-jittered delay doubles each call until `max`.
    pub fn next_delay(&mut self) -> Duration {
        let pow = self.attempt.min(16);
        self.attempt = self.attempt.saturating_add(1);

        let unjittered = self
            .base
            .checked_mul(1u32.checked_shl(pow).unwrap_or(u32::MAX))
            .unwrap_or(self.max)
            .min(self.max);

        jitter(unjittered, self.jitter_frac)
    }
}

fn jitter(duration: Duration, frac: f64) -> Duration {
    if frac <= 0.0 {
        return duration;
    }

    let millis = duration.as_millis() as f64;
    let spread = millis * frac;
    let delta = rand::thread_rng().gen_range(-spread..=spread);
    let jittered = (millis + delta).max(0.0);

    Duration::from_millis(jittered as u64)
}

/// A uniformly distributed delay in `[min, max)`, used by the tenant
/// queue's `promoteNext` retry loop (0..300ms).
pub struct RandomBackoff {
    min: Duration,
    max: Duration,
}

impl RandomBackoff {
    pub fn new(min: Duration, max: Duration) -> RandomBackoff {
        RandomBackoff { min, max }
    }

    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }

        let range = (self.max - self.min).as_millis().max(1);
        let delta = rand::thread_rng().gen_range(0..range);
        self.min + Duration::from_millis(delta as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jittered_backoff_doubles_and_caps() {
        let mut b = JitteredBackoff::new(
            Duration::from_millis(25),
            Duration::from_millis(250),
            0.0, // disable jitter so the doubling is exactly checkable
        );

        assert_eq!(b.next_delay(), Duration::from_millis(25));
        assert_eq!(b.next_delay(), Duration::from_millis(50));
        assert_eq!(b.next_delay(), Duration::from_millis(100));
        assert_eq!(b.next_delay(), Duration::from_millis(200));
        assert_eq!(b.next_delay(), Duration::from_millis(250));
        assert_eq!(b.next_delay(), Duration::from_millis(250));
    }

    #[test]
    fn jittered_backoff_reset_restarts_at_base() {
        let mut b = JitteredBackoff::new(
            Duration::from_millis(25),
            Duration::from_millis(250),
            0.0,
        );
        b.next_delay();
        b.next_delay();
        b.reset();
        assert_eq!(b.next_delay(), Duration::from_millis(25));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let mut b = JitteredBackoff::new(Duration::from_millis(100), Duration::from_millis(100), 0.25);
        for _ in 0..1000 {
            let d = b.next_delay();
            assert!(d.as_millis() >= 75 && d.as_millis() <= 125);
        }
    }

    #[test]
    fn random_backoff_within_range() {
        let b = RandomBackoff::new(Duration::from_millis(0), Duration::from_millis(300));
        for _ in 0..1000 {
            let d = b.sample();
            assert!(d < Duration::from_millis(300));
        }
    }
}
