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

//! Robots policy: fetches and caches `robots.txt` per host, and answers
//! `is_allowed` / `crawl_delay` / `sitemaps` queries against it.
//!
//! Fetching is delegated to a narrow [`RobotsFetcher`] trait rather than a
//! concrete HTTP client — the real fetch goes through the scraping engine
//! (TLS/stealth handling lives there, out of this crate's scope), and tests
//! substitute an in-memory fetcher.

pub mod error;

pub use error::{Error, Result};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Outcome of trying to fetch one host's `robots.txt`.
enum Lookup {
    Found(Robots),
    /// 404: an absent robots.txt means allow-all.
    Unavailable,
    /// Unreachable (5xx, timeout, connection error): also allow-all, but
    /// logged at debug rather than cached as a firm "no rules" result.
    Unreachable,
}

struct Robots {
    primary: robotstxt::Robots,
    alternate: Option<robotstxt::Robots>,
    fetched_at_ms: i64,
}

impl Robots {
    fn is_allowed(&self, url: &Url) -> bool {
        let primary_ok = self.primary.is_allowed(url);
        let alternate_ok = self.alternate.as_ref().map(|r| r.is_allowed(url)).unwrap_or(true);
        primary_ok && alternate_ok
    }

    fn crawl_delay(&self) -> Option<Duration> {
        self.primary
            .crawl_delay()
            .or_else(|| self.alternate.as_ref().and_then(|r| r.crawl_delay()))
    }

    fn sitemaps(&self) -> Vec<Url> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for raw in self.primary.sitemaps().iter().chain(self.alternate.iter().flat_map(|r| r.sitemaps())) {
            if let Ok(url) = Url::parse(raw) {
                if seen.insert(url.to_string()) {
                    out.push(url);
                }
            }
        }
        out
    }
}

/// What the robots policy needs from the scraping engine: fetch a URL's
/// body as text, or report why it couldn't.
#[async_trait]
pub trait RobotsFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchOutcome>;
}

pub enum FetchOutcome {
    Found(String),
    /// HTTP 404.
    NotFound,
    /// Anything else that prevented reading a body: 5xx, timeout, DNS, TLS.
    Unreachable,
}

#[derive(Debug, Clone)]
pub struct RobotsPolicyConfig {
    pub user_agent: String,
    pub alternate_user_agent: Option<String>,
    pub ignore_robots_txt_default: bool,
    pub cache_ttl: Duration,
}

/// Per-host cache of parsed robots.txt, refreshed on expiry. Mirrors the
/// crawler's robots-txt manager: `/robots.txt` is tried over `http` first,
/// falling back to `https`, then `https://www.` for a bare apex domain
/// (this mirrors CDNs that only terminate TLS on the `www` host).
pub struct RobotsPolicy<F: RobotsFetcher> {
    fetcher: F,
    config: RobotsPolicyConfig,
    clock: std::sync::Arc<dyn fleetcrawl_common::Clock>,
    cache: Mutex<HashMap<String, Lookup>>,
}

impl<F: RobotsFetcher> RobotsPolicy<F> {
    pub fn new(fetcher: F, config: RobotsPolicyConfig, clock: std::sync::Arc<dyn fleetcrawl_common::Clock>) -> Self {
        Self { fetcher, config, clock, cache: Mutex::new(HashMap::new()) }
    }

    fn host_of(url: &Url) -> String {
        url.host_str().unwrap_or_default().to_lowercase()
    }

    async fn fetch_text(&self, url: &str) -> Result<FetchOutcome> {
        let parsed = match Url::parse(url) {
            Ok(u) => u,
            Err(_) => return Ok(FetchOutcome::Unreachable),
        };
        self.fetcher.fetch(&parsed).await
    }

    async fn fetch_for_host(&self, host: &str) -> Lookup {
        let first = self.fetch_text(&format!("http://{host}/robots.txt")).await;
        let outcome = match first {
            Ok(FetchOutcome::Found(body)) => Some(body),
            Ok(FetchOutcome::NotFound) => {
                match self.fetch_text(&format!("https://{host}/robots.txt")).await {
                    Ok(FetchOutcome::Found(body)) => Some(body),
                    Ok(FetchOutcome::NotFound) if !host.starts_with("www.") && host.matches('.').count() == 1 => {
                        match self.fetch_text(&format!("https://www.{host}/robots.txt")).await {
                            Ok(FetchOutcome::Found(body)) => Some(body),
                            _ => None,
                        }
                    }
                    _ => None,
                }
            }
            Ok(FetchOutcome::Unreachable) | Err(_) => None,
        };

        let Some(body) = outcome else {
            debug!(host, "robots.txt unavailable, treating as allow-all");
            return Lookup::Unavailable;
        };

        let primary = match robotstxt::Robots::parse(&self.config.user_agent, &body) {
            Ok(r) => r,
            Err(err) => {
                debug!(host, %err, "robots.txt failed to parse, treating as allow-all");
                return Lookup::Unreachable;
            }
        };
        let alternate = self
            .config
            .alternate_user_agent
            .as_deref()
            .and_then(|ua| robotstxt::Robots::parse(ua, &body).ok());

        Lookup::Found(Robots { primary, alternate, fetched_at_ms: self.clock.now_ms() })
    }

    async fn with_cached<T>(&self, url: &Url, f: impl FnOnce(&Lookup) -> T) -> T {
        let host = Self::host_of(url);
        let needs_refresh = {
            let cache = self.cache.lock().unwrap();
            match cache.get(&host) {
                Some(Lookup::Found(r)) => self.clock.now_ms() - r.fetched_at_ms > self.config.cache_ttl.as_millis() as i64,
                Some(_) => false,
                None => true,
            }
        };
        if needs_refresh {
            let fresh = self.fetch_for_host(&host).await;
            self.cache.lock().unwrap().insert(host.clone(), fresh);
        }
        let cache = self.cache.lock().unwrap();
        f(cache.get(&host).expect("just inserted or already present"))
    }

    /// `ignore_robots_txt` is the OR of the per-request flag and the
    /// tenant-level default; when set, every URL is allowed without a fetch.
    pub async fn is_allowed(&self, url: &Url, ignore_robots_txt: bool) -> bool {
        if ignore_robots_txt || self.config.ignore_robots_txt_default {
            return true;
        }
        self.with_cached(url, |lookup| match lookup {
            Lookup::Found(r) => r.is_allowed(url),
            Lookup::Unavailable | Lookup::Unreachable => true,
        })
        .await
    }

    pub async fn crawl_delay(&self, url: &Url) -> Option<Duration> {
        self.with_cached(url, |lookup| match lookup {
            Lookup::Found(r) => r.crawl_delay(),
            Lookup::Unavailable | Lookup::Unreachable => None,
        })
        .await
    }

    pub async fn sitemaps(&self, url: &Url) -> Vec<Url> {
        self.with_cached(url, |lookup| match lookup {
            Lookup::Found(r) => r.sitemaps(),
            Lookup::Unavailable | Lookup::Unreachable => vec![],
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetcrawl_common::clock::FakeClock;
    use std::sync::Arc;

    struct StaticFetcher(HashMap<String, String>);

    #[async_trait]
    impl RobotsFetcher for StaticFetcher {
        async fn fetch(&self, url: &Url) -> Result<FetchOutcome> {
            match self.0.get(url.as_str()) {
                Some(body) => Ok(FetchOutcome::Found(body.clone())),
                None => Ok(FetchOutcome::NotFound),
            }
        }
    }

    fn config() -> RobotsPolicyConfig {
        RobotsPolicyConfig {
            user_agent: "fleetcrawlbot".to_string(),
            alternate_user_agent: None,
            ignore_robots_txt_default: false,
            cache_ttl: Duration::from_secs(3600),
        }
    }

    #[tokio::test]
    async fn disallowed_path_is_rejected() {
        let mut bodies = HashMap::new();
        bodies.insert(
            "http://example.com/robots.txt".to_string(),
            "User-agent: fleetcrawlbot\nDisallow: /private".to_string(),
        );
        let policy = RobotsPolicy::new(StaticFetcher(bodies), config(), Arc::new(FakeClock::new(0)));

        assert!(!policy.is_allowed(&Url::parse("http://example.com/private/doc").unwrap(), false).await);
        assert!(policy.is_allowed(&Url::parse("http://example.com/public").unwrap(), false).await);
    }

    #[tokio::test]
    async fn missing_robots_txt_allows_everything() {
        let policy = RobotsPolicy::new(StaticFetcher(HashMap::new()), config(), Arc::new(FakeClock::new(0)));
        assert!(policy.is_allowed(&Url::parse("http://example.com/anything").unwrap(), false).await);
    }

    #[tokio::test]
    async fn ignore_flag_bypasses_fetch_entirely() {
        let mut bodies = HashMap::new();
        bodies.insert("http://example.com/robots.txt".to_string(), "User-agent: *\nDisallow: /".to_string());
        let policy = RobotsPolicy::new(StaticFetcher(bodies), config(), Arc::new(FakeClock::new(0)));
        assert!(policy.is_allowed(&Url::parse("http://example.com/anything").unwrap(), true).await);
    }

    #[tokio::test]
    async fn alternate_agent_disallow_also_blocks() {
        let mut bodies = HashMap::new();
        bodies.insert(
            "http://example.com/robots.txt".to_string(),
            "User-agent: fleetcrawlbot\nAllow: /\n\nUser-agent: fleetcrawl-alt\nDisallow: /secret".to_string(),
        );
        let mut cfg = config();
        cfg.alternate_user_agent = Some("fleetcrawl-alt".to_string());
        let policy = RobotsPolicy::new(StaticFetcher(bodies), cfg, Arc::new(FakeClock::new(0)));
        assert!(!policy.is_allowed(&Url::parse("http://example.com/secret/x").unwrap(), false).await);
        assert!(policy.is_allowed(&Url::parse("http://example.com/open").unwrap(), false).await);
    }

    #[tokio::test]
    async fn sitemaps_are_surfaced() {
        let mut bodies = HashMap::new();
        bodies.insert(
            "http://example.com/robots.txt".to_string(),
            "User-agent: *\nAllow: /\nSitemap: http://example.com/sitemap.xml".to_string(),
        );
        let policy = RobotsPolicy::new(StaticFetcher(bodies), config(), Arc::new(FakeClock::new(0)));
        let maps = policy.sitemaps(&Url::parse("http://example.com/x").unwrap()).await;
        assert_eq!(maps, vec![Url::parse("http://example.com/sitemap.xml").unwrap()]);
    }

    #[tokio::test]
    async fn cache_expires_and_refetches() {
        let bodies = Arc::new(Mutex::new(HashMap::new()));
        bodies.lock().unwrap().insert(
            "http://example.com/robots.txt".to_string(),
            "User-agent: *\nDisallow: /a".to_string(),
        );

        struct SharedFetcher(Arc<Mutex<HashMap<String, String>>>);
        #[async_trait]
        impl RobotsFetcher for SharedFetcher {
            async fn fetch(&self, url: &Url) -> Result<FetchOutcome> {
                match self.0.lock().unwrap().get(url.as_str()) {
                    Some(body) => Ok(FetchOutcome::Found(body.clone())),
                    None => Ok(FetchOutcome::NotFound),
                }
            }
        }

        let clock = Arc::new(FakeClock::new(0));
        let mut cfg = config();
        cfg.cache_ttl = Duration::from_millis(100);
        let policy = RobotsPolicy::new(SharedFetcher(bodies.clone()), cfg, clock.clone());

        assert!(!policy.is_allowed(&Url::parse("http://example.com/a").unwrap(), false).await);
        bodies.lock().unwrap().insert(
            "http://example.com/robots.txt".to_string(),
            "User-agent: *\nAllow: /".to_string(),
        );
        // still cached
        assert!(!policy.is_allowed(&Url::parse("http://example.com/a").unwrap(), false).await);
        clock.advance(200);
        assert!(policy.is_allowed(&Url::parse("http://example.com/a").unwrap(), false).await);
    }
}
