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

use async_trait::async_trait;
use url::Url;

/// Plain `reqwest`-backed implementation of the narrow fetch traits
/// `fleetcrawl-robots` and `fleetcrawl-sitemap` depend on. Production
/// deployments that need TLS fingerprinting or headless rendering for
/// these fetches would swap this out; it's a faithful baseline for
/// self-hosted and test deployments.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Follows redirects (reqwest does this by default) and returns the
    /// final URL actually served, for map pipeline step 1 ("resolve
    /// redirects on the origin URL; if the resolved domain differs,
    /// rewrite hostname").
    pub async fn resolve_redirects(&self, url: &Url) -> crate::Result<Url> {
        let response = self.client.get(url.clone()).send().await?;
        Ok(response.url().clone())
    }
}

#[async_trait]
impl fleetcrawl_robots::RobotsFetcher for HttpClient {
    async fn fetch(&self, url: &Url) -> fleetcrawl_robots::Result<fleetcrawl_robots::FetchOutcome> {
        match self.client.get(url.clone()).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => Ok(fleetcrawl_robots::FetchOutcome::Found(body)),
                Err(_) => Ok(fleetcrawl_robots::FetchOutcome::Unreachable),
            },
            Ok(response) if response.status().as_u16() == 404 => Ok(fleetcrawl_robots::FetchOutcome::NotFound),
            Ok(_) => Ok(fleetcrawl_robots::FetchOutcome::Unreachable),
            Err(_) => Ok(fleetcrawl_robots::FetchOutcome::Unreachable),
        }
    }
}

#[async_trait]
impl fleetcrawl_sitemap::SitemapFetcher for HttpClient {
    async fn fetch(&self, url: &Url) -> fleetcrawl_sitemap::Result<fleetcrawl_sitemap::FetchOutcome> {
        match self.client.get(url.clone()).send().await {
            Ok(response) if response.status().is_success() => match response.bytes().await {
                Ok(bytes) => Ok(fleetcrawl_sitemap::FetchOutcome::Found(bytes.to_vec())),
                Err(_) => Ok(fleetcrawl_sitemap::FetchOutcome::Unreachable),
            },
            Ok(response) if response.status().as_u16() == 404 => Ok(fleetcrawl_sitemap::FetchOutcome::NotFound),
            Ok(_) => Ok(fleetcrawl_sitemap::FetchOutcome::Unreachable),
            Err(_) => Ok(fleetcrawl_sitemap::FetchOutcome::Unreachable),
        }
    }
}

/// Stand-in for a real external search provider (an external
/// collaborator this crate only consumes through a trait); always returns no results so a
/// deployment without one configured degrades to the sitemap/index
/// sources instead of failing.
pub struct NullSearchProvider;

#[async_trait]
impl fleetcrawl_map::SearchProvider for NullSearchProvider {
    async fn search(&self, _site_query: &str, _limit: usize) -> fleetcrawl_map::Result<Vec<fleetcrawl_map::MapEntry>> {
        Ok(vec![])
    }
}

/// Stand-in for the domain index external service; same rationale as
/// [`NullSearchProvider`].
pub struct NullDomainIndex;

#[async_trait]
impl fleetcrawl_map::DomainIndex for NullDomainIndex {
    async fn query(&self, _host: &str, _path_prefix: Option<&str>, _freshness_days: u32) -> fleetcrawl_map::Result<Vec<fleetcrawl_map::MapEntry>> {
        Ok(vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetcrawl_robots::RobotsFetcher;
    use fleetcrawl_sitemap::SitemapFetcher;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetches_robots_txt_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"))
            .mount(&server)
            .await;

        let client = HttpClient::new(Duration::from_secs(5)).unwrap();
        let url = Url::parse(&format!("{}/robots.txt", server.uri())).unwrap();
        let outcome = RobotsFetcher::fetch(&client, &url).await.unwrap();
        assert!(matches!(outcome, fleetcrawl_robots::FetchOutcome::Found(body) if body.contains("Disallow")));
    }

    #[tokio::test]
    async fn missing_robots_txt_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/robots.txt")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

        let client = HttpClient::new(Duration::from_secs(5)).unwrap();
        let url = Url::parse(&format!("{}/robots.txt", server.uri())).unwrap();
        let outcome = RobotsFetcher::fetch(&client, &url).await.unwrap();
        assert!(matches!(outcome, fleetcrawl_robots::FetchOutcome::NotFound));
    }

    #[tokio::test]
    async fn server_error_is_unreachable_not_a_hard_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/sitemap.xml")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

        let client = HttpClient::new(Duration::from_secs(5)).unwrap();
        let url = Url::parse(&format!("{}/sitemap.xml", server.uri())).unwrap();
        let outcome = SitemapFetcher::fetch(&client, &url).await.unwrap();
        assert!(matches!(outcome, fleetcrawl_sitemap::FetchOutcome::Unreachable));
    }

    #[tokio::test]
    async fn resolve_redirects_returns_final_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET")).and(path("/new")).respond_with(ResponseTemplate::new(200).set_body_string("ok")).mount(&server).await;

        let client = HttpClient::new(Duration::from_secs(5)).unwrap();
        let url = Url::parse(&format!("{}/old", server.uri())).unwrap();
        let resolved = client.resolve_redirects(&url).await.unwrap();
        assert!(resolved.path().ends_with("/new"));
    }

    #[tokio::test]
    async fn null_search_and_index_return_no_results() {
        let search = NullSearchProvider;
        let index = NullDomainIndex;
        assert!(fleetcrawl_map::SearchProvider::search(&search, "site:example.com", 10).await.unwrap().is_empty());
        assert!(index.query("example.com", None, 14).await.unwrap().is_empty());
    }
}
