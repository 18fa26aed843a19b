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
use fleetcrawl_engine::{Error, Result, ScrapeDocument, ScrapeEngine};
use std::time::Duration;
use url::Url;

/// A minimal `reqwest`-backed [`ScrapeEngine`]: fetches the page and
/// returns its final URL, status and body as the opaque payload. The real
/// scraping stack (headless rendering, markdown conversion, ...) lives
/// behind the engine trait; this is the baseline a self-hosted deployment
/// runs without one.
pub struct HttpScrapeEngine {
    client: reqwest::Client,
}

impl HttpScrapeEngine {
    pub fn new() -> reqwest::Result<Self> {
        Ok(Self { client: reqwest::Client::builder().build()? })
    }

    fn classify(err: reqwest::Error) -> Error {
        if err.is_timeout() {
            return Error::Site;
        }
        if err.is_connect() {
            let root_cause = err.source_chain();
            if root_cause.contains("dns") || root_cause.contains("resolve") {
                return Error::DnsResolution;
            }
            if root_cause.contains("certificate") || root_cause.contains("tls") || root_cause.contains("ssl") {
                return Error::Ssl;
            }
        }
        Error::Http(err)
    }
}

trait SourceChain {
    fn source_chain(&self) -> String;
}

impl SourceChain for reqwest::Error {
    fn source_chain(&self) -> String {
        let mut chain = self.to_string().to_lowercase();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            chain.push_str(" | ");
            chain.push_str(&err.to_string().to_lowercase());
            source = err.source();
        }
        chain
    }
}

#[async_trait]
impl ScrapeEngine for HttpScrapeEngine {
    async fn scrape(&self, job_id: &str, url: &Url, _options: &serde_json::Value, timeout: Duration) -> Result<ScrapeDocument> {
        let response = self.client.get(url.clone()).timeout(timeout).send().await.map_err(Self::classify)?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(Self::classify)?;

        Ok(ScrapeDocument {
            job_id: job_id.to_string(),
            payload: serde_json::json!({
                "url": final_url,
                "status": status,
                "body": body,
            }),
        })
    }
}
