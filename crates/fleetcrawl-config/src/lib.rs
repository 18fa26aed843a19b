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

//! TOML configuration for fleetcrawl's coordinator and worker processes.
//!
//! Every optional field has a default in [`defaults`], so a minimal config
//! only needs `server.bind_addr` and `redis.url`.

pub mod defaults;
pub mod model;

pub use model::{
    Config, CrawlConfig, MapConfig, QueueConfig, RedisConfig, RobotsConfig, SemaphoreConfig,
    ServerConfig,
};

use fleetcrawl_common::Error;
use std::path::Path;

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self, Error> {
        toml::from_str(raw).map_err(|source| Error::ConfigParse {
            path: "<string>".to_string(),
            source,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| Error::ConfigParse {
            path: path.display().to_string(),
            source,
        })
    }
}
