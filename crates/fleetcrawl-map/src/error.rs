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

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
    #[error("coordination store error: {0}")]
    Store(#[from] fleetcrawl_coordination::Error),
    #[error("cache entry serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("sitemap traversal failed: {0}")]
    Sitemap(#[from] fleetcrawl_sitemap::Error),
    #[error("all map sources failed: {0}")]
    AllSourcesFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
