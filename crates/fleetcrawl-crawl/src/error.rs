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
    #[error("crawl {0} not found")]
    NotFound(String),

    #[error("failed to (de)serialize crawl record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to parse URL: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Store(#[from] fleetcrawl_coordination::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
