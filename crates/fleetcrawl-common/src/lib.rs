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

//! Small utilities shared by every crate in the workspace: backoff
//! strategies, a clock abstraction (so lease/deadline math is testable
//! without sleeping), and the base error taxonomy described in the design
//! doc's error-handling section.

pub mod backoff;
pub mod clock;
pub mod error;

pub use backoff::{JitteredBackoff, RandomBackoff};
pub use clock::{Clock, SystemClock};
pub use error::{Error, Result};
