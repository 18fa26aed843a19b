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

/// Public-suffix-aware domain extraction, so `co.uk`-style multi-part
/// TLDs don't get treated as the registrable domain.
pub trait UrlExt {
    fn root_domain(&self) -> Option<&str>;
    fn subdomain(&self) -> Option<&str>;
}

impl UrlExt for url::Url {
    fn root_domain(&self) -> Option<&str> {
        let host = self.host_str()?;
        let domain = psl::domain(host.as_bytes())?;
        std::str::from_utf8(domain.as_bytes()).ok()
    }

    fn subdomain(&self) -> Option<&str> {
        let domain = self.root_domain()?;
        let host = self.host_str()?;
        let mut subdomain = host.strip_suffix(domain)?;
        if let Some(s) = subdomain.strip_suffix('.') {
            subdomain = s;
        }
        if subdomain.is_empty() {
            None
        } else {
            Some(subdomain)
        }
    }
}
