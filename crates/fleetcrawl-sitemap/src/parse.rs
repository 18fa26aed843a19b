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

use quick_xml::events::Event;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapEntry {
    Url(Url),
    Sitemap(Url),
}

/// Walks a sitemap.org XML document and collects `<loc>` entries, tagging
/// each as a child sitemap (`<sitemapindex><sitemap><loc>`) or a content
/// URL (`<urlset><url><loc>`) depending on which ancestor it's nested
/// under. Malformed XML yields whatever was parsed before the error, at
/// debug level rather than failing the whole traversal.
pub fn parse_sitemap(body: &str) -> Vec<SitemapEntry> {
    let mut reader = quick_xml::Reader::from_str(body);
    let mut out = vec![];

    let mut in_sitemap = false;
    let mut in_url = false;
    let mut in_loc = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"sitemap" => in_sitemap = true,
                b"url" => in_url = true,
                b"loc" => in_loc = true,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"sitemap" => in_sitemap = false,
                b"url" => in_url = false,
                b"loc" => in_loc = false,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_loc {
                    if let Ok(text) = e.unescape() {
                        if let Ok(url) = Url::parse(text.trim()) {
                            if in_sitemap {
                                out.push(SitemapEntry::Sitemap(url));
                            } else if in_url {
                                out.push(SitemapEntry::Url(url));
                            }
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                tracing::debug!(%err, "failed to parse sitemap XML, returning partial result");
                break;
            }
            _ => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sitemap_index() {
        let xml = r#"<sitemapindex>
            <sitemap><loc>https://example.com/a.xml</loc></sitemap>
            <sitemap><loc>https://example.com/b.xml</loc></sitemap>
        </sitemapindex>"#;
        let entries = parse_sitemap(xml);
        assert_eq!(
            entries,
            vec![
                SitemapEntry::Sitemap(Url::parse("https://example.com/a.xml").unwrap()),
                SitemapEntry::Sitemap(Url::parse("https://example.com/b.xml").unwrap()),
            ]
        );
    }

    #[test]
    fn parses_urlset() {
        let xml = r#"<urlset>
            <url><loc>https://example.com/one</loc></url>
            <url><loc>https://example.com/two</loc></url>
        </urlset>"#;
        let entries = parse_sitemap(xml);
        assert_eq!(
            entries,
            vec![
                SitemapEntry::Url(Url::parse("https://example.com/one").unwrap()),
                SitemapEntry::Url(Url::parse("https://example.com/two").unwrap()),
            ]
        );
    }

    #[test]
    fn malformed_xml_returns_partial_result_without_panicking() {
        let xml = r#"<urlset><url><loc>https://example.com/one</loc></url><url><loc>"#;
        let entries = parse_sitemap(xml);
        assert_eq!(entries, vec![SitemapEntry::Url(Url::parse("https://example.com/one").unwrap())]);
    }
}
