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

use std::collections::HashMap;

use crate::model::MapEntry;

fn tokenize(s: &str) -> HashMap<String, f64> {
    let mut counts = HashMap::new();
    for word in s.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        *counts.entry(word.to_string()).or_insert(0.0) += 1.0;
    }
    counts
}

fn cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let dot: f64 = a.iter().map(|(term, count)| count * b.get(term).copied().unwrap_or(0.0)).sum();
    let norm_a = a.values().map(|v| v * v).sum::<f64>().sqrt();
    let norm_b = b.values().map(|v| v * v).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Re-ranks `entries` by cosine similarity between the lowercased `query`
/// and each entry's `url + title + description`, highest first. Ties keep
/// their relative input order (Rust's sort is stable).
pub fn rerank_by_query(entries: &mut [MapEntry], query: &str) {
    let query_vec = tokenize(query);
    let mut scored: Vec<(f64, usize)> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let joined = format!(
                "{} {} {}",
                e.url,
                e.title.as_deref().unwrap_or(""),
                e.description.as_deref().unwrap_or("")
            );
            (cosine(&query_vec, &tokenize(&joined)), i)
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let reordered: Vec<MapEntry> = scored.into_iter().map(|(_, i)| entries[i].clone()).collect();
    entries.clone_from_slice(&reordered);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_overlap_sorts_first() {
        let mut entries = vec![
            MapEntry { url: "https://docs.example.com/guide".into(), title: Some("Guide".into()), description: None },
            MapEntry {
                url: "https://docs.example.com/api".into(),
                title: Some("API reference".into()),
                description: None,
            },
            MapEntry { url: "https://docs.example.com/blog".into(), title: Some("Blog".into()), description: None },
        ];

        rerank_by_query(&mut entries, "api reference");

        assert_eq!(entries[0].url, "https://docs.example.com/api");
    }
}
