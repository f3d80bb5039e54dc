//! Combining publication lists from several sources.
//!
//! Lists are flattened in the order given, collapsed on [`dedup_key`] and
//! sorted newest first. The first record seen for a title is the one kept,
//! so callers pass the most trustworthy source first.

use crate::normalize::{Publication, UNKNOWN_VENUE};
use crate::title::dedup_key;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Venue labels that count as "no venue" when filling gaps
const PLACEHOLDER_VENUES: &[&str] = &[UNKNOWN_VENUE, "Unknown Journal"];

/// What happens to the later duplicates of a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// Later duplicates are discarded outright.
    FirstSeen,
    /// The first record keeps its title, year and populated fields; fields it
    /// lacks are filled from later duplicates and the citation count is the
    /// maximum seen.
    #[default]
    FillGaps,
}

/// Merge publication lists, first occurrence of a title wins.
pub fn merge(sources: &[Vec<Publication>], policy: MergePolicy) -> Vec<Publication> {
    let mut unique: Vec<Publication> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for publication in sources.iter().flatten() {
        let key = dedup_key(&publication.title);
        match index.get(&key) {
            Some(&at) => {
                debug!(title = %publication.title, "Dropping duplicate publication");
                if policy == MergePolicy::FillGaps {
                    fill_gaps(&mut unique[at], publication);
                }
            }
            None => {
                index.insert(key, unique.len());
                unique.push(publication.clone());
            }
        }
    }

    sort_by_year_desc(&mut unique);
    unique
}

/// Stable sort, newest first. Years that do not parse sort as 0.
pub fn sort_by_year_desc(publications: &mut [Publication]) {
    publications.sort_by_key(|p| std::cmp::Reverse(numeric_year(&p.year)));
}

fn numeric_year(year: &str) -> i32 {
    year.trim().parse().unwrap_or(0)
}

fn fill_gaps(kept: &mut Publication, later: &Publication) {
    fill(&mut kept.volume, &later.volume);
    fill(&mut kept.pages, &later.pages);
    fill(&mut kept.doi, &later.doi);
    fill(&mut kept.link, &later.link);
    fill(&mut kept.description, &later.description);

    if PLACEHOLDER_VENUES.contains(&kept.journal.as_str())
        && !PLACEHOLDER_VENUES.contains(&later.journal.as_str())
    {
        kept.journal = later.journal.clone();
    }
    if kept.authors.trim().is_empty() {
        kept.authors = later.authors.clone();
    }
    kept.citation_count = kept.citation_count.max(later.citation_count);
}

fn fill(slot: &mut Option<String>, other: &Option<String>) {
    if slot.is_none() {
        slot.clone_from(other);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publication(title: &str, year: &str) -> Publication {
        Publication {
            title: title.to_string(),
            authors: "J Mack".to_string(),
            journal: UNKNOWN_VENUE.to_string(),
            year: year.to_string(),
            volume: None,
            pages: None,
            doi: None,
            link: None,
            citation_count: 0,
            description: None,
        }
    }

    #[test]
    fn test_first_seen_wins_on_collision() {
        let first = vec![publication("Robo-Bot!", "2021")];
        let second = vec![publication("robo bot", "2023")];
        let merged = merge(&[first, second], MergePolicy::FirstSeen);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "Robo-Bot!");
        assert_eq!(merged[0].year, "2021");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let list = vec![
            publication("A", "2020"),
            publication("b", "2022"),
            publication("B.", "2019"),
        ];
        let once = merge(&[list.clone()], MergePolicy::FillGaps);
        let twice = merge(&[list.clone(), list], MergePolicy::FillGaps);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn test_sorted_desc_with_unparseable_last() {
        let merged = merge(
            &[vec![
                publication("Old", "2019"),
                publication("Weird", "n.d."),
                publication("New", "2024"),
                publication("Also new", "2024"),
            ]],
            MergePolicy::FirstSeen,
        );
        let titles: Vec<&str> = merged.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["New", "Also new", "Old", "Weird"]);
    }

    #[test]
    fn test_first_seen_masks_richer_duplicate() {
        let sparse = publication("Foo", "2023");
        let rich = Publication {
            doi: Some("10.1234/foo".to_string()),
            journal: "Nature".to_string(),
            citation_count: 9,
            ..publication("foo", "2022")
        };
        let merged = merge(&[vec![sparse], vec![rich]], MergePolicy::FirstSeen);
        assert!(merged[0].doi.is_none());
        assert_eq!(merged[0].journal, UNKNOWN_VENUE);
    }

    #[test]
    fn test_fill_gaps_backfills_but_keeps_year() {
        let sparse = Publication {
            link: Some("https://a".to_string()),
            citation_count: 2,
            ..publication("Foo", "2023")
        };
        let rich = Publication {
            doi: Some("10.1234/foo".to_string()),
            link: Some("https://b".to_string()),
            journal: "Nature".to_string(),
            citation_count: 9,
            ..publication("foo", "2022")
        };
        let merged = merge(&[vec![sparse], vec![rich]], MergePolicy::FillGaps);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "Foo");
        assert_eq!(merged[0].year, "2023");
        assert_eq!(merged[0].doi.as_deref(), Some("10.1234/foo"));
        assert_eq!(merged[0].link.as_deref(), Some("https://a"));
        assert_eq!(merged[0].journal, "Nature");
        assert_eq!(merged[0].citation_count, 9);
    }
}
