//! Raw record -> canonical [`Publication`].
//!
//! Normalization never fails. Each field degrades to its documented default
//! when the raw record is missing it or carries an unrecognized shape.

use crate::doi::extract_doi_from_any;
use crate::record::{AuthorEntry, AuthorField, RawRecord, SourceField};
use crate::title::{clean_title, UNTITLED};
use crate::year::{resolve_year, ResolveContext};
use serde::{Deserialize, Serialize};
use url::Url;

/// Venue label when nothing better is known
pub const UNKNOWN_VENUE: &str = "Unknown Venue";

/// Publisher domains with a fixed display label. Matched as host suffixes.
const PUBLISHER_LABELS: &[(&str, &str)] = &[
    ("mdpi.com", "MDPI Journal"),
    ("ieee.org", "IEEE Publication"),
    ("springer.com", "Springer"),
    ("elsevier.com", "Elsevier"),
    ("sciencedirect.com", "Elsevier"),
    ("nature.com", "Nature"),
    ("arxiv.org", "arXiv"),
];

/// TLDs dropped from a bare host label
const STRIPPED_TLDS: &[&str] = &[".com", ".org", ".edu", ".net"];

/// Canonical publication record consumed by the site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publication {
    pub title: String,
    /// Comma-joined display names
    pub authors: String,
    pub journal: String,
    /// Always four digits
    pub year: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub citation_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Normalize one raw record.
///
/// `author_fallback` is used when the record carries no usable author field,
/// typically the name the search was run for.
pub fn normalize(record: &RawRecord, author_fallback: &str, ctx: &ResolveContext<'_>) -> Publication {
    let title = record
        .title
        .as_deref()
        .map(clean_title)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let doi = extract_doi_from_any([
        record.doi.as_deref(),
        record.url.as_deref(),
        record.source.url(),
    ]);

    Publication {
        title,
        authors: display_authors(&record.authors, author_fallback),
        journal: venue_label(record),
        year: resolve_year(record, ctx),
        volume: record.volume.clone(),
        pages: record.pages.clone(),
        doi,
        link: record.url.clone(),
        citation_count: record.citation_count.unwrap_or(0),
        description: record.description.clone(),
    }
}

/// Normalize every record of one source.
pub fn normalize_all(records: &[RawRecord], author_fallback: &str, ctx: &ResolveContext<'_>) -> Vec<Publication> {
    records
        .iter()
        .map(|r| normalize(r, author_fallback, ctx))
        .collect()
}

/// Author display string for any of the recognized author shapes.
pub fn display_authors(authors: &AuthorField, fallback: &str) -> String {
    let joined = match authors {
        AuthorField::List(entries) => entries
            .iter()
            .filter_map(|entry| match entry {
                AuthorEntry::Name(name) => Some(name.trim()),
                AuthorEntry::Object { name } => name.as_deref().map(str::trim),
            })
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        AuthorField::Text(text) => text.trim().to_string(),
        AuthorField::Map(values) => values.join(", "),
        AuthorField::Unrecognized => String::new(),
    };

    if joined.is_empty() {
        fallback.to_string()
    } else {
        joined
    }
}

/// Venue label, first match wins: venue, journal, the source's journal hint,
/// a label for the source URL's host, a bare source string, the
/// `publication` field, a well-known publisher behind the primary URL, then
/// [`UNKNOWN_VENUE`].
pub fn venue_label(record: &RawRecord) -> String {
    let explicit = [record.venue.as_deref(), record.journal.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty());
    if let Some(venue) = explicit {
        return venue.to_string();
    }

    match &record.source {
        SourceField::Link { journal: Some(journal), .. } if !journal.trim().is_empty() => {
            return journal.trim().to_string();
        }
        SourceField::Link { url: Some(url), .. } => return host_label(url),
        SourceField::Text(text) if !text.trim().is_empty() => return text.trim().to_string(),
        _ => {}
    }

    record
        .publication
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .or_else(|| record.url.as_deref().and_then(publisher_label))
        .unwrap_or_else(|| UNKNOWN_VENUE.to_string())
}

/// Display label derived from a URL's host.
///
/// Well-known publishers get a fixed label; anything else becomes the host
/// without `www.` and common TLD, uppercased (`iopscience.iop.org` ->
/// `IOPSCIENCE.IOP`).
pub fn host_label(url: &str) -> String {
    let Some(host) = url_host(url) else {
        return "Online Publication".to_string();
    };
    if let Some(label) = publisher_label(url) {
        return label;
    }

    let host = host.strip_prefix("www.").unwrap_or(&host);
    let bare = STRIPPED_TLDS
        .iter()
        .find_map(|tld| host.strip_suffix(tld))
        .unwrap_or(host);
    bare.to_uppercase()
}

fn url_host(url: &str) -> Option<String> {
    Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
}

/// Fixed label for a well-known publisher's URL.
fn publisher_label(url: &str) -> Option<String> {
    let host = url_host(url)?;
    PUBLISHER_LABELS
        .iter()
        .find(|(domain, _)| host == *domain || host.ends_with(&format!(".{}", domain)))
        .map(|(_, label)| (*label).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::OverrideStore;

    fn ctx(store: &OverrideStore) -> ResolveContext<'_> {
        ResolveContext::new(store).with_current_year(2026)
    }

    fn empty_store() -> OverrideStore {
        OverrideStore::from_entries(Vec::<(String, String)>::new())
    }

    #[test]
    fn test_normalize_defaults() {
        let store = empty_store();
        let publication = normalize(&RawRecord::default(), "J Mack", &ctx(&store));
        assert_eq!(publication.title, "Untitled");
        assert_eq!(publication.authors, "J Mack");
        assert_eq!(publication.journal, UNKNOWN_VENUE);
        assert_eq!(publication.year, "2026");
        assert_eq!(publication.citation_count, 0);
        assert!(publication.doi.is_none());
        assert!(publication.link.is_none());
    }

    #[test]
    fn test_normalize_scholar_record() {
        let store = empty_store();
        let record = RawRecord {
            title: Some("[HTML][HTML] Design of a sensor".to_string()),
            authors: AuthorField::List(vec![
                AuthorEntry::Object { name: Some("J Mack".to_string()) },
                AuthorEntry::Name("P Alam".to_string()),
            ]),
            year: Some("2022".to_string()),
            url: Some("https://iopscience.iop.org/article/10.1088/2631-8695/ac90ac/meta".to_string()),
            source: SourceField::Link {
                url: Some("https://iopscience.iop.org/article/x".to_string()),
                journal: None,
            },
            citation_count: Some(4),
            ..Default::default()
        };
        let publication = normalize(&record, "fallback", &ctx(&store));
        assert_eq!(publication.title, "Design of a sensor");
        assert_eq!(publication.authors, "J Mack, P Alam");
        assert_eq!(publication.journal, "IOPSCIENCE.IOP");
        assert_eq!(publication.year, "2022");
        assert_eq!(publication.doi.as_deref(), Some("10.1088/2631-8695/ac90ac/meta"));
        assert_eq!(publication.citation_count, 4);
    }

    #[test]
    fn test_display_authors_shapes() {
        assert_eq!(display_authors(&AuthorField::Text("A, B".to_string()), "X"), "A, B");
        assert_eq!(
            display_authors(&AuthorField::Map(vec!["A".to_string(), "B".to_string()]), "X"),
            "A, B"
        );
        assert_eq!(display_authors(&AuthorField::Map(vec![]), "X"), "X");
        assert_eq!(
            display_authors(&AuthorField::List(vec![AuthorEntry::Object { name: None }]), "X"),
            "X"
        );
        assert_eq!(display_authors(&AuthorField::Unrecognized, "X"), "X");
    }

    #[test]
    fn test_venue_precedence() {
        let mut record = RawRecord {
            source: SourceField::Link {
                url: Some("https://www.mdpi.com/2313-7673/10/7/455".to_string()),
                journal: None,
            },
            publication: Some("Pub".to_string()),
            ..Default::default()
        };
        assert_eq!(venue_label(&record), "MDPI Journal");

        record.journal = Some("Biomimetics".to_string());
        assert_eq!(venue_label(&record), "Biomimetics");

        record.venue = Some("Venue".to_string());
        assert_eq!(venue_label(&record), "Venue");

        let record = RawRecord {
            source: SourceField::Link {
                url: Some("https://www.mdpi.com/x".to_string()),
                journal: Some("Hinted".to_string()),
            },
            ..Default::default()
        };
        assert_eq!(venue_label(&record), "Hinted");

        let record = RawRecord {
            source: SourceField::Text("Preprint server".to_string()),
            ..Default::default()
        };
        assert_eq!(venue_label(&record), "Preprint server");

        let mut record = RawRecord {
            url: Some("https://mdpi.com/2075-1702/2023/455".to_string()),
            ..Default::default()
        };
        assert_eq!(venue_label(&record), "MDPI Journal");
        record.url = Some("https://example.edu/paper".to_string());
        assert_eq!(venue_label(&record), UNKNOWN_VENUE);
    }

    #[test]
    fn test_host_label() {
        assert_eq!(host_label("https://ieeexplore.ieee.org/abstract/document/1/"), "IEEE Publication");
        assert_eq!(host_label("https://link.springer.com/article/1"), "Springer");
        assert_eq!(host_label("https://www.sciencedirect.com/science/article/pii/1"), "Elsevier");
        assert_eq!(host_label("https://arxiv.org/abs/2101.00001"), "arXiv");
        assert_eq!(host_label("https://www.biorxiv.org/content/1"), "BIORXIV");
        assert_eq!(host_label("https://research.ed.ac.uk/en/publications/x"), "RESEARCH.ED.AC.UK");
        assert_eq!(host_label("not a url"), "Online Publication");
    }
}
