//! Publication year resolution.
//!
//! Scraped years are unreliable, so the year is resolved by an ordered
//! cascade of strategies, each a pure `(record, context) -> Option<year>`
//! function. The first strategy that yields a year wins:
//!
//! 1. operator override for the cleaned title
//! 2. explicit `year` field, unless it is the configured sentinel
//! 3. first four-digit run of the `date` field
//! 4. most recent plausible year in the description
//! 5. most recent `/YYYY/` segment of the primary URL
//! 6. most recent `/YYYY/` segment of the secondary source URL
//! 7. `as_ylo=YYYY` in the citation URL
//! 8. most recent plausible year anywhere in title, description and URLs
//!
//! and otherwise the current year, with a warning naming the title.
//!
//! Candidates mined from free text (stages 4 to 8) must fall inside
//! [`METADATA_MIN_YEAR`, current year]; the maximum such candidate is taken.

use crate::overrides::OverrideStore;
use crate::record::RawRecord;
use chrono::{Datelike, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use tracing::{debug, warn};

/// Earliest year accepted from scraped paper metadata text
pub const METADATA_MIN_YEAR: i32 = 2015;

/// Earliest year accepted from formatted citation text
pub const CITATION_MIN_YEAR: i32 = 1990;

/// Earliest year accepted from a structured `year` field
const STRUCTURED_MIN_YEAR: i32 = 1900;

/// The Scholar client used to default missing years to this value, so a
/// bare "2025" in the `year` field carried no information.
pub const DEFAULT_SENTINEL_YEAR: &str = "2025";

static YEAR_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:19|20)[0-9]{2}\b").expect("valid year regex"));
static FOUR_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]{4}").expect("valid digit regex"));
static AS_YLO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&;]as_ylo=([0-9]{4})").expect("valid as_ylo regex"));

/// Citation text patterns, tried in order before the global scan.
static CITATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\(([0-9]{4})\)",            // APA: (2024)
        r"\w+,\s+\w+\.\s+([0-9]{4})\.", // MLA: Surname, I. 2024.
        r"\(([0-9]{4}),",             // Chicago: (2024, May 3)
        r#""([0-9]{4})""#,            // quoted year
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid citation regex"))
    .collect()
});

/// Current calendar year in local time.
pub fn current_year() -> i32 {
    Local::now().year()
}

/// Everything a resolution needs besides the record itself.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub overrides: &'a OverrideStore,
    pub current_year: i32,
    /// Year value treated as a placeholder in the `year` field
    pub sentinel_year: Option<&'a str>,
}

impl<'a> ResolveContext<'a> {
    pub fn new(overrides: &'a OverrideStore) -> Self {
        Self {
            overrides,
            current_year: current_year(),
            sentinel_year: Some(DEFAULT_SENTINEL_YEAR),
        }
    }

    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }

    pub fn with_sentinel(mut self, sentinel: Option<&'a str>) -> Self {
        self.sentinel_year = sentinel;
        self
    }
}

/// Which stage produced a resolved year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearSource {
    Override,
    YearField,
    DateField,
    Description,
    UrlPath,
    SourceUrlPath,
    CitationUrl,
    TextScan,
    Fallback,
}

impl fmt::Display for YearSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            YearSource::Override => "override",
            YearSource::YearField => "year field",
            YearSource::DateField => "date field",
            YearSource::Description => "description",
            YearSource::UrlPath => "url path",
            YearSource::SourceUrlPath => "source url path",
            YearSource::CitationUrl => "citation url",
            YearSource::TextScan => "text scan",
            YearSource::Fallback => "fallback",
        };
        f.write_str(label)
    }
}

/// A resolved year and the stage it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearResolution {
    pub year: String,
    pub source: YearSource,
}

/// One cascade stage.
pub type Strategy = fn(&RawRecord, &ResolveContext<'_>) -> Option<String>;

/// The cascade, in precedence order.
pub const CASCADE: &[(YearSource, Strategy)] = &[
    (YearSource::Override, from_override),
    (YearSource::YearField, from_year_field),
    (YearSource::DateField, from_date_field),
    (YearSource::Description, from_description),
    (YearSource::UrlPath, from_url_path),
    (YearSource::SourceUrlPath, from_source_url_path),
    (YearSource::CitationUrl, from_citation_url),
    (YearSource::TextScan, from_text_scan),
];

/// Resolve the publication year of `record`. Never fails.
pub fn resolve(record: &RawRecord, ctx: &ResolveContext<'_>) -> YearResolution {
    for (source, strategy) in CASCADE {
        if let Some(year) = strategy(record, ctx) {
            debug!(title = record.raw_title(), year = %year, source = %source, "Resolved year");
            return YearResolution {
                year,
                source: *source,
            };
        }
    }

    warn!(
        title = record.raw_title(),
        fallback = ctx.current_year,
        "No year found, using current year; consider adding an override"
    );
    YearResolution {
        year: ctx.current_year.to_string(),
        source: YearSource::Fallback,
    }
}

/// Resolve and return just the year string.
pub fn resolve_year(record: &RawRecord, ctx: &ResolveContext<'_>) -> String {
    resolve(record, ctx).year
}

pub fn from_override(record: &RawRecord, ctx: &ResolveContext<'_>) -> Option<String> {
    let title = record.title.as_deref()?;
    let year = ctx.overrides.get(title)?.trim();
    parse_year(year).map(|_| year.to_string())
}

pub fn from_year_field(record: &RawRecord, ctx: &ResolveContext<'_>) -> Option<String> {
    let year = record.year.as_deref()?.trim();
    if ctx.sentinel_year == Some(year) {
        warn!(title = record.raw_title(), year, "Ignoring sentinel year; add an override if it is correct");
        return None;
    }
    let value = parse_year(year)?;
    (STRUCTURED_MIN_YEAR..=ctx.current_year + 1)
        .contains(&value)
        .then(|| year.to_string())
}

pub fn from_date_field(record: &RawRecord, ctx: &ResolveContext<'_>) -> Option<String> {
    let date = record.date.as_deref()?;
    let found = FOUR_DIGITS.find(date)?.as_str();
    let value: i32 = found.parse().ok()?;
    (value <= ctx.current_year).then(|| found.to_string())
}

pub fn from_description(record: &RawRecord, ctx: &ResolveContext<'_>) -> Option<String> {
    latest_year_in_text(record.description.as_deref()?, METADATA_MIN_YEAR, ctx.current_year)
}

pub fn from_url_path(record: &RawRecord, ctx: &ResolveContext<'_>) -> Option<String> {
    latest_year_in_path(record.url.as_deref()?, ctx.current_year)
}

pub fn from_source_url_path(record: &RawRecord, ctx: &ResolveContext<'_>) -> Option<String> {
    latest_year_in_path(record.source.url()?, ctx.current_year)
}

pub fn from_citation_url(record: &RawRecord, ctx: &ResolveContext<'_>) -> Option<String> {
    let url = record.citation_url.as_deref()?;
    let caps = AS_YLO.captures(url)?;
    let year = caps.get(1)?.as_str();
    let value: i32 = year.parse().ok()?;
    in_metadata_range(value, ctx.current_year).then(|| year.to_string())
}

pub fn from_text_scan(record: &RawRecord, ctx: &ResolveContext<'_>) -> Option<String> {
    let blob = [
        record.title.as_deref(),
        record.description.as_deref(),
        record.url.as_deref(),
        record.source.url(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ");
    latest_year_in_text(&blob, METADATA_MIN_YEAR, ctx.current_year)
}

/// Most recent 19xx/20xx token of `text` within `[min, max]`.
pub fn latest_year_in_text(text: &str, min: i32, max: i32) -> Option<String> {
    YEAR_TOKEN
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<i32>().ok())
        .filter(|y| (min..=max).contains(y))
        .max()
        .map(|y| y.to_string())
}

/// Most recent `/YYYY/` path segment of `url` within the metadata range.
///
/// The query string and fragment are ignored, and a trailing segment only
/// counts when it is followed by a slash.
pub fn latest_year_in_path(url: &str, current_year: i32) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < 3 {
        return None;
    }
    segments[1..segments.len() - 1]
        .iter()
        .filter(|s| s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|s| s.parse::<i32>().ok())
        .filter(|y| in_metadata_range(*y, current_year))
        .max()
        .map(|y| y.to_string())
}

/// Year from formatted citation text, e.g. a Scholar "Cite" popup.
///
/// Specific citation patterns are tried first, each accepted only when its
/// first match lies within [1990, current year + 1]; the last resort is the
/// most recent plausible year anywhere in the text.
pub fn year_from_citation_text(text: &str, current_year: i32) -> Option<String> {
    let max = current_year + 1;
    for pattern in CITATION_PATTERNS.iter() {
        let Some(year) = pattern
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
        else {
            continue;
        };
        if let Some(value) = parse_year(year) {
            if (CITATION_MIN_YEAR..=max).contains(&value) {
                return Some(year.to_string());
            }
        }
    }
    latest_year_in_text(text, CITATION_MIN_YEAR, max)
}

/// Parse a string that is exactly four ASCII digits.
pub fn parse_year(s: &str) -> Option<i32> {
    let s = s.trim();
    if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

fn in_metadata_range(year: i32, current_year: i32) -> bool {
    (METADATA_MIN_YEAR..=current_year).contains(&year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SourceField;

    const NOW: i32 = 2026;

    fn empty_store() -> OverrideStore {
        OverrideStore::from_entries(Vec::<(String, String)>::new())
    }

    fn titled(title: &str) -> RawRecord {
        RawRecord {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_override_beats_everything() {
        let store = OverrideStore::from_entries([("Foo Bar", "2019")]);
        let ctx = ResolveContext::new(&store).with_current_year(NOW);
        let record = RawRecord {
            year: Some("2023".to_string()),
            date: Some("2022-01-01".to_string()),
            url: Some("https://x.org/2024/paper/".to_string()),
            ..titled("[PDF][PDF] Foo Bar")
        };
        let res = resolve(&record, &ctx);
        assert_eq!(res.year, "2019");
        assert_eq!(res.source, YearSource::Override);
    }

    #[test]
    fn test_override_is_exact_match_only() {
        let store = OverrideStore::from_entries([("Foo Bar", "2019")]);
        let ctx = ResolveContext::new(&store).with_current_year(NOW);
        let record = RawRecord {
            year: Some("2023".to_string()),
            ..titled("foo bar")
        };
        assert_eq!(resolve_year(&record, &ctx), "2023");
    }

    #[test]
    fn test_override_that_is_not_a_year_is_ignored() {
        let store = OverrideStore::from_entries([("Foo Bar", "circa 2020")]);
        let ctx = ResolveContext::new(&store).with_current_year(NOW);
        let record = RawRecord {
            year: Some("2023".to_string()),
            ..titled("Foo Bar")
        };
        let res = resolve(&record, &ctx);
        assert_eq!(res.year, "2023");
        assert_eq!(res.source, YearSource::YearField);
    }

    #[test]
    fn test_date_field_ignores_non_ascii_digits() {
        let store = empty_store();
        let ctx = ResolveContext::new(&store).with_current_year(NOW);
        let record = RawRecord {
            date: Some("\u{0662}\u{0660}\u{0662}\u{0660}, 2019-03-01".to_string()),
            ..titled("Foo")
        };
        let res = resolve(&record, &ctx);
        assert_eq!(res.year, "2019");
        assert_eq!(res.source, YearSource::DateField);
    }

    #[test]
    fn test_sentinel_year_falls_through() {
        let store = empty_store();
        let ctx = ResolveContext::new(&store).with_current_year(NOW);
        let record = RawRecord {
            year: Some("2025".to_string()),
            date: Some("2023-05-01".to_string()),
            ..titled("Foo")
        };
        let res = resolve(&record, &ctx);
        assert_eq!(res.year, "2023");
        assert_eq!(res.source, YearSource::DateField);
    }

    #[test]
    fn test_sentinel_is_configurable() {
        let store = empty_store();
        let record = RawRecord {
            year: Some("2025".to_string()),
            date: Some("2023-05-01".to_string()),
            ..titled("Foo")
        };
        let ctx = ResolveContext::new(&store)
            .with_current_year(NOW)
            .with_sentinel(None);
        assert_eq!(resolve_year(&record, &ctx), "2025");

        let ctx = ctx.with_sentinel(Some("2023"));
        let record = RawRecord {
            year: Some("2023".to_string()),
            date: Some("2021".to_string()),
            ..titled("Bar")
        };
        assert_eq!(resolve_year(&record, &ctx), "2021");
    }

    #[test]
    fn test_year_field_beats_date_field() {
        let store = empty_store();
        let ctx = ResolveContext::new(&store).with_current_year(NOW);
        let record = RawRecord {
            year: Some("2021".to_string()),
            date: Some("2023-05-01".to_string()),
            ..titled("Foo")
        };
        assert_eq!(resolve(&record, &ctx).source, YearSource::YearField);
    }

    #[test]
    fn test_date_field_rejects_future() {
        let store = empty_store();
        let ctx = ResolveContext::new(&store).with_current_year(NOW);
        let record = RawRecord {
            date: Some("2031-01-01".to_string()),
            description: Some("Published 2018 and revised 2020".to_string()),
            ..titled("Foo")
        };
        let res = resolve(&record, &ctx);
        assert_eq!(res.year, "2020");
        assert_eq!(res.source, YearSource::Description);
    }

    #[test]
    fn test_description_takes_maximum_in_range() {
        let store = empty_store();
        let ctx = ResolveContext::new(&store).with_current_year(NOW);
        let record = RawRecord {
            description: Some("Since 1998 ... 2016 study, cf. 2019, DOI 2045".to_string()),
            ..titled("Foo")
        };
        assert_eq!(from_description(&record, &ctx).as_deref(), Some("2019"));
    }

    #[test]
    fn test_url_path_segments() {
        assert_eq!(
            latest_year_in_path("https://mdpi.com/journal/2021/2023/paper", NOW).as_deref(),
            Some("2023")
        );
        // trailing segment and query are not path segments
        assert_eq!(latest_year_in_path("https://x.org/a/2023", NOW), None);
        assert_eq!(latest_year_in_path("https://x.org/a/?y=/2023/", NOW), None);
        assert_eq!(latest_year_in_path("https://x.org/2012/a", NOW), None);
    }

    #[test]
    fn test_source_url_then_citation_url() {
        let store = empty_store();
        let ctx = ResolveContext::new(&store).with_current_year(NOW);
        let record = RawRecord {
            url: Some("https://x.org/abs/123".to_string()),
            source: SourceField::Link {
                url: Some("https://pdfs.x.org/2022/07/foo.pdf".to_string()),
                journal: None,
            },
            citation_url: Some("https://scholar.google.com/scholar?as_ylo=2024".to_string()),
            ..titled("Foo")
        };
        let res = resolve(&record, &ctx);
        assert_eq!(res.year, "2022");
        assert_eq!(res.source, YearSource::SourceUrlPath);

        let record = RawRecord {
            source: SourceField::Unrecognized,
            ..record
        };
        let res = resolve(&record, &ctx);
        assert_eq!(res.year, "2024");
        assert_eq!(res.source, YearSource::CitationUrl);
    }

    #[test]
    fn test_text_scan_over_title_and_urls() {
        let store = empty_store();
        let ctx = ResolveContext::new(&store).with_current_year(NOW);
        let record = RawRecord {
            url: Some("https://preprints.org/manuscript/2021.0263".to_string()),
            ..titled("Corrigendum (2018 Eng. Res. Express 4 036001)")
        };
        let res = resolve(&record, &ctx);
        assert_eq!(res.year, "2021");
        assert_eq!(res.source, YearSource::TextScan);
    }

    #[test]
    fn test_fallback_to_current_year() {
        let store = empty_store();
        let ctx = ResolveContext::new(&store).with_current_year(NOW);
        let res = resolve(&titled("A paper with no dates"), &ctx);
        assert_eq!(res.year, "2026");
        assert_eq!(res.source, YearSource::Fallback);

        let res = resolve(&RawRecord::default(), &ctx);
        assert_eq!(res.source, YearSource::Fallback);
    }

    #[test]
    fn test_citation_text_patterns() {
        assert_eq!(
            year_from_citation_text("Mack, J. (2022). Design of a sensor.", NOW).as_deref(),
            Some("2022")
        );
        assert_eq!(
            year_from_citation_text("Mack, J. 2021. Design. Eng. Res. Express 4", NOW).as_deref(),
            Some("2021")
        );
        // out-of-range first pattern falls through to later ones
        assert_eq!(
            year_from_citation_text("Vol (1850) \"2020\"", NOW).as_deref(),
            Some("2020")
        );
        assert_eq!(
            year_from_citation_text("Eng. Res. Express 2019; updated 2023", NOW).as_deref(),
            Some("2023")
        );
        assert_eq!(year_from_citation_text("no years here", NOW), None);
        assert_eq!(year_from_citation_text("(2029)", NOW), None);
    }
}
