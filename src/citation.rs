//! Year extraction from citation popups and article pages.
//!
//! Used by the operator's `extract` flow to suggest overrides: for each
//! Scholar result the formatted-citation popup is fetched and mined for a
//! year, falling back to the article's own landing page. Suggestions only
//! reach the override file through [`OverrideStore::apply_extracted`], which
//! never replaces an operator's entry.
//!
//! [`OverrideStore::apply_extracted`]: crate::overrides::OverrideStore::apply_extracted

use crate::error::{PubfetchError, Result};
use crate::gscholar::{build_http_client, fetch_page};
use crate::record::RawRecord;
use crate::year::year_from_citation_text;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

static YEAR_20XX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b20[0-9]{2}\b").expect("valid year regex"));

/// Elements that hold formatted citation text, in priority order
const CITATION_SELECTORS: &[&str] = &[
    "#gs_citi",
    ".gs_citr",
    ".citation",
    "#citation-text",
    ".formatted-citation",
];

/// Publication-date meta tags on article landing pages
const DATE_META_SELECTORS: &[&str] = &[
    r#"meta[name="citation_publication_date"]"#,
    r#"meta[name="citation_date"]"#,
    r#"meta[name="dc.date"]"#,
    r#"meta[property="article:published_time"]"#,
    r#"meta[name="prism.publicationDate"]"#,
];

/// Visible date elements on article landing pages
const DATE_TEXT_SELECTORS: &[&str] = &[".publication-date", ".article-date", ".pub-date", "time[datetime]", ".date"];

/// Where an extracted year came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    Citation,
    DirectUrl,
    Error,
}

impl std::fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ExtractionSource::Citation => "google_scholar_citation",
            ExtractionSource::DirectUrl => "direct_url",
            ExtractionSource::Error => "error",
        })
    }
}

/// Outcome of extracting a year for one record.
#[derive(Debug, Clone, PartialEq)]
pub struct CitationOutcome {
    /// Title as scraped
    pub title: String,
    pub extracted_year: Option<String>,
    pub source: ExtractionSource,
    /// Citation text excerpt, or the error message
    pub detail: String,
}

/// Text and meta tags scraped from a citation popup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CitationPage {
    pub citation_text: String,
    pub meta: BTreeMap<String, String>,
}

/// Pull citation text and all `<meta name|property=... content=...>` pairs.
pub fn parse_citation_page(html: &str) -> Result<CitationPage> {
    let document = Html::parse_document(html);
    let mut page = CitationPage::default();

    for css in CITATION_SELECTORS {
        let sel = Selector::parse(css).map_err(|e| PubfetchError::Parse(e.to_string()))?;
        if let Some(elem) = document.select(&sel).next() {
            page.citation_text = elem.text().collect::<String>().trim().to_string();
            break;
        }
    }

    let meta_sel = Selector::parse("meta").map_err(|e| PubfetchError::Parse(e.to_string()))?;
    for meta in document.select(&meta_sel) {
        let attrs = meta.value();
        let name = attrs.attr("name").or_else(|| attrs.attr("property"));
        if let (Some(name), Some(content)) = (name, attrs.attr("content")) {
            page.meta.insert(name.to_string(), content.to_string());
        }
    }

    Ok(page)
}

/// Year from a citation popup.
///
/// Date-ish meta tags are trusted first (first `20xx` token), then the
/// citation text cascade.
pub fn year_from_citation(page: &CitationPage, current_year: i32) -> Option<String> {
    let from_meta = page
        .meta
        .iter()
        .filter(|(k, _)| {
            let k = k.to_lowercase();
            k.contains("date") || k.contains("year")
        })
        .find_map(|(_, v)| first_20xx(v));
    if from_meta.is_some() {
        return from_meta;
    }
    if page.citation_text.is_empty() {
        return None;
    }
    year_from_citation_text(&page.citation_text, current_year)
}

/// Year from an article landing page: date meta tags, visible date
/// elements, then JSON-LD `datePublished`.
pub fn year_from_article_page(html: &str) -> Result<Option<String>> {
    let document = Html::parse_document(html);

    for css in DATE_META_SELECTORS {
        let sel = Selector::parse(css).map_err(|e| PubfetchError::Parse(e.to_string()))?;
        if let Some(year) = document
            .select(&sel)
            .filter_map(|m| m.value().attr("content"))
            .find_map(first_20xx)
        {
            return Ok(Some(year));
        }
    }

    for css in DATE_TEXT_SELECTORS {
        let sel = Selector::parse(css).map_err(|e| PubfetchError::Parse(e.to_string()))?;
        if let Some(elem) = document.select(&sel).next() {
            let text = elem.text().collect::<String>();
            let text = if text.trim().is_empty() {
                elem.value().attr("datetime").unwrap_or("").to_string()
            } else {
                text
            };
            if let Some(year) = first_20xx(&text) {
                return Ok(Some(year));
            }
        }
    }

    let ld_sel = Selector::parse(r#"script[type="application/ld+json"]"#)
        .map_err(|e| PubfetchError::Parse(e.to_string()))?;
    for script in document.select(&ld_sel) {
        let body = script.text().collect::<String>();
        let Ok(data) = serde_json::from_str::<serde_json::Value>(&body) else {
            continue;
        };
        if let Some(year) = data
            .get("datePublished")
            .and_then(|d| d.as_str())
            .and_then(first_20xx)
        {
            return Ok(Some(year));
        }
    }

    Ok(None)
}

fn first_20xx(text: &str) -> Option<String> {
    YEAR_20XX.find(text).map(|m| m.as_str().to_string())
}

/// Fetches citation popups and article pages for Scholar records.
pub struct CitationExtractor {
    client: reqwest::Client,
    delay: Duration,
    current_year: i32,
}

impl CitationExtractor {
    /// `delay` is slept after every citation page fetched.
    pub fn new(proxy: Option<&str>, timeout: Duration, delay: Duration, current_year: i32) -> Result<Self> {
        Ok(Self {
            client: build_http_client(proxy, timeout)?,
            delay,
            current_year,
        })
    }

    /// Extract a year for each record, one record at a time.
    pub async fn extract_all(&self, records: &[RawRecord]) -> Vec<CitationOutcome> {
        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            let title = record.raw_title().to_string();
            info!(title = %truncate(&title, 60), "Extracting citation year");
            let outcome = match self.extract_one(record).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(title = %truncate(&title, 30), error = %e, "Citation extraction failed");
                    CitationOutcome {
                        title,
                        extracted_year: None,
                        source: ExtractionSource::Error,
                        detail: e.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn extract_one(&self, record: &RawRecord) -> Result<CitationOutcome> {
        let mut outcome = CitationOutcome {
            title: record.raw_title().to_string(),
            extracted_year: None,
            source: ExtractionSource::Citation,
            detail: String::new(),
        };

        if let Some(cite_url) = record.citation_url.as_deref() {
            let html = self.get(cite_url).await?;
            let page = parse_citation_page(&html)?;
            outcome.extracted_year = year_from_citation(&page, self.current_year);
            outcome.detail = truncate(&page.citation_text, 200);
            debug!(year = ?outcome.extracted_year, "Citation popup parsed");
            tokio::time::sleep(self.delay).await;
        }

        if outcome.extracted_year.is_none() {
            if let Some(url) = record.url.as_deref() {
                match self.get(url).await.and_then(|html| year_from_article_page(&html)) {
                    Ok(Some(year)) => {
                        outcome.extracted_year = Some(year);
                        outcome.source = ExtractionSource::DirectUrl;
                    }
                    Ok(None) => {}
                    Err(e) => warn!(url, error = %e, "Direct page scrape failed"),
                }
            }
        }

        Ok(outcome)
    }

    async fn get(&self, url: &str) -> Result<String> {
        let url = Url::parse(url).map_err(|e| PubfetchError::Parse(format!("Invalid URL '{}': {}", url, e)))?;
        fetch_page(&self.client, &url).await
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_citation_page() -> Result<()> {
        let html = r#"<html><head><meta name="citation_title" content="Foo"></head><body>
            <div id="gs_citt"><table><tr><td>
            <div class="gs_citr">Mack, J. and Alam, P., 2022. Design of a sensor. Eng. Res. Express, 4(3).</div>
            </td></tr></table></div></body></html>"#;
        let page = parse_citation_page(html)?;
        assert!(page.citation_text.starts_with("Mack, J."));
        assert_eq!(page.meta.get("citation_title").map(String::as_str), Some("Foo"));
        assert_eq!(year_from_citation(&page, 2026).as_deref(), Some("2022"));
        Ok(())
    }

    #[test]
    fn test_meta_date_beats_citation_text() {
        let mut page = CitationPage {
            citation_text: "Mack, J. (2019). Foo.".to_string(),
            ..Default::default()
        };
        page.meta.insert("citation_publication_date".to_string(), "2021/03/02".to_string());
        assert_eq!(year_from_citation(&page, 2026).as_deref(), Some("2021"));
    }

    #[test]
    fn test_empty_citation_page() {
        assert_eq!(year_from_citation(&CitationPage::default(), 2026), None);
    }

    #[test]
    fn test_article_page_meta() -> Result<()> {
        let html = r#"<html><head>
            <meta name="citation_publication_date" content="2024/07/24">
            </head><body><span class="date">1 Jan 2020</span></body></html>"#;
        assert_eq!(year_from_article_page(html)?.as_deref(), Some("2024"));
        Ok(())
    }

    #[test]
    fn test_article_page_time_and_json_ld() -> Result<()> {
        let html = r#"<html><body><time datetime="2023-02-01"></time></body></html>"#;
        assert_eq!(year_from_article_page(html)?.as_deref(), Some("2023"));

        let html = r#"<html><head><script type="application/ld+json">
            {"@type": "ScholarlyArticle", "datePublished": "2022-11-30"}
            </script></head><body></body></html>"#;
        assert_eq!(year_from_article_page(html)?.as_deref(), Some("2022"));

        assert_eq!(year_from_article_page("<html></html>")?, None);
        Ok(())
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
