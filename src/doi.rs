//! DOI extraction from URLs and free text.

use once_cell::sync::Lazy;
use regex::Regex;

static DOI_ANYWHERE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"10\.[0-9]{4,}/[^\s<>"']+"#).expect("valid doi regex"));
static DOI_ORG_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"doi\.org/(10\.[0-9]{4,}/[^\s<>"']+)"#).expect("valid doi.org regex"));

/// Find a DOI in `text`, without trailing sentence punctuation.
///
/// `"see 10.1088/2631-8695/ac90ac)."` yields `10.1088/2631-8695/ac90ac`.
pub fn extract_doi(text: &str) -> Option<String> {
    let raw = DOI_ANYWHERE
        .find(text)
        .map(|m| m.as_str())
        .or_else(|| {
            DOI_ORG_PATH
                .captures(text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str())
        })?;
    let doi = trim_doi(raw);
    (!doi.is_empty()).then(|| doi.to_string())
}

/// First DOI found in any of `candidates`, in order.
pub fn extract_doi_from_any<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
    candidates.into_iter().flatten().find_map(extract_doi)
}

fn trim_doi(doi: &str) -> &str {
    doi.trim_end_matches(['.', ',', ';', ':', ')', '}', ']'])
}
