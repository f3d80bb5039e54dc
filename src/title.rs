//! Title cleanup and title-derived keys.
//!
//! Scholar prefixes result titles with result-type badges such as
//! `[PDF][PDF]`. Those never reach output and are never used for matching.

/// Badge prefixes, stripped in this order, anchored at the start, case-sensitive.
const TITLE_TAGS: &[&str] = &["[HTML][HTML]", "[PDF][PDF]", "[CITATION]"];

/// Title used when a record has none.
pub const UNTITLED: &str = "Untitled";

/// Strip leading result-type badges and surrounding whitespace.
///
/// `"[HTML][HTML] Design of a sensor"` becomes `"Design of a sensor"`.
pub fn clean_title(raw: &str) -> String {
    let mut title = raw;
    for tag in TITLE_TAGS {
        if let Some(rest) = title.strip_prefix(tag) {
            title = rest.trim_start();
        }
    }
    title.trim().to_string()
}

/// Key used for override lookups: the cleaned title, verbatim.
pub fn override_key(raw: &str) -> String {
    clean_title(raw)
}

/// Key used for deduplication.
///
/// Lowercased, punctuation treated as a word break, whitespace collapsed,
/// so `"Robo-Bot!"` and `"robo bot"` produce the same key.
pub fn dedup_key(title: &str) -> String {
    let lowered: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}
