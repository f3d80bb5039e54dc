//! Manual verification report.
//!
//! Lists every publication with its current year, URL and whatever year
//! hints the URL carries, with checkboxes for the operator to sign off.

use crate::error::Result;
use crate::normalize::Publication;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

/// Default report file name
pub const DEFAULT_REPORT_FILE: &str = "publication-verification-report.txt";

static URL_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(20[0-9]{2})\b").expect("valid url year regex"));
static MDPI_ISSUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/([0-9]+)/([0-9]+)/([0-9]+)$").expect("valid mdpi regex"));
static DOI_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"10\.[0-9]+/[^/]*?([0-9]{4})").expect("valid doi year regex"));

const RULE_WIDTH: usize = 80;

/// One publication awaiting manual verification.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationEntry {
    pub title: String,
    pub current_year: String,
    pub url: Option<String>,
    pub url_hints: Vec<String>,
}

impl VerificationEntry {
    pub fn from_publication(publication: &Publication, current_year: i32) -> Self {
        Self {
            title: publication.title.clone(),
            current_year: publication.year.clone(),
            url: publication.link.clone(),
            url_hints: publication
                .link
                .as_deref()
                .map(|url| year_hints_from_url(url, current_year))
                .unwrap_or_default(),
        }
    }
}

/// Year hints a URL carries: `20xx` tokens up to two years ahead, an MDPI
/// volume/issue reminder, and a year embedded in a DOI suffix.
pub fn year_hints_from_url(url: &str, current_year: i32) -> Vec<String> {
    let mut hints: Vec<String> = Vec::new();

    for caps in URL_YEAR.captures_iter(url) {
        let Some(m) = caps.get(1) else { continue };
        let year = m.as_str();
        let in_range = year
            .parse::<i32>()
            .map(|y| (2000..=current_year + 2).contains(&y))
            .unwrap_or(false);
        if in_range && !hints.iter().any(|h| h == year) {
            hints.push(year.to_string());
        }
    }

    if url.contains("mdpi.com") && MDPI_ISSUE.is_match(url) {
        hints.push("Check MDPI volume/issue for publication year".to_string());
    }

    if url.contains("doi.org") || url.contains("/10.") {
        if let Some(year) = DOI_YEAR.captures(url).and_then(|c| c.get(1)) {
            hints.push(format!("DOI suggests: {}", year.as_str()));
        }
    }

    hints
}

/// Render the checklist report.
pub fn render_report(entries: &[VerificationEntry], generated_at: &str) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut report = String::new();

    let _ = write!(
        report,
        "Publication Date Verification Report\n\
         Generated: {generated_at}\n\
         ================================================\n\
         \n\
         Instructions:\n\
         1. Visit each URL below\n\
         2. Find the actual publication date on the journal website\n\
         3. If the date is wrong, update using: pubfetch dates set \"Title\" YYYY\n\
         \n\
         Publications to verify:\n\n"
    );

    for (index, entry) in entries.iter().enumerate() {
        let hints = if entry.url_hints.is_empty() {
            "None".to_string()
        } else {
            entry.url_hints.join(", ")
        };
        let _ = write!(
            report,
            "{}. {}\n   Current Year: {}\n   URL: {}\n   URL Hints: {}\n\n   [ ] Verified correct  [ ] Needs update to: ____\n\n   {}\n\n",
            index + 1,
            entry.title,
            entry.current_year,
            entry.url.as_deref().unwrap_or("No URL available"),
            hints,
            rule
        );
    }

    report.push_str(
        "\nQuick Commands:\n\
         ===============\n\
         \n\
         To update a publication date:\n\
         pubfetch dates set \"Exact Title Here\" YYYY\n\
         \n\
         To see current overrides:\n\
         pubfetch dates list\n\
         \n\
         To update all publications after setting dates:\n\
         pubfetch update\n",
    );

    report
}

/// Copy-paste commands that pin every publication to its current year.
pub fn update_commands(entries: &[VerificationEntry]) -> String {
    let mut out = String::new();
    for (index, entry) in entries.iter().enumerate() {
        let short: String = entry.title.chars().take(40).collect();
        let _ = writeln!(out, "# {}. {}...", index + 1, short);
        let _ = writeln!(
            out,
            "pubfetch dates set \"{}\" {}\n",
            entry.title.replace('"', "\\\""),
            entry.current_year
        );
    }
    out
}

/// Write the rendered report to `path`.
pub fn write_report(path: &Path, report: &str) -> Result<()> {
    std::fs::write(path, report)?;
    info!(path = ?path, "Verification report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_hints_plain_and_doi() {
        let hints = year_hints_from_url("https://www.biorxiv.org/content/10.1101/2025.05.16.654441", 2026);
        assert_eq!(hints, vec!["2025".to_string(), "DOI suggests: 2025".to_string()]);
    }

    #[test]
    fn test_year_hints_mdpi_and_range() {
        let hints = year_hints_from_url("https://www.mdpi.com/2313-7673/10/7/455", 2026);
        assert_eq!(hints, vec!["Check MDPI volume/issue for publication year".to_string()]);

        let hints = year_hints_from_url("https://x.org/2028/2031/a", 2026);
        assert_eq!(hints, vec!["2028".to_string()]);
        assert!(year_hints_from_url("", 2026).is_empty());
    }

    #[test]
    fn test_render_report() {
        let entries = vec![
            VerificationEntry {
                title: "Foo".to_string(),
                current_year: "2023".to_string(),
                url: Some("https://x.org/2023/foo/".to_string()),
                url_hints: vec!["2023".to_string()],
            },
            VerificationEntry {
                title: "Bar".to_string(),
                current_year: "2021".to_string(),
                url: None,
                url_hints: vec![],
            },
        ];
        let report = render_report(&entries, "2026-10-17T00:00:00Z");
        assert!(report.starts_with("Publication Date Verification Report\nGenerated: 2026-10-17T00:00:00Z\n"));
        assert!(report.contains("1. Foo\n   Current Year: 2023\n   URL: https://x.org/2023/foo/\n   URL Hints: 2023\n"));
        assert!(report.contains("2. Bar\n   Current Year: 2021\n   URL: No URL available\n   URL Hints: None\n"));
        assert_eq!(report.matches("[ ] Verified correct").count(), 2);
    }

    #[test]
    fn test_update_commands_escape_quotes() {
        let entries = vec![VerificationEntry {
            title: "A \"quoted\" title".to_string(),
            current_year: "2022".to_string(),
            url: None,
            url_hints: vec![],
        }];
        let commands = update_commands(&entries);
        assert!(commands.contains(r#"pubfetch dates set "A \"quoted\" title" 2022"#));
    }
}
