//! Operator-asserted publication years.
//!
//! The override file maps a cleaned title to a four-digit year and always
//! wins over anything scraped. Only explicit operator commands write to it;
//! the bulk path ([`OverrideStore::apply_extracted`]) adds missing titles and
//! never replaces an existing entry.

use crate::citation::CitationOutcome;
use crate::error::{PubfetchError, Result};
use crate::title::override_key;
use crate::year::{current_year, parse_year};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default override file name, relative to the working directory
pub const DEFAULT_OVERRIDES_FILE: &str = "publication-dates.json";

/// Lowest year an operator may assert
const MIN_OVERRIDE_YEAR: i32 = 1900;

/// How far into the future an operator may assert (in-press papers)
const OVERRIDE_YEAR_SLACK: i32 = 5;

/// On-disk layout of the override file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OverrideFile {
    #[serde(rename = "manualDates", default)]
    pub manual_dates: BTreeMap<String, String>,
    #[serde(rename = "_instructions", default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<Value>,
    #[serde(rename = "_lastExtraction", default, skip_serializing_if = "Option::is_none")]
    pub last_extraction: Option<LastExtraction>,
    /// Keys we do not know about are carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OverrideFile {
    fn fresh() -> Self {
        Self {
            instructions: Some(default_instructions()),
            ..Default::default()
        }
    }
}

/// Stamp left by the last bulk extraction run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LastExtraction {
    pub date: String,
    pub extracted_count: usize,
    pub total_processed: usize,
    pub updated_count: usize,
}

/// Result of a bulk update from citation extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplySummary {
    /// Titles newly added, with their year
    pub added: Vec<(String, String)>,
    /// Titles already overridden with a different year: (title, kept, found)
    pub conflicts: Vec<(String, String, String)>,
}

/// Loaded override file plus the path it came from.
#[derive(Debug, Clone)]
pub struct OverrideStore {
    path: PathBuf,
    file: OverrideFile,
    /// Entries whose value is not a year; written back untouched on save
    unreadable: Map<String, Value>,
    /// Set when the file exists but could not be parsed; saving is refused
    load_error: Option<String>,
}

impl OverrideStore {
    /// Load overrides from `path`.
    ///
    /// A missing or unparseable file yields an empty store; this never fails.
    /// Entries whose value is not a year are skipped with a warning but kept
    /// for [`save`](Self::save). A store loaded from an unparseable file
    /// refuses to save, so the file is never clobbered.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut store = Self {
            path,
            file: OverrideFile::fresh(),
            unreadable: Map::new(),
            load_error: None,
        };
        match read_override_file(&store.path) {
            Ok(Some((file, unreadable))) => {
                info!(count = file.manual_dates.len(), path = ?store.path, "Loaded publication date overrides");
                store.file = file;
                store.unreadable = unreadable;
            }
            Ok(None) => {
                debug!(path = ?store.path, "Override file not found, starting empty");
            }
            Err(e) => {
                warn!(error = %e, "Override file unusable, starting empty");
                store.load_error = Some(e.to_string());
            }
        }
        store
    }

    /// In-memory store not backed by a readable file (tests, dry runs).
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut file = OverrideFile::fresh();
        file.manual_dates = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            path: PathBuf::from(DEFAULT_OVERRIDES_FILE),
            file,
            unreadable: Map::new(),
            load_error: None,
        }
    }

    /// Path the store saves to
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.file.manual_dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file.manual_dates.is_empty()
    }

    /// Year asserted for a (possibly badge-prefixed) title. Exact match only.
    pub fn get(&self, title: &str) -> Option<&str> {
        self.file
            .manual_dates
            .get(&override_key(title))
            .map(String::as_str)
    }

    /// Entries sorted newest year first, then by title.
    pub fn list(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<(&str, &str)> = self
            .file
            .manual_dates
            .iter()
            .map(|(t, y)| (t.as_str(), y.as_str()))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }

    /// Assert a year for `title`. Returns the year it replaced, if any.
    pub fn set(&mut self, title: &str, year: &str) -> Result<Option<String>> {
        let key = override_key(title);
        if key.is_empty() {
            return Err(PubfetchError::InvalidInput(
                "publication title must not be empty".to_string(),
            ));
        }
        validate_override_year(year, current_year())?;
        Ok(self.file.manual_dates.insert(key, year.to_string()))
    }

    /// Drop the override for `title`. Returns the removed year, if any.
    pub fn remove(&mut self, title: &str) -> Option<String> {
        let key = override_key(title);
        self.unreadable.remove(&key);
        self.file.manual_dates.remove(&key)
    }

    /// Add years found by citation extraction for titles without an override.
    ///
    /// Existing entries are never changed; disagreements are reported back.
    pub fn apply_extracted(&mut self, outcomes: &[CitationOutcome]) -> ApplySummary {
        let mut summary = ApplySummary::default();

        for outcome in outcomes {
            let Some(found) = outcome.extracted_year.as_deref() else {
                continue;
            };
            let key = override_key(&outcome.title);
            match self.file.manual_dates.get(&key) {
                None => {
                    info!(title = %key, year = found, "Adding extracted year");
                    self.file.manual_dates.insert(key.clone(), found.to_string());
                    summary.added.push((key, found.to_string()));
                }
                Some(kept) if kept != found => {
                    warn!(title = %key, kept = %kept, found = found, "Extracted year conflicts with override");
                    summary.conflicts.push((key, kept.clone(), found.to_string()));
                }
                Some(_) => {}
            }
        }

        self.file.last_extraction = Some(LastExtraction {
            date: Utc::now().to_rfc3339(),
            extracted_count: outcomes
                .iter()
                .filter(|o| o.extracted_year.is_some())
                .count(),
            total_processed: outcomes.len(),
            updated_count: summary.added.len(),
        });

        summary
    }

    /// Stamp of the last bulk extraction, if any
    pub fn last_extraction(&self) -> Option<&LastExtraction> {
        self.file.last_extraction.as_ref()
    }

    /// Write the store back as pretty JSON.
    ///
    /// Fails with [`PubfetchError::ConfigCorrupt`] when the store was loaded
    /// from a file that could not be parsed.
    pub fn save(&self) -> Result<()> {
        if let Some(reason) = &self.load_error {
            return Err(PubfetchError::ConfigCorrupt {
                path: self.path.clone(),
                reason: format!("refusing to overwrite unparseable file: {}", reason),
            });
        }

        let mut value = serde_json::to_value(&self.file)?;
        if let Some(dates) = value.get_mut("manualDates").and_then(Value::as_object_mut) {
            for (title, raw) in &self.unreadable {
                if !dates.contains_key(title) {
                    dates.insert(title.clone(), raw.clone());
                }
            }
        }
        let content = serde_json::to_string_pretty(&value)?;
        std::fs::write(&self.path, content)?;
        info!(count = self.len(), path = ?self.path, "Saved publication date overrides");
        Ok(())
    }
}

/// Parse the override file. `manualDates` is read leniently: string and
/// integer years are accepted, anything else is returned separately.
fn read_override_file(path: &Path) -> Result<Option<(OverrideFile, Map<String, Value>)>> {
    if !path.exists() {
        return Ok(None);
    }
    let corrupt = |reason: String| PubfetchError::ConfigCorrupt {
        path: path.to_path_buf(),
        reason,
    };

    let content = std::fs::read_to_string(path)?;
    let mut value: Value = serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;
    let Some(root) = value.as_object_mut() else {
        return Err(corrupt("top level is not an object".to_string()));
    };
    let raw_dates = match root.remove("manualDates") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(corrupt("manualDates is not an object".to_string())),
    };

    let mut file: OverrideFile = serde_json::from_value(value).map_err(|e| corrupt(e.to_string()))?;
    let mut unreadable = Map::new();
    for (title, raw) in raw_dates {
        match year_value(&raw) {
            Some(year) => {
                file.manual_dates.insert(title, year);
            }
            None => {
                warn!(title = %title, value = %raw, "Skipping override that is not a 4-digit year");
                unreadable.insert(title, raw);
            }
        }
    }
    Ok(Some((file, unreadable)))
}

/// A 4-digit year from a string or integer JSON value.
fn year_value(raw: &Value) -> Option<String> {
    let text = match raw {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.as_u64()?.to_string(),
        _ => return None,
    };
    parse_year(&text).map(|_| text)
}

/// Check an operator-supplied year: four digits, 1900 to current year + 5.
pub fn validate_override_year(year: &str, current_year: i32) -> Result<()> {
    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return Err(PubfetchError::InvalidInput(format!(
            "year must be a 4-digit number (e.g. 2024), got '{}'",
            year
        )));
    }
    let value: i32 = year
        .parse()
        .map_err(|_| PubfetchError::InvalidInput(format!("unparseable year '{}'", year)))?;
    let max = current_year + OVERRIDE_YEAR_SLACK;
    if !(MIN_OVERRIDE_YEAR..=max).contains(&value) {
        return Err(PubfetchError::InvalidInput(format!(
            "year must be between {} and {}, got {}",
            MIN_OVERRIDE_YEAR, max, value
        )));
    }
    Ok(())
}

fn default_instructions() -> Value {
    json!({
        "description": "Manual date overrides for publications when Google Scholar doesn't provide accurate dates",
        "usage": "Add entries in the format: 'Exact Publication Title': 'YYYY'",
        "note": "Titles must match exactly (after removing [HTML][HTML] prefixes)",
        "tip": "To find correct years: 1) Visit the publication DOI/URL, 2) Check journal website, 3) Look at your CV/records"
    })
}
