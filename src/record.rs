//! Raw, source-specific bibliographic records.
//!
//! Source adapters hand back records whose shape depends on who produced
//! them: authors may be a list of names, a list of `{ name }` objects, a
//! single string or a key/value map; the "source" hint may be an object with
//! a URL or a bare string. All of that ambiguity is captured here as tagged
//! unions and resolved once, in [`crate::normalize`].

use serde_json::Value;

/// Shape of the author field as it arrived from the source.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthorField {
    /// Ordered list of entries
    List(Vec<AuthorEntry>),
    /// Single pre-formatted string
    Text(String),
    /// Unordered key/value structure, values are names
    Map(Vec<String>),
    /// Missing or a shape we do not understand
    #[default]
    Unrecognized,
}

/// One entry of an ordered author list.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthorEntry {
    Name(String),
    Object { name: Option<String> },
}

/// Shape of the "source" hint attached to some Scholar results.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SourceField {
    /// Object carrying a link and sometimes a journal hint
    Link {
        url: Option<String>,
        journal: Option<String>,
    },
    /// Bare string, used verbatim as a venue label
    Text(String),
    #[default]
    Unrecognized,
}

impl SourceField {
    /// URL of the secondary source, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            SourceField::Link { url, .. } => url.as_deref(),
            _ => None,
        }
    }
}

/// A raw record from one source adapter. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub title: Option<String>,
    pub authors: AuthorField,
    pub venue: Option<String>,
    pub journal: Option<String>,
    pub publication: Option<String>,
    pub source: SourceField,
    pub year: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
    /// Primary URL of the work
    pub url: Option<String>,
    /// Scholar citation / cited-by link
    pub citation_url: Option<String>,
    pub volume: Option<String>,
    pub pages: Option<String>,
    pub doi: Option<String>,
    pub citation_count: Option<u64>,
}

impl RawRecord {
    /// Build a record from untyped JSON, checking each field before use.
    ///
    /// Anything that is not an object yields an empty record, which the
    /// normalizer still turns into an `"Untitled"` publication.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let citation_url = obj
            .get("citation")
            .and_then(|c| c.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| text_field(value, "citationUrl"));

        Self {
            title: text_field(value, "title"),
            authors: obj.get("authors").map(parse_authors).unwrap_or_default(),
            venue: text_field(value, "venue"),
            journal: text_field(value, "journal"),
            publication: text_field(value, "publication"),
            source: obj.get("source").map(parse_source).unwrap_or_default(),
            year: text_field(value, "year"),
            date: text_field(value, "date"),
            description: text_field(value, "description"),
            url: text_field(value, "url"),
            citation_url,
            volume: text_field(value, "volume"),
            pages: text_field(value, "pages"),
            doi: text_field(value, "doi"),
            citation_count: obj.get("citationCount").and_then(|c| match c {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            }),
        }
    }

    /// Title as scraped, before tag stripping.
    pub fn raw_title(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }
}

/// Read a field as text. Numbers are stringified; empty strings count as absent.
fn text_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_authors(value: &Value) -> AuthorField {
    match value {
        Value::Array(items) => AuthorField::List(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => AuthorEntry::Name(s.clone()),
                    Value::Object(o) => AuthorEntry::Object {
                        name: o.get("name").and_then(Value::as_str).map(str::to_string),
                    },
                    other => AuthorEntry::Name(other.to_string()),
                })
                .collect(),
        ),
        Value::String(s) => AuthorField::Text(s.clone()),
        Value::Object(o) => AuthorField::Map(
            o.values()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect(),
        ),
        _ => AuthorField::Unrecognized,
    }
}

fn parse_source(value: &Value) -> SourceField {
    match value {
        Value::Object(o) => SourceField::Link {
            url: o.get("url").and_then(Value::as_str).map(str::to_string),
            journal: o.get("journal").and_then(Value::as_str).map(str::to_string),
        },
        Value::String(s) => SourceField::Text(s.clone()),
        _ => SourceField::Unrecognized,
    }
}
