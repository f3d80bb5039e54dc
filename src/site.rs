//! Site configuration patching.
//!
//! The site keeps its publication list as a TypeScript array literal in
//! `config.ts`, directly ahead of the `projects:` key. Only that array is
//! rewritten; the rest of the file is left byte-for-byte alone.

use crate::error::{PubfetchError, Result};
use crate::normalize::Publication;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::Path;
use tracing::info;

/// Default location of the site config
pub const DEFAULT_SITE_CONFIG: &str = "src/config.ts";

static PUBLICATIONS_ARRAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)publications:\s*\[.*?\],(\s*projects:)").expect("valid publications array regex")
});

/// Render publications as a TypeScript array literal.
pub fn render_publications(publications: &[Publication]) -> String {
    let objects: Vec<String> = publications
        .iter()
        .map(|publication| {
            let mut fields = vec![
                ts_field("title", &publication.title),
                ts_field("authors", &publication.authors),
                ts_field("journal", &publication.journal),
                ts_field("year", &publication.year),
            ];
            let optional = [
                ("volume", &publication.volume),
                ("pages", &publication.pages),
                ("doi", &publication.doi),
                ("link", &publication.link),
            ];
            for (key, value) in optional {
                if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                    fields.push(ts_field(key, value));
                }
            }
            format!("    {{\n{}\n    }}", fields.join("\n"))
        })
        .collect();

    format!("[\n{},\n  ]", objects.join(",\n"))
}

fn ts_field(key: &str, value: &str) -> String {
    // serde_json string escaping is valid TypeScript
    let quoted = serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string());
    format!("      {}: {},", key, quoted)
}

/// Replace the publications array in `source`.
///
/// Fails with [`PubfetchError::ConfigCorrupt`] when no `publications: [...]`
/// array precedes `projects:`.
pub fn patch_site_config(source: &str, publications: &[Publication], path: &Path) -> Result<String> {
    if !PUBLICATIONS_ARRAY.is_match(source) {
        return Err(PubfetchError::ConfigCorrupt {
            path: path.to_path_buf(),
            reason: "could not find a publications array ahead of projects".to_string(),
        });
    }

    let array = render_publications(publications);
    let patched = PUBLICATIONS_ARRAY.replacen(source, 1, |caps: &Captures<'_>| {
        format!("publications: {},{}", array, &caps[1])
    });
    Ok(patched.into_owned())
}

/// Read, patch and write the site config in place.
pub fn update_site_config(path: &Path, publications: &[Publication]) -> Result<()> {
    let source = std::fs::read_to_string(path).map_err(|e| PubfetchError::ConfigCorrupt {
        path: path.to_path_buf(),
        reason: format!("unreadable: {}", e),
    })?;
    let patched = patch_site_config(&source, publications, path)?;
    std::fs::write(path, patched)?;
    info!(path = ?path, count = publications.len(), "Site config updated");
    Ok(())
}
