//! Fetch → normalize → merge.
//!
//! Sources are queried one after another. A failing source is logged and
//! contributes nothing; it never aborts the run.

use crate::config::Config;
use crate::error::Result;
use crate::gscholar::ScholarSource;
use crate::merge::{merge, MergePolicy};
use crate::normalize::{normalize_all, Publication};
use crate::orcid::OrcidClient;
use crate::record::RawRecord;
use crate::source::PublicationSource;
use crate::year::ResolveContext;
use tracing::{info, warn};

/// What one source contributed to a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    pub name: String,
    pub fetched: usize,
    /// Set when the source failed and contributed nothing
    pub error: Option<String>,
}

/// Result of a full pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    /// Merged, newest first
    pub publications: Vec<Publication>,
    pub sources: Vec<SourceReport>,
}

/// Build the configured sources, ORCID first so its records win merges.
pub fn build_sources(config: &Config, current_year: i32) -> Result<Vec<Box<dyn PublicationSource>>> {
    let mut sources: Vec<Box<dyn PublicationSource>> = Vec::new();

    if config.sources.orcid {
        if let Some(orcid_id) = config.orcid_id.as_deref() {
            sources.push(Box::new(OrcidClient::new(orcid_id, config.request_timeout)?));
        }
    }
    if config.sources.google_scholar {
        sources.push(Box::new(ScholarSource::new(
            config.author_name.clone(),
            config.scholar_options(current_year),
        )));
    }

    Ok(sources)
}

/// Fetch raw records from each source in order.
///
/// Returns one entry per source; a failed source yields an empty list.
pub async fn fetch_raw(sources: &[Box<dyn PublicationSource>]) -> (Vec<Vec<RawRecord>>, Vec<SourceReport>) {
    let mut lists = Vec::with_capacity(sources.len());
    let mut reports = Vec::with_capacity(sources.len());

    for source in sources {
        let name = source.name().to_string();
        match source.fetch().await {
            Ok(records) => {
                info!(source = %name, count = records.len(), "Source fetched");
                reports.push(SourceReport {
                    name,
                    fetched: records.len(),
                    error: None,
                });
                lists.push(records);
            }
            Err(e) => {
                warn!(source = %name, error = %e, "Source failed, continuing without it");
                reports.push(SourceReport {
                    name,
                    fetched: 0,
                    error: Some(e.to_string()),
                });
                lists.push(Vec::new());
            }
        }
    }

    (lists, reports)
}

/// Run every source, normalize each record and merge the lists.
pub async fn fetch_publications(
    sources: &[Box<dyn PublicationSource>],
    author_fallback: &str,
    ctx: &ResolveContext<'_>,
    policy: MergePolicy,
) -> PipelineOutput {
    let (lists, reports) = fetch_raw(sources).await;

    let normalized: Vec<Vec<Publication>> = lists
        .iter()
        .map(|records| normalize_all(records, author_fallback, ctx))
        .collect();
    let publications = merge(&normalized, policy);

    info!(count = publications.len(), "Total unique publications");
    PipelineOutput {
        publications,
        sources: reports,
    }
}
