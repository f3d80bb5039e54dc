//! ORCID public API source adapter.
//!
//! Lists an author's works, then fetches each work's detail record one at a
//! time. A work whose detail cannot be fetched is logged and skipped.

use crate::error::{PubfetchError, Result};
use crate::record::{AuthorEntry, AuthorField, RawRecord};
use crate::source::{FetchFuture, PublicationSource};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// ORCID public API base URL
const ORCID_API_URL: &str = "https://pub.orcid.org/v3.0";

/// Journal label ORCID works get when they name none
const UNKNOWN_JOURNAL: &str = "Unknown Journal";

/// Author label ORCID works get when they list no contributors
const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// ORCID API client
pub struct OrcidClient {
    client: reqwest::Client,
    orcid_id: String,
}

impl OrcidClient {
    /// Create a client for one ORCID iD. Accepts a bare iD or an
    /// `https://orcid.org/` URL.
    pub fn new(orcid_id: &str, timeout: Duration) -> Result<Self> {
        let orcid_id = clean_orcid_id(orcid_id);
        if orcid_id.is_empty() {
            return Err(PubfetchError::Config("ORCID iD is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("pubfetch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| PubfetchError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, orcid_id })
    }

    /// Fetch every work as a raw record.
    pub async fn fetch_works(&self) -> Result<Vec<RawRecord>> {
        info!(orcid = %self.orcid_id, "Fetching ORCID works");

        let url = format!("{}/{}/works", ORCID_API_URL, self.orcid_id);
        let works: OrcidWorks = self.get_json(&url).await?;

        let put_codes: Vec<u64> = works
            .group
            .iter()
            .flat_map(|g| g.work_summary.iter())
            .filter_map(|s| s.put_code)
            .collect();

        let mut records = Vec::with_capacity(put_codes.len());
        for put_code in put_codes {
            let url = format!("{}/{}/work/{}", ORCID_API_URL, self.orcid_id, put_code);
            match self.get_json::<OrcidWork>(&url).await {
                Ok(work) => records.push(work_to_record(work)),
                Err(e) => warn!(put_code, error = %e, "Failed to fetch ORCID work detail"),
            }
        }

        info!(count = records.len(), "ORCID fetch complete");
        Ok(records)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        debug!(url, "ORCID request");
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(PubfetchError::RateLimited(5));
        }
        if !status.is_success() {
            return Err(PubfetchError::Api {
                code: status.as_u16() as i32,
                message: format!("ORCID API error: {}", status),
            });
        }

        Ok(response.json().await?)
    }
}

impl PublicationSource for OrcidClient {
    fn name(&self) -> &str {
        "orcid"
    }

    fn fetch(&self) -> FetchFuture<'_> {
        Box::pin(self.fetch_works())
    }
}

/// Strip an `https://orcid.org/` prefix and whitespace.
pub fn clean_orcid_id(id: &str) -> String {
    let id = id.trim();
    id.strip_prefix("https://orcid.org/")
        .or_else(|| id.strip_prefix("http://orcid.org/"))
        .unwrap_or(id)
        .trim_matches('/')
        .to_string()
}

// === ORCID API Response Types ===

#[derive(Debug, Deserialize)]
struct OrcidWorks {
    #[serde(default)]
    group: Vec<OrcidGroup>,
}

#[derive(Debug, Deserialize)]
struct OrcidGroup {
    #[serde(rename = "work-summary", default)]
    work_summary: Vec<OrcidWorkSummary>,
}

#[derive(Debug, Deserialize)]
struct OrcidWorkSummary {
    #[serde(rename = "put-code")]
    put_code: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct OrcidWork {
    title: Option<OrcidTitle>,
    #[serde(rename = "journal-title")]
    journal_title: Option<OrcidValue>,
    #[serde(rename = "publication-date")]
    publication_date: Option<OrcidDate>,
    contributors: Option<OrcidContributors>,
    #[serde(rename = "external-ids")]
    external_ids: Option<OrcidExternalIds>,
    url: Option<OrcidValue>,
    #[serde(rename = "short-description")]
    short_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrcidTitle {
    title: Option<OrcidValue>,
}

#[derive(Debug, Deserialize)]
struct OrcidValue {
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrcidDate {
    year: Option<OrcidValue>,
    month: Option<OrcidValue>,
    day: Option<OrcidValue>,
}

#[derive(Debug, Deserialize)]
struct OrcidContributors {
    #[serde(default)]
    contributor: Vec<OrcidContributor>,
}

#[derive(Debug, Deserialize)]
struct OrcidContributor {
    #[serde(rename = "credit-name")]
    credit_name: Option<OrcidValue>,
}

#[derive(Debug, Deserialize)]
struct OrcidExternalIds {
    #[serde(rename = "external-id", default)]
    external_id: Vec<OrcidExternalId>,
}

#[derive(Debug, Deserialize)]
struct OrcidExternalId {
    #[serde(rename = "external-id-type")]
    id_type: Option<String>,
    #[serde(rename = "external-id-value")]
    id_value: Option<String>,
}

fn value_of(v: Option<OrcidValue>) -> Option<String> {
    v.and_then(|v| v.value)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse ORCID work detail into a raw record
fn work_to_record(work: OrcidWork) -> RawRecord {
    let names: Vec<AuthorEntry> = work
        .contributors
        .map(|c| c.contributor)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|c| value_of(c.credit_name))
        .map(AuthorEntry::Name)
        .collect();
    let authors = if names.is_empty() {
        AuthorField::Text(UNKNOWN_AUTHOR.to_string())
    } else {
        AuthorField::List(names)
    };

    let (year, date) = match work.publication_date {
        Some(d) => {
            let year = value_of(d.year);
            let date = year.as_ref().map(|y| {
                [Some(y.clone()), value_of(d.month), value_of(d.day)]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join("-")
            });
            (year, date)
        }
        None => (None, None),
    };

    let doi = work
        .external_ids
        .map(|e| e.external_id)
        .unwrap_or_default()
        .into_iter()
        .find(|id| id.id_type.as_deref().is_some_and(|t| t.eq_ignore_ascii_case("doi")))
        .and_then(|id| id.id_value)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let url = doi
        .as_ref()
        .map(|d| format!("https://doi.org/{}", d))
        .or_else(|| value_of(work.url));

    RawRecord {
        title: value_of(work.title.and_then(|t| t.title)),
        authors,
        journal: Some(value_of(work.journal_title).unwrap_or_else(|| UNKNOWN_JOURNAL.to_string())),
        year,
        date,
        description: work.short_description,
        url,
        doi,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_orcid_id() {
        assert_eq!(clean_orcid_id("https://orcid.org/0000-0002-1825-0097"), "0000-0002-1825-0097");
        assert_eq!(clean_orcid_id(" 0000-0002-1825-0097/ "), "0000-0002-1825-0097");
    }

    #[test]
    fn test_new_rejects_empty_id() {
        assert!(OrcidClient::new("https://orcid.org/", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_work_to_record_full() -> Result<()> {
        let work: OrcidWork = serde_json::from_str(
            r#"{
                "title": {"title": {"value": "Design of a sensor"}},
                "journal-title": {"value": "Engineering Research Express"},
                "publication-date": {"year": {"value": "2022"}, "month": {"value": "09"}, "day": null},
                "contributors": {"contributor": [
                    {"credit-name": {"value": "Jonah Mack"}},
                    {"credit-name": null},
                    {"credit-name": {"value": "Parvez Alam"}}
                ]},
                "external-ids": {"external-id": [
                    {"external-id-type": "eid", "external-id-value": "2-s2.0-1"},
                    {"external-id-type": "doi", "external-id-value": "10.1088/2631-8695/ac90ac"}
                ]}
            }"#,
        )?;
        let record = work_to_record(work);
        assert_eq!(record.title.as_deref(), Some("Design of a sensor"));
        assert_eq!(record.journal.as_deref(), Some("Engineering Research Express"));
        assert_eq!(record.year.as_deref(), Some("2022"));
        assert_eq!(record.date.as_deref(), Some("2022-09"));
        assert_eq!(
            record.authors,
            AuthorField::List(vec![
                AuthorEntry::Name("Jonah Mack".to_string()),
                AuthorEntry::Name("Parvez Alam".to_string()),
            ])
        );
        assert_eq!(record.doi.as_deref(), Some("10.1088/2631-8695/ac90ac"));
        assert_eq!(record.url.as_deref(), Some("https://doi.org/10.1088/2631-8695/ac90ac"));
        Ok(())
    }

    #[test]
    fn test_work_to_record_sparse() {
        let record = work_to_record(OrcidWork::default());
        assert!(record.title.is_none());
        assert!(record.year.is_none());
        assert_eq!(record.journal.as_deref(), Some(UNKNOWN_JOURNAL));
        assert_eq!(record.authors, AuthorField::Text(UNKNOWN_AUTHOR.to_string()));
        assert!(record.url.is_none());
    }

    #[test]
    fn test_works_summary_put_codes() -> Result<()> {
        let works: OrcidWorks = serde_json::from_str(
            r#"{"group": [
                {"work-summary": [{"put-code": 11}, {"put-code": 12}]},
                {"work-summary": [{"put-code": null}]}
            ]}"#,
        )?;
        let codes: Vec<u64> = works
            .group
            .iter()
            .flat_map(|g| g.work_summary.iter())
            .filter_map(|s| s.put_code)
            .collect();
        assert_eq!(codes, vec![11, 12]);
        Ok(())
    }
}
