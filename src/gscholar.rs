//! Google Scholar source adapter.
//!
//! Runs an `author:"<name>"` search over plain HTTP and turns each result
//! block into a [`RawRecord`]. Result titles keep Scholar's `[PDF][PDF]`
//! style badges; cleaning them is the normalizer's job.

use crate::error::{PubfetchError, Result};
use crate::record::{AuthorField, RawRecord, SourceField};
use crate::source::{FetchFuture, PublicationSource};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

/// Default Google Scholar URL
pub const DEFAULT_SCHOLAR_URL: &str = "https://scholar.google.com";

/// User agent string for requests
pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

static BYLINE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19|20)[0-9]{2}\b").expect("valid year regex"));
// Support both English ("Cited by X") and Chinese ("被引用 X 次") formats
static CITED_BY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:Cited by\s*|被引用\s*)([0-9]+)").expect("valid cited-by regex"));

/// Query options for Google Scholar search
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Proxy URL (e.g., "http://127.0.0.1:7890")
    pub proxy: Option<String>,
    /// Page numbers to fetch (1-indexed)
    pub pages: Vec<i32>,
    /// Results from this year onwards
    pub ylo: Option<i32>,
    /// Results up to this year
    pub yhi: Option<i32>,
    /// Custom base URL for mirror sites
    pub base_url: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            proxy: None,
            pages: vec![1],
            ylo: None,
            yhi: None,
            base_url: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl QueryOptions {
    fn scholar_url(&self) -> String {
        self.base_url
            .as_ref()
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_SCHOLAR_URL.to_string())
    }
}

/// Scholar search for one author's publications.
pub struct ScholarSource {
    author: String,
    options: QueryOptions,
}

impl ScholarSource {
    pub fn new(author: impl Into<String>, options: QueryOptions) -> Self {
        Self {
            author: author.into(),
            options,
        }
    }
}

impl PublicationSource for ScholarSource {
    fn name(&self) -> &str {
        "google-scholar"
    }

    fn fetch(&self) -> FetchFuture<'_> {
        Box::pin(async move { query(&author_query(&self.author), &self.options).await })
    }
}

/// Search string restricting results to one author.
pub fn author_query(author: &str) -> String {
    format!("author:\"{}\"", author.trim())
}

/// Query Google Scholar and return raw records.
///
/// A page that fails to download is logged and skipped; a CAPTCHA aborts
/// the whole query since every later page would hit it too.
pub async fn query(search_str: &str, options: &QueryOptions) -> Result<Vec<RawRecord>> {
    let scholar_url = options.scholar_url();

    info!(
        query = search_str,
        url = %scholar_url,
        pages = ?options.pages,
        "Starting Google Scholar query"
    );

    let client = build_http_client(options.proxy.as_deref(), options.timeout)?;
    let mut all_results = Vec::new();

    for page_num in &options.pages {
        let start = (page_num - 1) * 10;
        let url = build_search_url(&scholar_url, search_str, start, options.ylo, options.yhi)?;

        debug!(page = page_num, url = %url, "Fetching page");

        // Add random delay to avoid detection
        let delay = rand::random::<u64>() % 1500 + 500;
        tokio::time::sleep(Duration::from_millis(delay)).await;

        match fetch_page(&client, &url).await {
            Ok(html) => {
                if html.contains("Solving the above CAPTCHA") || html.contains("unusual traffic") {
                    warn!(page = page_num, "CAPTCHA detected");
                    return Err(PubfetchError::Captcha);
                }

                let page_results = parse_result_items(&html, &scholar_url)?;
                info!(page = page_num, count = page_results.len(), "Parsed results");

                if page_results.is_empty() {
                    debug!(page = page_num, "No results on page, stopping");
                    break;
                }
                all_results.extend(page_results);
            }
            Err(e) => {
                error!(page = page_num, error = %e, "Failed to fetch page");
            }
        }
    }

    info!(total = all_results.len(), "Query complete");
    Ok(all_results)
}

/// Build HTTP client with optional proxy
pub(crate) fn build_http_client(proxy: Option<&str>, timeout: Duration) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .cookie_store(true);

    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
            PubfetchError::Config(format!("Invalid proxy URL '{}': {}", proxy_url, e))
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| PubfetchError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Build Google Scholar search URL
fn build_search_url(
    base_url: &str,
    query: &str,
    start: i32,
    ylo: Option<i32>,
    yhi: Option<i32>,
) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/scholar", base_url))
        .map_err(|e| PubfetchError::Config(format!("Invalid base URL: {}", e)))?;

    {
        let mut params = url.query_pairs_mut();
        params.append_pair("q", query);
        params.append_pair("hl", "en"); // Force English locale for consistent parsing
        params.append_pair("start", &start.to_string());
        if let Some(year) = ylo {
            params.append_pair("as_ylo", &year.to_string());
        }
        if let Some(year) = yhi {
            params.append_pair("as_yhi", &year.to_string());
        }
    }

    Ok(url)
}

/// Fetch page content, mapping 429 and other failures to typed errors
pub(crate) async fn fetch_page(client: &reqwest::Client, url: &Url) -> Result<String> {
    let response = client
        .get(url.as_str())
        .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
        .header("Accept-Language", "en-US,en;q=0.9")
        .header("Cache-Control", "no-cache")
        .send()
        .await?;

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(PubfetchError::RateLimited(60));
    }

    if !status.is_success() {
        return Err(PubfetchError::Api {
            code: status.as_u16() as i32,
            message: format!("HTTP error: {}", status),
        });
    }

    response.text().await.map_err(PubfetchError::Network)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| PubfetchError::Parse(e.to_string()))
}

fn element_text(elem: ElementRef<'_>) -> String {
    elem.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse Google Scholar result HTML into raw records.
///
/// `base_url` resolves the relative cite and cited-by links.
pub fn parse_result_items(html: &str, base_url: &str) -> Result<Vec<RawRecord>> {
    let document = Html::parse_document(html);
    let base = Url::parse(base_url)
        .map_err(|e| PubfetchError::Config(format!("Invalid base URL: {}", e)))?;

    let item_selector = selector("div.gs_r.gs_or.gs_scl")?;
    let title_selector = selector("h3.gs_rt")?;
    let link_selector = selector("h3.gs_rt a")?;
    let side_link_selector = selector("div.gs_or_ggsm a")?;
    let meta_selector = selector("div.gs_a")?;
    let snippet_selector = selector("div.gs_rs")?;
    let footer_link_selector = selector("div.gs_fl a")?;

    let mut results = Vec::new();

    for item in document.select(&item_selector) {
        let mut record = RawRecord::default();

        if let Some(title_elem) = item.select(&title_selector).next() {
            record.title = Some(element_text(title_elem)).filter(|t| !t.is_empty());
        }
        if let Some(link) = item.select(&link_selector).next() {
            record.url = link.value().attr("href").map(str::to_string);
        }
        if let Some(side) = item.select(&side_link_selector).next() {
            record.source = SourceField::Link {
                url: side.value().attr("href").map(str::to_string),
                journal: None,
            };
        }

        // "J Mack, P Alam - Biomimetics, 2024 - mdpi.com"
        if let Some(meta_elem) = item.select(&meta_selector).next() {
            let meta_text = element_text(meta_elem);
            let parts: Vec<&str> = meta_text.split(" - ").collect();

            if let Some(authors) = parts.first() {
                let authors = authors.trim().trim_end_matches('…').trim();
                if !authors.is_empty() {
                    record.authors = AuthorField::Text(authors.to_string());
                }
            }

            if let Some(venue_year) = parts.get(1) {
                if let Some(year_match) = BYLINE_YEAR.find(venue_year) {
                    record.year = Some(year_match.as_str().to_string());
                    let venue = venue_year[..year_match.start()].trim().trim_end_matches(',');
                    record.venue = Some(venue.trim().to_string()).filter(|v| !v.is_empty());
                } else {
                    record.venue = Some(venue_year.trim().to_string()).filter(|v| !v.is_empty());
                }
            }
        }

        if let Some(snippet_elem) = item.select(&snippet_selector).next() {
            record.description = Some(element_text(snippet_elem)).filter(|s| !s.is_empty());
        }

        let mut cited_by_url = None;
        for link in item.select(&footer_link_selector) {
            let href = link.value().attr("href").unwrap_or("");
            if href.contains("cites=") {
                if let Some(count) = CITED_BY
                    .captures(&element_text(link))
                    .and_then(|caps| caps.get(1))
                {
                    record.citation_count = count.as_str().parse().ok();
                }
                cited_by_url = base.join(href).ok().map(String::from);
                break;
            }
        }

        // The "Cite" popup is keyed by the result's cluster id
        record.citation_url = item
            .value()
            .attr("data-cid")
            .and_then(|cid| cite_popup_url(&base, cid))
            .or(cited_by_url);

        if record.title.is_some() {
            results.push(record);
        }
    }

    Ok(results)
}

/// URL of the formatted-citation popup for a result cluster.
fn cite_popup_url(base: &Url, cid: &str) -> Option<String> {
    let mut url = base.join("/scholar").ok()?;
    url.query_pairs_mut()
        .append_pair("q", &format!("info:{}:scholar.google.com/", cid))
        .append_pair("output", "cite")
        .append_pair("hl", "en");
    Some(url.into())
}
