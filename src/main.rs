//! pubfetch - publication list builder
//!
//! Fetches an author's publications from Google Scholar and ORCID, settles
//! each one's year, and writes the merged list into the site config.
//!
//! ## Usage
//!
//! ```bash
//! pubfetch update --dry-run
//! pubfetch dates set "Exact Title" 2023
//! pubfetch verify --commands
//! pubfetch extract --test
//! ```

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use pubfetch::citation::{CitationExtractor, ExtractionSource};
use pubfetch::config::Config;
use pubfetch::gscholar::ScholarSource;
use pubfetch::overrides::OverrideStore;
use pubfetch::report::{self, VerificationEntry};
use pubfetch::source::PublicationSource;
use pubfetch::year::{current_year, ResolveContext};
use pubfetch::{pipeline, site, Publication};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Publication list builder for a personal site
#[derive(Parser)]
#[command(name = "pubfetch")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (default: pubfetch.toml over the platform config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage manual publication year overrides
    Dates {
        #[command(subcommand)]
        action: DatesAction,
    },

    /// Write a checklist for verifying publication years by hand
    Verify {
        /// Also print copy-paste override commands
        #[arg(long)]
        commands: bool,
    },

    /// Extract years from Scholar citation pages
    Extract {
        /// Only process the first two publications
        #[arg(long)]
        test: bool,

        /// Add extracted years to the override file
        #[arg(long)]
        update: bool,
    },

    /// Fetch publications and rewrite the site config
    Update {
        /// Show what would be written without touching the site config
        #[arg(long)]
        dry_run: bool,

        /// Only fetch publications from this year onwards
        #[arg(long)]
        year: Option<i32>,

        /// Also export the merged list (.json or .csv)
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum DatesAction {
    /// Set the year for a publication title
    Set {
        /// Exact publication title
        title: String,
        /// Four-digit year
        year: String,
    },
    /// List all overrides
    List,
    /// Remove the override for a title
    Remove {
        /// Exact publication title
        title: String,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if cli.json_logs {
        fmt().json().with_env_filter(filter).with_target(true).init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .init();
    }

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Dates { action } => handle_dates(&config, action),
        Commands::Verify { commands } => run_verify(&config, commands).await,
        Commands::Extract { test, update } => run_extract(&config, test, update).await,
        Commands::Update {
            dry_run,
            year,
            export,
        } => run_update(config.with_year_low(year), dry_run, export.as_deref()).await,
    }
}

// ============================================================================
// Override Management
// ============================================================================

fn handle_dates(config: &Config, action: DatesAction) -> Result<()> {
    let mut store = OverrideStore::load(config.overrides_path.clone());

    match action {
        DatesAction::Set { title, year } => {
            let previous = store.set(&title, &year)?;
            store.save().context("Failed to save overrides")?;
            match previous {
                Some(old) if old != year => println!("Updated \"{}\": {} -> {}", title, old, year),
                _ => println!("Set \"{}\" -> {}", title, year),
            }
        }
        DatesAction::List => {
            if store.is_empty() {
                println!("No manual dates set.");
            } else {
                println!("Manual publication dates ({}):", store.len());
                for (title, year) in store.list() {
                    println!("  {}  {}", year, title);
                }
            }
            if let Some(last) = store.last_extraction() {
                println!(
                    "\nLast extraction: {} ({} of {} extracted, {} added)",
                    last.date, last.extracted_count, last.total_processed, last.updated_count
                );
            }
        }
        DatesAction::Remove { title } => match store.remove(&title) {
            Some(year) => {
                store.save().context("Failed to save overrides")?;
                println!("Removed \"{}\" ({})", title, year);
            }
            None => println!("No override found for \"{}\"", title),
        },
    }

    Ok(())
}

// ============================================================================
// Full Pipeline
// ============================================================================

async fn fetch_all(config: &Config, store: &OverrideStore) -> Result<Vec<Publication>> {
    config.validate_for_fetch()?;

    let ctx = ResolveContext::new(store).with_sentinel(config.sentinel_year.as_deref());
    let sources = pipeline::build_sources(config, ctx.current_year)?;

    println!("\n--- Fetching publications (from {}) ---", config.year_low);
    let output = pipeline::fetch_publications(&sources, &config.author_name, &ctx, config.merge_policy).await;

    for source in &output.sources {
        match &source.error {
            Some(e) => println!("  {}: failed ({})", source.name, e),
            None => println!("  {}: {} records", source.name, source.fetched),
        }
    }
    println!("Total unique publications: {}", output.publications.len());

    Ok(output.publications)
}

async fn run_update(config: Config, dry_run: bool, export: Option<&Path>) -> Result<()> {
    let store = OverrideStore::load(config.overrides_path.clone());
    let publications = fetch_all(&config, &store).await?;

    if publications.is_empty() {
        bail!("No publications found, site config left unchanged");
    }

    if let Some(path) = export {
        export_publications(path, &publications)?;
    }

    if dry_run {
        println!("\n--- Dry run: would write {} publications ---", publications.len());
        for (index, publication) in publications.iter().enumerate() {
            println!(
                "{}. {} ({}) - {}",
                index + 1,
                publication.title,
                publication.year,
                publication.journal
            );
        }
        return Ok(());
    }

    site::update_site_config(&config.site_config_path, &publications)
        .with_context(|| format!("Failed to update {}", config.site_config_path.display()))?;

    println!("\n--- Updated {} ---", config.site_config_path.display());
    for (index, publication) in publications.iter().enumerate() {
        println!("{}. {} ({})", index + 1, publication.title, publication.year);
    }
    Ok(())
}

// ============================================================================
// Verification Report
// ============================================================================

async fn run_verify(config: &Config, commands: bool) -> Result<()> {
    let store = OverrideStore::load(config.overrides_path.clone());
    let publications = fetch_all(config, &store).await?;

    if publications.is_empty() {
        bail!("No publications found to verify");
    }

    let year = current_year();
    let entries: Vec<VerificationEntry> = publications
        .iter()
        .map(|p| VerificationEntry::from_publication(p, year))
        .collect();

    let text = report::render_report(&entries, &Utc::now().to_rfc3339());
    report::write_report(&config.report_path, &text)
        .with_context(|| format!("Failed to write {}", config.report_path.display()))?;

    println!("\nReport written to {}", config.report_path.display());
    println!("{} publications to verify", entries.len());
    let with_hints = entries.iter().filter(|e| !e.url_hints.is_empty()).count();
    println!("{} have year hints in their URL", with_hints);

    if commands {
        println!("\n--- Update commands ---\n");
        print!("{}", report::update_commands(&entries));
    }
    Ok(())
}

// ============================================================================
// Citation Extraction
// ============================================================================

async fn run_extract(config: &Config, test: bool, update: bool) -> Result<()> {
    if config.author_name.is_empty() {
        bail!("Author name is not configured (set [author] name)");
    }

    let year = current_year();
    let scholar = ScholarSource::new(config.author_name.clone(), config.scholar_options(year));

    println!("\n--- Fetching Google Scholar records ---");
    let mut records = scholar.fetch().await.context("Google Scholar fetch failed")?;
    if records.is_empty() {
        bail!("No publications found");
    }
    if test {
        records.truncate(2);
        println!("Test mode: processing {} publications", records.len());
    }

    let extractor = CitationExtractor::new(
        config.proxy.as_deref(),
        config.request_timeout,
        config.record_delay,
        year,
    )?;

    println!("\n--- Extracting citation years ---");
    let outcomes = extractor.extract_all(&records).await;

    for (index, outcome) in outcomes.iter().enumerate() {
        let found = outcome.extracted_year.as_deref().unwrap_or("-");
        println!("{}. {} => {} [{}]", index + 1, outcome.title, found, outcome.source);
    }
    let extracted = outcomes.iter().filter(|o| o.extracted_year.is_some()).count();
    let failed = outcomes
        .iter()
        .filter(|o| o.source == ExtractionSource::Error)
        .count();
    println!(
        "\nExtracted {} of {} years ({} failed)",
        extracted,
        outcomes.len(),
        failed
    );

    if !update {
        println!("Run with --update to add these years to {}", config.overrides_path.display());
        return Ok(());
    }

    let mut store = OverrideStore::load(config.overrides_path.clone());
    let summary = store.apply_extracted(&outcomes);
    store.save().context("Failed to save overrides")?;

    println!("\nAdded {} overrides", summary.added.len());
    for (title, kept, found) in &summary.conflicts {
        warn!(title = %title, kept = %kept, found = %found, "Kept existing override");
    }
    if !summary.conflicts.is_empty() {
        println!("{} conflicts kept their existing year", summary.conflicts.len());
    }
    if !summary.added.is_empty() {
        println!("Next: pubfetch update");
    }
    Ok(())
}

// ============================================================================
// Export
// ============================================================================

/// Flat CSV row; every column present on every line.
#[derive(Serialize)]
struct ExportRow<'a> {
    title: &'a str,
    authors: &'a str,
    journal: &'a str,
    year: &'a str,
    volume: Option<&'a str>,
    pages: Option<&'a str>,
    doi: Option<&'a str>,
    link: Option<&'a str>,
    citation_count: u64,
}

impl<'a> From<&'a Publication> for ExportRow<'a> {
    fn from(p: &'a Publication) -> Self {
        Self {
            title: &p.title,
            authors: &p.authors,
            journal: &p.journal,
            year: &p.year,
            volume: p.volume.as_deref(),
            pages: p.pages.as_deref(),
            doi: p.doi.as_deref(),
            link: p.link.as_deref(),
            citation_count: p.citation_count,
        }
    }
}

fn export_publications(path: &Path, publications: &[Publication]) -> Result<()> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    if is_csv {
        let rows: Vec<ExportRow<'_>> = publications.iter().map(ExportRow::from).collect();
        save_csv(path, &rows)
    } else {
        let json = serde_json::to_string_pretty(publications).context("Failed to serialize publications")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = ?path, "Exported publications");
        println!("Saved: {:?}", path);
        Ok(())
    }
}

/// Save data to CSV file
fn save_csv<T: Serialize>(path: &Path, data: &[T]) -> Result<()> {
    if data.is_empty() {
        println!("No data to save to {:?}", path);
        return Ok(());
    }

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context("Failed to create CSV writer")?;

    for item in data {
        wtr.serialize(item).context("Failed to write CSV record")?;
    }

    wtr.flush().context("Failed to flush CSV")?;
    println!("Saved: {:?}", path);
    Ok(())
}
