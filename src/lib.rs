//! # pubfetch
//!
//! Builds a researcher's publication list from Google Scholar and ORCID and
//! writes it into a static site's config.
//!
//! ## Modules
//!
//! - [`source`] - The `PublicationSource` trait the pipeline talks to
//! - [`gscholar`] - Google Scholar author search
//! - [`orcid`] - ORCID public API client
//! - [`record`] - Raw records as the sources hand them over
//! - [`overrides`] - Operator-maintained title → year file
//! - [`year`] - The year resolution cascade
//! - [`normalize`] - Raw record → canonical `Publication`
//! - [`merge`] - Cross-source deduplication
//! - [`pipeline`] - Fetch, normalize and merge in one call
//! - [`citation`] - Year extraction from citation popups and article pages
//! - [`report`] - Manual verification report
//! - [`site`] - Site config patching
//! - [`config`] - TOML configuration
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pubfetch::{config::Config, overrides::OverrideStore, pipeline, year::ResolveContext};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let store = OverrideStore::load(&config.overrides_path);
//!     let ctx = ResolveContext::new(&store).with_sentinel(config.sentinel_year.as_deref());
//!     let sources = pipeline::build_sources(&config, ctx.current_year)?;
//!     let output = pipeline::fetch_publications(&sources, &config.author_name, &ctx, config.merge_policy).await;
//!     println!("Found {} publications", output.publications.len());
//!     Ok(())
//! }
//! ```

pub mod citation;
pub mod config;
pub mod doi;
pub mod error;
pub mod gscholar;
pub mod merge;
pub mod normalize;
pub mod orcid;
pub mod overrides;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod site;
pub mod source;
pub mod title;
pub mod year;

pub use error::{PubfetchError, Result};
pub use normalize::Publication;
pub use record::RawRecord;
