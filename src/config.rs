//! Configuration.
//!
//! An on-disk TOML file where every field is optional, cascaded from the
//! platform config directory under a working-directory `pubfetch.toml`, then
//! resolved once into an immutable [`Config`].

use crate::error::{PubfetchError, Result};
use crate::gscholar::QueryOptions;
use crate::merge::MergePolicy;
use crate::overrides::DEFAULT_OVERRIDES_FILE;
use crate::report::DEFAULT_REPORT_FILE;
use crate::site::DEFAULT_SITE_CONFIG;
use crate::year::DEFAULT_SENTINEL_YEAR;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Working-directory config file name
pub const LOCAL_CONFIG_FILE: &str = "pubfetch.toml";

const DEFAULT_YEAR_LOW: i32 = 2020;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RECORD_DELAY_SECS: u64 = 2;
const DEFAULT_SCHOLAR_PAGES: u32 = 1;

/// On-disk TOML configuration. All fields are optional so partial files work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub author: Option<AuthorConfig>,
    pub sources: Option<SourcesConfig>,
    pub years: Option<YearsConfig>,
    pub paths: Option<PathsConfig>,
    pub network: Option<NetworkConfig>,
    pub merge_policy: Option<MergePolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorConfig {
    pub name: Option<String>,
    pub orcid_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub orcid: Option<bool>,
    pub google_scholar: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YearsConfig {
    pub low: Option<i32>,
    pub high: Option<i32>,
    /// Known-bad placeholder year; an empty string disables the check
    pub sentinel: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    pub overrides: Option<PathBuf>,
    pub site_config: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub scholar_base_url: Option<String>,
    pub scholar_pages: Option<u32>,
    pub proxy: Option<String>,
    pub timeout_secs: Option<u64>,
    pub record_delay_secs: Option<u64>,
}

/// Platform config path: `<config_dir>/pubfetch/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pubfetch").join("config.toml"))
}

/// Cascade the working-directory file over the platform file.
/// Unreadable or malformed files are skipped with a warning.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_optional(&p));
    let cwd = load_optional(Path::new(LOCAL_CONFIG_FILE));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

fn load_optional(path: &Path) -> Option<ConfigFile> {
    if !path.exists() {
        return None;
    }
    match load_from_path(path) {
        Ok(file) => {
            debug!(path = ?path, "Loaded config file");
            Some(file)
        }
        Err(e) => {
            warn!(path = ?path, error = %e, "Ignoring unreadable config file");
            None
        }
    }
}

/// Load one config file. Errors when it is missing or malformed.
pub fn load_from_path(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

fn pick<T, S>(overlay: &Option<S>, base: &Option<S>, field: impl Fn(&S) -> Option<T>) -> Option<T> {
    overlay.as_ref().and_then(&field).or_else(|| base.as_ref().and_then(&field))
}

/// Merge two configs field by field: `overlay` wins over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        author: Some(AuthorConfig {
            name: pick(&overlay.author, &base.author, |a| a.name.clone()),
            orcid_id: pick(&overlay.author, &base.author, |a| a.orcid_id.clone()),
        }),
        sources: Some(SourcesConfig {
            orcid: pick(&overlay.sources, &base.sources, |s| s.orcid),
            google_scholar: pick(&overlay.sources, &base.sources, |s| s.google_scholar),
        }),
        years: Some(YearsConfig {
            low: pick(&overlay.years, &base.years, |y| y.low),
            high: pick(&overlay.years, &base.years, |y| y.high),
            sentinel: pick(&overlay.years, &base.years, |y| y.sentinel.clone()),
        }),
        paths: Some(PathsConfig {
            overrides: pick(&overlay.paths, &base.paths, |p| p.overrides.clone()),
            site_config: pick(&overlay.paths, &base.paths, |p| p.site_config.clone()),
            report: pick(&overlay.paths, &base.paths, |p| p.report.clone()),
        }),
        network: Some(NetworkConfig {
            scholar_base_url: pick(&overlay.network, &base.network, |n| n.scholar_base_url.clone()),
            scholar_pages: pick(&overlay.network, &base.network, |n| n.scholar_pages),
            proxy: pick(&overlay.network, &base.network, |n| n.proxy.clone()),
            timeout_secs: pick(&overlay.network, &base.network, |n| n.timeout_secs),
            record_delay_secs: pick(&overlay.network, &base.network, |n| n.record_delay_secs),
        }),
        merge_policy: overlay.merge_policy.or(base.merge_policy),
    }
}

/// Which sources a run queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceToggles {
    pub orcid: bool,
    pub google_scholar: bool,
}

/// Resolved configuration, built once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub author_name: String,
    pub orcid_id: Option<String>,
    pub sources: SourceToggles,
    pub year_low: i32,
    pub year_high: Option<i32>,
    pub sentinel_year: Option<String>,
    pub overrides_path: PathBuf,
    pub site_config_path: PathBuf,
    pub report_path: PathBuf,
    pub scholar_base_url: Option<String>,
    pub scholar_pages: u32,
    pub proxy: Option<String>,
    pub request_timeout: Duration,
    pub record_delay: Duration,
    pub merge_policy: MergePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_file(ConfigFile::default())
    }
}

impl Config {
    /// Resolve a config file, filling defaults for anything unset.
    pub fn from_file(file: ConfigFile) -> Self {
        let author = file.author.unwrap_or_default();
        let sources = file.sources.unwrap_or_default();
        let years = file.years.unwrap_or_default();
        let paths = file.paths.unwrap_or_default();
        let network = file.network.unwrap_or_default();

        let orcid_id = author.orcid_id.filter(|id| !id.trim().is_empty());
        let sentinel_year = match years.sentinel {
            Some(s) if s.trim().is_empty() => None,
            Some(s) => Some(s.trim().to_string()),
            None => Some(DEFAULT_SENTINEL_YEAR.to_string()),
        };

        Self {
            author_name: author.name.map(|n| n.trim().to_string()).unwrap_or_default(),
            sources: SourceToggles {
                orcid: sources.orcid.unwrap_or(orcid_id.is_some()),
                google_scholar: sources.google_scholar.unwrap_or(true),
            },
            orcid_id,
            year_low: years.low.unwrap_or(DEFAULT_YEAR_LOW),
            year_high: years.high,
            sentinel_year,
            overrides_path: paths.overrides.unwrap_or_else(|| PathBuf::from(DEFAULT_OVERRIDES_FILE)),
            site_config_path: paths.site_config.unwrap_or_else(|| PathBuf::from(DEFAULT_SITE_CONFIG)),
            report_path: paths.report.unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_FILE)),
            scholar_base_url: network.scholar_base_url,
            scholar_pages: network.scholar_pages.unwrap_or(DEFAULT_SCHOLAR_PAGES).max(1),
            proxy: network.proxy.filter(|p| !p.trim().is_empty()),
            request_timeout: Duration::from_secs(network.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            record_delay: Duration::from_secs(network.record_delay_secs.unwrap_or(DEFAULT_RECORD_DELAY_SECS)),
            merge_policy: file.merge_policy.unwrap_or_default(),
        }
    }

    /// Load from an explicit file, or from the cascade when none is given.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let file = match explicit {
            Some(path) => load_from_path(path)
                .map_err(|e| PubfetchError::Config(format!("{}: {}", path.display(), e)))?,
            None => load_config(),
        };
        Ok(Self::from_file(file))
    }

    /// Override the lower year bound, as `--year` does.
    pub fn with_year_low(mut self, year: Option<i32>) -> Self {
        if let Some(year) = year {
            self.year_low = year;
        }
        self
    }

    /// Check the settings a fetch needs.
    pub fn validate_for_fetch(&self) -> Result<()> {
        if !self.sources.orcid && !self.sources.google_scholar {
            return Err(PubfetchError::Config("no publication sources enabled".to_string()));
        }
        if self.sources.google_scholar && self.author_name.is_empty() {
            return Err(PubfetchError::Config(
                "author name is not configured (set [author] name)".to_string(),
            ));
        }
        if self.sources.orcid && self.orcid_id.is_none() {
            return Err(PubfetchError::Config(
                "ORCID source enabled without [author] orcid_id".to_string(),
            ));
        }
        if let Some(high) = self.year_high {
            if high < self.year_low {
                return Err(PubfetchError::Config(format!(
                    "year range is empty: {}..{}",
                    self.year_low, high
                )));
            }
        }
        Ok(())
    }

    /// Scholar query options for the configured window.
    ///
    /// The upper bound defaults to `current_year`.
    pub fn scholar_options(&self, current_year: i32) -> QueryOptions {
        QueryOptions {
            proxy: self.proxy.clone(),
            pages: (1..=self.scholar_pages as i32).collect(),
            ylo: Some(self.year_low),
            yhi: Some(self.year_high.unwrap_or(current_year)),
            base_url: self.scholar_base_url.clone(),
            timeout: self.request_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.year_low, 2020);
        assert_eq!(config.sentinel_year.as_deref(), Some("2025"));
        assert_eq!(config.overrides_path, PathBuf::from("publication-dates.json"));
        assert_eq!(config.site_config_path, PathBuf::from("src/config.ts"));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.record_delay, Duration::from_secs(2));
        assert_eq!(config.merge_policy, MergePolicy::FillGaps);
        assert!(config.sources.google_scholar);
        assert!(!config.sources.orcid);
    }

    #[test]
    fn test_parse_partial_file() -> Result<()> {
        let file: ConfigFile = toml::from_str(
            r#"
            merge_policy = "first-seen"

            [author]
            name = "Jonah Mack"
            orcid_id = "0000-0002-1825-0097"

            [years]
            sentinel = ""
            "#,
        )?;
        let config = Config::from_file(file);
        assert_eq!(config.author_name, "Jonah Mack");
        assert!(config.sources.orcid);
        assert_eq!(config.sentinel_year, None);
        assert_eq!(config.merge_policy, MergePolicy::FirstSeen);
        Ok(())
    }

    #[test]
    fn test_merge_overlay_wins() {
        let base = ConfigFile {
            author: Some(AuthorConfig {
                name: Some("Base".to_string()),
                orcid_id: Some("0000-0001".to_string()),
            }),
            years: Some(YearsConfig {
                low: Some(2018),
                ..Default::default()
            }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            author: Some(AuthorConfig {
                name: Some("Overlay".to_string()),
                orcid_id: None,
            }),
            ..Default::default()
        };
        let config = Config::from_file(merge(base, overlay));
        assert_eq!(config.author_name, "Overlay");
        assert_eq!(config.orcid_id.as_deref(), Some("0000-0001"));
        assert_eq!(config.year_low, 2018);
    }

    #[test]
    fn test_load_explicit_path() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[network]\nscholar_pages = 3\ntimeout_secs = 5\n")?;
        let config = Config::load(Some(&path))?.with_year_low(Some(2022));
        assert_eq!(config.scholar_pages, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.year_low, 2022);

        let options = config.scholar_options(2026);
        assert_eq!(options.pages, vec![1, 2, 3]);
        assert_eq!(options.ylo, Some(2022));
        assert_eq!(options.yhi, Some(2026));
        Ok(())
    }

    #[test]
    fn test_load_explicit_malformed() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[author\nname = ")?;
        assert!(matches!(Config::load(Some(&path)), Err(PubfetchError::Config(_))));
        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
        Ok(())
    }

    #[test]
    fn test_validate_for_fetch() {
        let mut config = Config::default();
        assert!(config.validate_for_fetch().is_err());
        config.author_name = "Jonah Mack".to_string();
        assert!(config.validate_for_fetch().is_ok());
        config.year_high = Some(2019);
        assert!(config.validate_for_fetch().is_err());
    }
}
