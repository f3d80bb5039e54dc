//! Custom error types for pubfetch.
//!
//! Every fallible library function returns `Result<T, PubfetchError>`.
//! Most of these are recovered close to where they happen (a failing source
//! becomes an empty contribution, a broken override file becomes an empty
//! store); only the binary decides what is fatal.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for pubfetch operations.
#[derive(Debug, Error)]
pub enum PubfetchError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// HTML or payload parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by external service
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// External API returned a non-success status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: i32,
        /// Error message
        message: String,
    },

    /// Google Scholar served a CAPTCHA instead of results
    #[error("CAPTCHA detected, slow down or use a proxy")]
    Captcha,

    /// A whole publication source could not be fetched
    #[error("Source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// The override file or the site configuration could not be read or parsed
    #[error("Corrupt config at {path:?}: {reason}")]
    ConfigCorrupt { path: PathBuf, reason: String },

    /// Operator supplied malformed input (bad year, missing title)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config deserialization error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using `PubfetchError`
pub type Result<T> = std::result::Result<T, PubfetchError>;
