//! Listing-Harvest: a regional business-listing extractor
//!
//! This crate discovers the regions of a listings site, pulls each region's
//! company batch from the site's JSON activities endpoint, resolves every
//! company's external website from its detail page, and appends the finished
//! records to a semicolon-separated file.

pub mod config;
pub mod crawler;
pub mod output;

use thiserror::Error;

/// Main error type for Listing-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("Landing page yielded {names} region names but {links} region links")]
    RegionMismatch { names: usize, links: usize },

    #[error("No pagination token found on {url}")]
    MissingPaginationToken { url: String },

    #[error("Expected a JSON array of companies from {url}")]
    UnexpectedBatchShape { url: String },

    #[error("Enrichment pool has shut down")]
    PoolClosed,

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Region {region}: saved {dead_letters} dead letters but failed to write {records} records: {source}")]
    RegionPersist {
        region: String,
        dead_letters: usize,
        records: usize,
        #[source]
        source: output::OutputError,
    },
}

impl HarvestError {
    /// Whether results could not be persisted, which stops the whole run
    pub fn is_output_failure(&self) -> bool {
        matches!(self, Self::Output(_) | Self::RegionPersist { .. })
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Listing-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CompanyRecord, Coordinator, RawCompany, Region};
pub use output::CrawlStatistics;
