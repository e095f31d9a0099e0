use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Listing-Harvest
///
/// Every section and key is optional; a missing config file or an empty one
/// yields the built-in target site and output paths.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub selectors: SelectorConfig,
    pub crawler: CrawlerConfig,
    pub output: OutputConfig,
}

/// Target site endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Landing page, also the base for relative region and company links
    pub base_url: String,

    /// JSON activities endpoint
    pub api_url: String,

    /// Logical block key sent alongside the pagination token
    pub block_key: String,

    /// User agent presented to the site
    pub user_agent: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://iwilltravelagain.com".to_string(),
            api_url: "https://iwilltravelagain.com/wp-json/FH/activities".to_string(),
            block_key: "rows_2_grid_activities".to_string(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0"
                .to_string(),
        }
    }
}

/// CSS selectors for the landing, region and detail pages
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SelectorConfig {
    /// Region display names (text content)
    pub region_name: String,

    /// Region links (`href`), positionally aligned with `region_name`
    pub region_link: String,

    /// Element carrying the pagination token on a region page
    pub pagination_container: String,

    /// Attribute of the container holding the token
    pub pagination_attribute: String,

    /// Link to the company's own website on its detail page
    pub company_website: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            region_name: "div.inner.prose > h4".to_string(),
            region_link: "a.link.a-image-button".to_string(),
            pagination_container: "#activity-grid-1".to_string(),
            pagination_attribute: "data-post-id".to_string(),
            company_website: "div.button-block:nth-child(2) > a:nth-child(1)".to_string(),
        }
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Width of the enrichment worker pool
    pub workers: u32,

    /// Total enrichment attempts per company before it is dead-lettered
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds)
    pub initial_backoff_ms: u64,

    /// Upper bound on the retry delay (milliseconds)
    pub max_backoff_ms: u64,

    /// Timeout for landing, region and API requests (seconds)
    pub request_timeout_secs: u64,

    /// Timeout for company detail pages; unset means no ceiling
    pub detail_timeout_secs: Option<u64>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: 15,
            max_attempts: 8,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            request_timeout_secs: 60,
            detail_timeout_secs: None,
        }
    }
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn detail_timeout(&self) -> Option<Duration> {
        self.detail_timeout_secs.map(Duration::from_secs)
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Semicolon-separated file receiving company records
    pub records_path: String,

    /// Semicolon-separated file receiving companies that could not be enriched
    pub dead_letter_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            records_path: "data.csv".to_string(),
            dead_letter_path: "dead_letters.csv".to_string(),
        }
    }
}
