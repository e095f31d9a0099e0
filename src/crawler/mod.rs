//! Crawler module for region discovery and company enrichment
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching and failure classification
//! - Selector-based field extraction
//! - Region discovery, pagination tokens and batch fetching
//! - Company enrichment on a long-lived worker pool
//! - Overall run coordination

mod coordinator;
mod enricher;
mod fetcher;
mod parser;
mod pool;
mod regions;
mod retry;

pub use coordinator::{run_harvest, Coordinator};
pub use enricher::{CompanyEnricher, CompanyRecord, EnrichmentOutcome, RawCompany, Taxonomies, Term};
pub use fetcher::{FetchError, PageFetcher};
pub use parser::{compile_selector, select, select_first, Selectors};
pub use pool::EnrichmentPool;
pub use regions::{
    discover_regions, extract_pagination_token, fetch_batch, pair_regions, resolve_pagination,
    PaginationToken, Region,
};
pub use retry::RetryPolicy;

use crate::config::Config;
use crate::output::CrawlStatistics;
use crate::HarvestError;

/// Runs a complete harvest
///
/// This is the main entry point for a run. It will:
/// 1. Build the HTTP client and start the enrichment pool
/// 2. Discover regions on the landing page
/// 3. For each region, fetch its batch and enrich every company
/// 4. Append each region's records to the output file
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - The run finished; some regions may have failed
/// * `Err(HarvestError)` - Setup or region discovery failed
pub async fn crawl(config: Config) -> Result<CrawlStatistics, HarvestError> {
    run_harvest(config).await
}
