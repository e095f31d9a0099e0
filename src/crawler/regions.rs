//! Region discovery, pagination token resolution and batch fetching
//!
//! These are the three per-region lookups that precede enrichment:
//! the landing page lists the regions, each region page carries the token
//! the activities endpoint needs, and the endpoint returns the whole region
//! listing in one JSON array.

use crate::crawler::enricher::RawCompany;
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::parser::{select, select_first, Selectors};
use crate::HarvestError;
use std::fmt;
use std::time::Duration;
use url::Url;

/// A named partition of the site's listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub link: Url,
}

/// Opaque token the activities endpoint needs to list one region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationToken(String);

impl PaginationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaginationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fetches the landing page and lists its regions
///
/// Names and links come from two selectors and are paired by position.
///
/// # Errors
///
/// * `HarvestError::Fetch` - The landing page could not be fetched
/// * `HarvestError::RegionMismatch` - The two selectors matched a different
///   number of elements
pub async fn discover_regions(
    fetcher: &PageFetcher,
    base_url: &Url,
    selectors: &Selectors,
    timeout: Duration,
) -> Result<Vec<Region>, HarvestError> {
    let page = fetcher.get_text(base_url, &[], Some(timeout)).await?;

    let names = select(&page, &selectors.region_name, None);
    let links = select(&page, &selectors.region_link, Some("href"));

    pair_regions(base_url, names, links)
}

/// Zips region names with their links, resolving links against `base_url`
pub fn pair_regions(
    base_url: &Url,
    names: Vec<String>,
    links: Vec<String>,
) -> Result<Vec<Region>, HarvestError> {
    if names.len() != links.len() {
        return Err(HarvestError::RegionMismatch {
            names: names.len(),
            links: links.len(),
        });
    }

    names
        .into_iter()
        .zip(links)
        .map(|(name, link)| -> Result<Region, HarvestError> {
            let link = base_url.join(link.trim())?;
            Ok(Region { name, link })
        })
        .collect()
}

/// Fetches page 1 of a region and reads its pagination token
///
/// # Errors
///
/// * `HarvestError::MissingPaginationToken` - The container element is absent,
///   meaning the region has no listings or the layout changed
pub async fn resolve_pagination(
    fetcher: &PageFetcher,
    region_link: &Url,
    selectors: &Selectors,
    timeout: Duration,
) -> Result<PaginationToken, HarvestError> {
    let page = fetcher
        .get_text(region_link, &[("page", "1")], Some(timeout))
        .await?;

    extract_pagination_token(&page, selectors).ok_or_else(|| {
        HarvestError::MissingPaginationToken {
            url: region_link.to_string(),
        }
    })
}

/// Reads the token attribute from the first pagination container
pub fn extract_pagination_token(page: &str, selectors: &Selectors) -> Option<PaginationToken> {
    select_first(
        page,
        &selectors.pagination_container,
        Some(&selectors.pagination_attribute),
    )
    .filter(|token| !token.trim().is_empty())
    .map(PaginationToken::new)
}

/// Fetches every company of a region from the activities endpoint
///
/// Elements that are not JSON objects cannot carry a title or link; they are
/// kept as empty records so they surface later as rejected companies rather
/// than vanishing from the batch.
pub async fn fetch_batch(
    fetcher: &PageFetcher,
    api_url: &Url,
    token: &PaginationToken,
    block_key: &str,
    timeout: Duration,
) -> Result<Vec<RawCompany>, HarvestError> {
    let body: serde_json::Value = fetcher
        .get_json(
            api_url,
            &[("post_id", token.as_str()), ("key", block_key)],
            Some(timeout),
        )
        .await?;

    let serde_json::Value::Array(items) = body else {
        return Err(HarvestError::UnexpectedBatchShape {
            url: api_url.to_string(),
        });
    };

    Ok(items.into_iter().map(RawCompany::from_json).collect())
}
