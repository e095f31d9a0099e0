//! Company enrichment
//!
//! Turns one raw listing from the activities endpoint into a finished
//! [`CompanyRecord`], resolving the company's own website from its detail
//! page on the way.

use crate::crawler::fetcher::{FetchError, PageFetcher};
use crate::crawler::parser::{select_first, Selectors};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// A listing as returned by the activities endpoint
///
/// Every field is optional. A value of the wrong JSON type (the endpoint sends
/// `[]` or `false` for empty taxonomies) decodes as absent rather than failing
/// the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawCompany {
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub link: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub taxonomies: Option<Taxonomies>,
}

/// Taxonomy terms attached to a listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Taxonomies {
    #[serde(default, deserialize_with = "lenient")]
    pub activity_category: Option<Term>,

    #[serde(default, deserialize_with = "lenient")]
    pub location: Option<Term>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Term {
    #[serde(default, rename = "termString", deserialize_with = "lenient")]
    pub term_string: Option<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| serde_json::from_value(value).ok()))
}

impl RawCompany {
    /// Decodes one element of the endpoint's array; non-objects become an empty record
    pub fn from_json(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::debug!("Unreadable company entry: {}", e);
            Self::default()
        })
    }

    /// `taxonomies.activity_category.termString`, or `""`
    pub fn category(&self) -> &str {
        self.taxonomies
            .as_ref()
            .and_then(|t| t.activity_category.as_ref())
            .and_then(|t| t.term_string.as_deref())
            .unwrap_or("")
    }

    /// `taxonomies.location.termString`, or `""`
    pub fn location(&self) -> &str {
        self.taxonomies
            .as_ref()
            .and_then(|t| t.location.as_ref())
            .and_then(|t| t.term_string.as_deref())
            .unwrap_or("")
    }
}

/// One output row
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CompanyRecord {
    pub region: String,
    pub title: String,
    pub category: String,
    pub location: String,
    pub website: String,
}

/// Result of a single enrichment attempt
#[derive(Debug)]
pub enum EnrichmentOutcome {
    /// The record is complete and may be persisted
    Success(CompanyRecord),

    /// The detail page could not be fetched; the same company may be retried
    TransientFailure { raw: RawCompany, error: FetchError },

    /// The company cannot be enriched no matter how often it is retried
    Rejected { raw: RawCompany, reason: String },
}

/// Resolves raw listings into company records
#[derive(Debug)]
pub struct CompanyEnricher {
    fetcher: PageFetcher,
    base_url: Url,
    selectors: Arc<Selectors>,
    detail_timeout: Option<Duration>,
}

impl CompanyEnricher {
    pub fn new(
        fetcher: PageFetcher,
        base_url: Url,
        selectors: Arc<Selectors>,
        detail_timeout: Option<Duration>,
    ) -> Self {
        Self {
            fetcher,
            base_url,
            selectors,
            detail_timeout,
        }
    }

    /// Performs one enrichment attempt for `raw`
    ///
    /// A missing title and missing taxonomy terms become empty strings. A
    /// detail page without a website link yields an empty website, which
    /// still counts as success. Only a missing or unusable link rejects the
    /// listing.
    pub async fn enrich(&self, raw: RawCompany, region: &str) -> EnrichmentOutcome {
        let title = raw.title.clone().unwrap_or_default();

        let detail_url = match self.detail_url(&raw) {
            Ok(url) => url,
            Err(reason) => return EnrichmentOutcome::Rejected { raw, reason },
        };

        match self.resolve_website(&detail_url).await {
            Ok(website) => EnrichmentOutcome::Success(CompanyRecord {
                region: region.to_string(),
                title,
                category: raw.category().to_string(),
                location: raw.location().to_string(),
                website,
            }),
            Err(error) if error.is_transient() => {
                EnrichmentOutcome::TransientFailure { raw, error }
            }
            Err(error) => EnrichmentOutcome::Rejected {
                raw,
                reason: error.to_string(),
            },
        }
    }

    /// Absolute detail page URL for a listing
    pub fn detail_url(&self, raw: &RawCompany) -> Result<Url, String> {
        let link = raw
            .link
            .as_deref()
            .map(str::trim)
            .filter(|link| !link.is_empty())
            .ok_or_else(|| "listing has no link".to_string())?;

        self.base_url
            .join(link)
            .map_err(|e| format!("invalid link '{}': {}", link, e))
    }

    async fn resolve_website(&self, detail_url: &Url) -> Result<String, FetchError> {
        let page = self
            .fetcher
            .get_text(detail_url, &[], self.detail_timeout)
            .await?;

        Ok(select_first(&page, &self.selectors.company_website, Some("href")).unwrap_or_default())
    }
}
