//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests made by the harvester:
//! - Building one shared client with browser-like headers and a cookie store,
//!   so clearance cookies handed out by the site's bot-mitigation layer are
//!   replayed on later requests
//! - GET requests with optional query parameters and per-request timeouts
//! - Decoding bodies as text or JSON
//! - Classifying failures into transient and permanent ones

use crate::config::SiteConfig;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors produced while fetching a page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {source}")]
    Connect { url: String, source: reqwest::Error },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to read body from {url}: {source}")]
    Body { url: String, source: reqwest::Error },

    #[error("Failed to decode JSON from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),
}

impl FetchError {
    /// Returns true if repeating the request may succeed
    ///
    /// | Condition | Transient |
    /// |-----------|-----------|
    /// | Timeout | yes |
    /// | Connection, TLS or proxy failure | yes |
    /// | Body cut off mid-read | yes |
    /// | Request dropped by the peer | yes |
    /// | HTTP 403 / 429 / 5xx (challenge or overload) | yes |
    /// | Other HTTP status | no |
    /// | Malformed JSON | no |
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Connect { .. } | Self::Body { .. } => true,
            Self::Status { status, .. } => {
                *status == StatusCode::FORBIDDEN.as_u16()
                    || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
                    || *status >= 500
            }
            Self::Http { source, .. } => source.is_request(),
            Self::Decode { .. } | Self::Client(_) => false,
        }
    }

    fn classify(url: &Url, error: reqwest::Error) -> Self {
        let url = url.to_string();
        if error.is_timeout() {
            Self::Timeout { url }
        } else if error.is_connect() {
            Self::Connect { url, source: error }
        } else if error.is_body() || error.is_decode() {
            Self::Body { url, source: error }
        } else {
            Self::Http { url, source: error }
        }
    }
}

/// Thin wrapper over a shared `reqwest::Client`
///
/// Cloning is cheap; every clone shares the connection pool and cookie jar.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    /// Builds a fetcher for the configured site
    ///
    /// The client carries no global timeout; callers pass one per request
    /// where a ceiling is wanted.
    pub fn new(site: &SiteConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = Client::builder()
            .user_agent(site.user_agent.as_str())
            .default_headers(headers)
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(30))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { client })
    }

    /// Fetches `url` and returns the body as text
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    /// * `query` - Query parameters appended to the URL
    /// * `timeout` - Total request ceiling; `None` waits indefinitely
    pub async fn get_text(
        &self,
        url: &Url,
        query: &[(&str, &str)],
        timeout: Option<Duration>,
    ) -> Result<String, FetchError> {
        let mut request = self.client.get(url.clone());
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        tracing::debug!("GET {} {:?}", url, query);

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::classify(url, e))
    }

    /// Fetches `url` and decodes the body as JSON
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&str, &str)],
        timeout: Option<Duration>,
    ) -> Result<T, FetchError> {
        let body = self.get_text(url, query, timeout).await?;
        serde_json::from_str(&body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }
}
