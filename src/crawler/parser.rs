//! Field extraction from HTML documents
//!
//! Every lookup the harvester makes on a page reduces to one operation:
//! run a CSS selector and return, for each match in document order, either
//! its trimmed text or one of its attributes.

use crate::config::SelectorConfig;
use crate::HarvestError;
use scraper::{Html, Selector};

/// Compiled selectors for the landing, region and detail pages
#[derive(Debug)]
pub struct Selectors {
    pub region_name: Selector,
    pub region_link: Selector,
    pub pagination_container: Selector,
    pub pagination_attribute: String,
    pub company_website: Selector,
}

impl Selectors {
    /// Compiles every selector in the configuration
    pub fn compile(config: &SelectorConfig) -> Result<Self, HarvestError> {
        Ok(Self {
            region_name: compile_selector(&config.region_name)?,
            region_link: compile_selector(&config.region_link)?,
            pagination_container: compile_selector(&config.pagination_container)?,
            pagination_attribute: config.pagination_attribute.clone(),
            company_website: compile_selector(&config.company_website)?,
        })
    }
}

/// Parses a single CSS selector
pub fn compile_selector(selector: &str) -> Result<Selector, HarvestError> {
    Selector::parse(selector).map_err(|e| HarvestError::Selector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// Runs `selector` against `html`
///
/// With an `attribute`, returns that attribute for each match (matches
/// lacking it are skipped). Without one, returns each match's text content
/// with surrounding whitespace trimmed.
///
/// # Example
///
/// ```
/// use listing_harvest::crawler::{compile_selector, select};
///
/// let html = r#"<ul><li><a href="/a"> A </a></li><li><a href="/b">B</a></li></ul>"#;
/// let links = compile_selector("li > a").unwrap();
/// assert_eq!(select(html, &links, None), vec!["A", "B"]);
/// assert_eq!(select(html, &links, Some("href")), vec!["/a", "/b"]);
/// ```
pub fn select(html: &str, selector: &Selector, attribute: Option<&str>) -> Vec<String> {
    let document = Html::parse_document(html);
    let matches = document.select(selector);

    match attribute {
        Some(attribute) => matches
            .filter_map(|element| element.value().attr(attribute))
            .map(str::to_string)
            .collect(),
        None => matches
            .map(|element| element.text().collect::<String>().trim().to_string())
            .collect(),
    }
}

/// First match of [`select`], if any
pub fn select_first(html: &str, selector: &Selector, attribute: Option<&str>) -> Option<String> {
    select(html, selector, attribute).into_iter().next()
}
