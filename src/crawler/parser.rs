//! Static HTML querying for fetched pages
//!
//! This module answers selector queries against a page body that does not
//! change after it was fetched:
//! - Selecting every element that matches a CSS selector, in document order
//! - Deciding whether the first match is interactable
//! - Resolving route links against the page they were found on

use crate::crawler::fetcher::{ElementHandle, FetchError};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use url::Url;

/// A fetched HTML document and the URL it was served from
///
/// The body never changes, so each selector's matches are computed once and
/// kept for repeated queries.
#[derive(Debug, Clone)]
pub struct StaticPage {
    url: Url,
    body: String,
    matches: HashMap<String, Vec<ElementHandle>>,
}

impl StaticPage {
    pub fn new(url: Url, body: String) -> Self {
        Self {
            url,
            body,
            matches: HashMap::new(),
        }
    }

    /// The final URL the body was served from
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns every element matching `selector`, in document order
    ///
    /// An empty result is not an error; only a malformed selector is.
    ///
    /// # Example
    ///
    /// ```
    /// use bus_crawler::crawler::StaticPage;
    /// use url::Url;
    ///
    /// let html = r#"<ul><li class="fare">INR 120</li><li class="fare">INR 95</li></ul>"#;
    /// let mut page = StaticPage::new(Url::parse("https://example.com/").unwrap(), html.to_string());
    /// let fares = page.select(".fare").unwrap();
    /// assert_eq!(fares.len(), 2);
    /// assert_eq!(fares[1].text(), "INR 95");
    /// ```
    pub fn select(&mut self, selector: &str) -> Result<Vec<ElementHandle>, FetchError> {
        if let Some(elements) = self.matches.get(selector) {
            return Ok(elements.clone());
        }

        let parsed = parse_selector(selector)?;
        let document = Html::parse_document(&self.body);

        let elements: Vec<ElementHandle> = document
            .select(&parsed)
            .enumerate()
            .map(|(index, element)| to_handle(selector, index, element))
            .collect();

        self.matches.insert(selector.to_string(), elements.clone());
        Ok(elements)
    }

    /// Returns the first match for `selector` if it can be activated
    ///
    /// An element counts as interactable unless it carries `disabled` or
    /// `hidden`, or is styled `display: none`.
    pub fn first_interactable(&mut self, selector: &str) -> Result<Option<ElementHandle>, FetchError> {
        let first = self.select(selector)?.into_iter().next();
        Ok(first.filter(is_interactable))
    }
}

fn parse_selector(selector: &str) -> Result<Selector, FetchError> {
    Selector::parse(selector).map_err(|e| FetchError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

fn to_handle(selector: &str, index: usize, element: ElementRef<'_>) -> ElementHandle {
    let attributes: HashMap<String, String> = element
        .value()
        .attrs()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();

    ElementHandle::new(selector, index, collapse_whitespace(element), attributes)
}

/// Joins the element's text nodes the way a browser renders them: runs of
/// whitespace become a single space
fn collapse_whitespace(element: ElementRef<'_>) -> String {
    let raw: String = element.text().collect();
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_interactable(element: &ElementHandle) -> bool {
    if element.attribute("disabled").is_some() || element.attribute("hidden").is_some() {
        return false;
    }

    match element.attribute("style") {
        Some(style) => {
            let compact: String = style.chars().filter(|c| !c.is_whitespace()).collect();
            !compact.to_ascii_lowercase().contains("display:none")
        }
        None => true,
    }
}

/// Resolves a link href to an absolute URL without its fragment
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links (same page anchors)
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    if href.starts_with('#') {
        return None;
    }

    match base_url.join(href) {
        Ok(mut absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                absolute_url.set_fragment(None);
                Some(absolute_url)
            } else {
                None
            }
        }
        Err(_) => None,
    }
}
