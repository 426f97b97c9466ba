//! Page fetching sessions
//!
//! This module defines the capability the pipeline drives a page through,
//! and the default HTTP implementation of it:
//! - Building HTTP clients with the configured user agent string
//! - Loading pages within the configured page-load bound
//! - Answering selector queries against the loaded page
//! - Error classification

use crate::config::{Config, FetchEngine, UserAgentConfig};
use crate::crawler::parser::StaticPage;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors raised by a fetch session
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },

    #[error("No page is loaded in this session")]
    NoPage,

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Browser error: {0}")]
    Browser(String),
}

/// A snapshot of one element matched by a selector query
///
/// Handles are positional: `index` is the element's place among all matches
/// of `selector` at the time of the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    selector: String,
    index: usize,
    text: String,
    attributes: HashMap<String, String>,
}

impl ElementHandle {
    pub fn new(
        selector: impl Into<String>,
        index: usize,
        text: impl Into<String>,
        attributes: HashMap<String, String>,
    ) -> Self {
        Self {
            selector: selector.into(),
            index,
            text: text.into(),
            attributes,
        }
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Rendered text of the element
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// A single page session: one page loaded at a time, queried by selector
///
/// Sessions are owned by exactly one worker for the lifetime of a run.
#[async_trait]
pub trait PageFetcher: Send {
    /// Navigates the session to `url`, replacing the current page
    async fn load(&mut self, url: &Url) -> Result<(), FetchError>;

    /// The URL the current page was finally served from, after redirects
    ///
    /// Relative links on the page resolve against this URL. None before the
    /// first successful load.
    fn current_url(&self) -> Option<Url>;

    /// Waits until the first element matching `selector` can be activated
    ///
    /// Returns `FetchError::Timeout` if that does not happen within `timeout`.
    async fn wait_until_interactable(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<ElementHandle, FetchError>;

    /// Activates an element previously returned by this session
    async fn trigger(&mut self, element: &ElementHandle) -> Result<(), FetchError>;

    /// Forces lazily loaded content to materialize
    async fn force_materialize(&mut self) -> Result<(), FetchError>;

    /// Returns every element matching `selector`, in document order
    async fn query_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>, FetchError>;

    /// Releases the session's resources
    async fn close(&mut self) -> Result<(), FetchError> {
        Ok(())
    }
}

/// Loads `url` into `fetcher`, failing with a timeout once `timeout` elapses
///
/// The bound holds regardless of whether the session enforces one itself.
pub async fn load_page(
    fetcher: &mut dyn PageFetcher,
    url: &Url,
    timeout: Duration,
) -> Result<(), FetchError> {
    match tokio::time::timeout(timeout, fetcher.load(url)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout {
            what: format!("page load of {}", url),
            timeout,
        }),
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Overall request timeout
///
/// # Example
///
/// ```no_run
/// use bus_crawler::config::UserAgentConfig;
/// use bus_crawler::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "BusCrawler".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetch session that loads pages with plain HTTP requests
///
/// The body is fixed once served, so triggering controls and forcing lazy
/// content are no-ops and an absent reveal control fails immediately.
pub struct HttpFetcher {
    client: Client,
    load_timeout: Duration,
    page: Option<StaticPage>,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let timeout = config.crawler.page_load_timeout();
        let client =
            build_http_client(&config.user_agent, timeout).map_err(|e| FetchError::Http {
                url: String::new(),
                source: e,
            })?;

        Ok(Self::with_client(client, timeout))
    }

    pub fn with_client(client: Client, load_timeout: Duration) -> Self {
        Self {
            client,
            load_timeout,
            page: None,
        }
    }

    fn page(&self) -> Result<&StaticPage, FetchError> {
        self.page.as_ref().ok_or(FetchError::NoPage)
    }

    fn page_mut(&mut self) -> Result<&mut StaticPage, FetchError> {
        self.page.as_mut().ok_or(FetchError::NoPage)
    }

    fn classify(&self, url: &Url, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                what: format!("response from {}", url),
                timeout: self.load_timeout,
            }
        } else {
            FetchError::Http {
                url: url.to_string(),
                source: error,
            }
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn load(&mut self, url: &Url) -> Result<(), FetchError> {
        self.page = None;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let body = response.text().await.map_err(|e| self.classify(url, e))?;

        tracing::trace!(url = %final_url, bytes = body.len(), "Page loaded");
        self.page = Some(StaticPage::new(final_url, body));
        Ok(())
    }

    fn current_url(&self) -> Option<Url> {
        self.page.as_ref().map(|page| page.url().clone())
    }

    async fn wait_until_interactable(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<ElementHandle, FetchError> {
        self.page_mut()?
            .first_interactable(selector)?
            .ok_or_else(|| FetchError::Timeout {
                what: format!("interactable '{}'", selector),
                timeout,
            })
    }

    async fn trigger(&mut self, element: &ElementHandle) -> Result<(), FetchError> {
        self.page()?;
        tracing::trace!(selector = element.selector(), "Trigger ignored on static page");
        Ok(())
    }

    async fn force_materialize(&mut self) -> Result<(), FetchError> {
        self.page()?;
        Ok(())
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>, FetchError> {
        self.page_mut()?.select(selector)
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        self.page = None;
        Ok(())
    }
}

/// Opens one fetch session per configured worker
///
/// # Errors
///
/// Fails if any session cannot be started; sessions opened before the
/// failure are closed first.
pub async fn open_sessions(config: &Config) -> Result<Vec<Box<dyn PageFetcher>>, FetchError> {
    let count = config.crawler.workers.max(1) as usize;
    let mut sessions: Vec<Box<dyn PageFetcher>> = Vec::with_capacity(count);

    for session in 0..count {
        match open_session(config, session).await {
            Ok(session) => sessions.push(session),
            Err(e) => {
                close_sessions(sessions).await;
                return Err(e);
            }
        }
    }

    tracing::debug!(count, engine = ?config.fetcher.engine, "Fetch sessions opened");
    Ok(sessions)
}

async fn open_session(config: &Config, session: usize) -> Result<Box<dyn PageFetcher>, FetchError> {
    match config.fetcher.engine {
        FetchEngine::Http => Ok(Box::new(HttpFetcher::new(config)?)),
        FetchEngine::Browser => open_browser_session(config, session).await,
    }
}

#[cfg(feature = "browser")]
async fn open_browser_session(
    config: &Config,
    session: usize,
) -> Result<Box<dyn PageFetcher>, FetchError> {
    let fetcher = crate::crawler::browser::BrowserFetcher::launch(config, session).await?;
    Ok(Box::new(fetcher))
}

#[cfg(not(feature = "browser"))]
async fn open_browser_session(
    _config: &Config,
    _session: usize,
) -> Result<Box<dyn PageFetcher>, FetchError> {
    Err(FetchError::Browser(
        "this build does not include the browser engine".to_string(),
    ))
}

/// Closes every session, logging failures
pub async fn close_sessions(sessions: Vec<Box<dyn PageFetcher>>) {
    for mut session in sessions {
        if let Err(e) = session.close().await {
            tracing::warn!(error = %e, "Failed to close fetch session");
        }
    }
}
