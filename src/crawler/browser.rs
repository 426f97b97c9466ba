//! Headless browser fetch sessions over the Chrome DevTools Protocol
//!
//! Route pages reveal their listings only after client-side interaction, so
//! this session drives a real Chromium page: it clicks, scrolls and polls the
//! live DOM instead of reading a fixed body.

use crate::config::Config;
use crate::crawler::fetcher::{ElementHandle, FetchError, PageFetcher};
use crate::crawler::wait::Deadline;
use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use url::Url;

/// What the page reports for one matched element
#[derive(Debug, Deserialize)]
struct ElementSnapshot {
    text: String,
    attributes: HashMap<String, String>,
    interactable: bool,
}

/// Fetch session backed by one Chromium process and one tab
pub struct BrowserFetcher {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    profile: Option<TempDir>,
    load_timeout: Duration,
    poll_interval: Duration,
    current: Option<Url>,
    closed: bool,
}

impl BrowserFetcher {
    /// Launches Chromium and opens a blank tab
    ///
    /// Each session gets its own throwaway profile directory, removed again
    /// when the session is closed or dropped.
    pub async fn launch(config: &Config, session: usize) -> Result<Self, FetchError> {
        let profile = create_profile(session)?;

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg(format!("--user-agent={}", config.user_agent.header_value()))
            .user_data_dir(profile.path())
            .request_timeout(config.crawler.page_load_timeout());

        if !config.fetcher.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.fetcher.chrome_path {
            builder = builder.chrome_executable(path);
        }

        let browser_config = builder.build().map_err(FetchError::Browser)?;
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| FetchError::Browser(format!("Failed to launch browser: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Browser(format!("Failed to open tab: {}", e)))?;

        tracing::debug!(session, headless = config.fetcher.headless, "Browser session started");

        Ok(Self {
            browser,
            page,
            handler,
            profile: Some(profile),
            load_timeout: config.crawler.page_load_timeout(),
            poll_interval: config.crawler.poll_interval(),
            current: None,
            closed: false,
        })
    }

    fn ensure_loaded(&self) -> Result<(), FetchError> {
        if self.current.is_some() {
            Ok(())
        } else {
            Err(FetchError::NoPage)
        }
    }

    async fn snapshot(&self, selector: &str) -> Result<Vec<ElementSnapshot>, FetchError> {
        let script = snapshot_script(selector)?;
        self.page
            .evaluate(script)
            .await
            .map_err(|e| FetchError::Browser(format!("Query '{}' failed: {}", selector, e)))?
            .into_value::<Vec<ElementSnapshot>>()
            .map_err(|e| FetchError::Browser(format!("Unexpected query result: {}", e)))
    }

    async fn run_script(&self, script: String) -> Result<bool, FetchError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?
            .into_value::<bool>()
            .map_err(|e| FetchError::Browser(format!("Unexpected script result: {}", e)))
    }
}

fn create_profile(session: usize) -> Result<TempDir, FetchError> {
    tempfile::Builder::new()
        .prefix(&format!("bus-crawler-{}-", session))
        .tempdir()
        .map_err(|e| FetchError::Browser(format!("Failed to create profile dir: {}", e)))
}

fn remove_profile(profile: TempDir) {
    let path = profile.path().to_path_buf();
    if let Err(e) = profile.close() {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove browser profile");
    }
}

fn to_handle(selector: &str, index: usize, snapshot: ElementSnapshot) -> ElementHandle {
    let text = snapshot.text.split_whitespace().collect::<Vec<_>>().join(" ");
    ElementHandle::new(selector, index, text, snapshot.attributes)
}

/// Embeds `selector` as a JavaScript string literal
fn js_string(selector: &str) -> Result<String, FetchError> {
    serde_json::to_string(selector).map_err(|e| FetchError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

fn snapshot_script(selector: &str) -> Result<String, FetchError> {
    Ok(format!(
        r#"(() => Array.from(document.querySelectorAll({sel})).map(el => {{
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    return {{
        text: el.innerText || el.textContent || "",
        attributes: Object.fromEntries(Array.from(el.attributes).map(a => [a.name, a.value])),
        interactable: rect.width > 0 && rect.height > 0
            && style.visibility !== "hidden" && style.display !== "none" && !el.disabled
    }};
}}))()"#,
        sel = js_string(selector)?
    ))
}

fn click_script(element: &ElementHandle) -> Result<String, FetchError> {
    Ok(format!(
        r#"(() => {{
    const el = document.querySelectorAll({sel})[{index}];
    if (!el) return false;
    el.scrollIntoView({{ block: "center" }});
    el.click();
    return true;
}})()"#,
        sel = js_string(element.selector())?,
        index = element.index()
    ))
}

const SCROLL_TO_BOTTOM: &str =
    "(() => { window.scrollTo(0, document.body.scrollHeight); return true; })()";

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn load(&mut self, url: &Url) -> Result<(), FetchError> {
        self.current = None;

        match tokio::time::timeout(self.load_timeout, self.page.goto(url.as_str())).await {
            Ok(Ok(_)) => {
                let served = self
                    .page
                    .url()
                    .await
                    .map_err(|e| FetchError::Browser(e.to_string()))?
                    .and_then(|href| Url::parse(&href).ok())
                    .unwrap_or_else(|| url.clone());
                self.current = Some(served);
                Ok(())
            }
            Ok(Err(e)) => Err(FetchError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(FetchError::Timeout {
                what: format!("navigation to {}", url),
                timeout: self.load_timeout,
            }),
        }
    }

    fn current_url(&self) -> Option<Url> {
        self.current.clone()
    }

    async fn wait_until_interactable(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<ElementHandle, FetchError> {
        self.ensure_loaded()?;
        let deadline = Deadline::after(timeout);

        loop {
            let first = self.snapshot(selector).await?.into_iter().next();
            if let Some(snapshot) = first.filter(|s| s.interactable) {
                return Ok(to_handle(selector, 0, snapshot));
            }

            if deadline.is_expired() {
                return Err(FetchError::Timeout {
                    what: format!("interactable '{}'", selector),
                    timeout,
                });
            }
            deadline.pause(self.poll_interval).await;
        }
    }

    async fn trigger(&mut self, element: &ElementHandle) -> Result<(), FetchError> {
        self.ensure_loaded()?;
        if self.run_script(click_script(element)?).await? {
            Ok(())
        } else {
            Err(FetchError::Browser(format!(
                "Element '{}' #{} is no longer on the page",
                element.selector(),
                element.index()
            )))
        }
    }

    async fn force_materialize(&mut self) -> Result<(), FetchError> {
        self.ensure_loaded()?;
        self.run_script(SCROLL_TO_BOTTOM.to_string()).await?;
        Ok(())
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>, FetchError> {
        self.ensure_loaded()?;
        let snapshots = self.snapshot(selector).await?;
        Ok(snapshots
            .into_iter()
            .enumerate()
            .map(|(index, snapshot)| to_handle(selector, index, snapshot))
            .collect())
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.current = None;

        let result = self
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| FetchError::Browser(format!("Failed to close browser: {}", e)));
        if let Err(e) = self.browser.wait().await {
            tracing::debug!(error = %e, "Browser process did not report its exit");
        }
        self.handler.abort();

        if let Some(profile) = self.profile.take() {
            remove_profile(profile);
        }
        result
    }
}
