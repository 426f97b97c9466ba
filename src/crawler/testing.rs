//! Scripted fetch session for exercising the pipeline without a network

use crate::crawler::fetcher::{ElementHandle, FetchError, PageFetcher};
use crate::crawler::parser::StaticPage;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
enum Script {
    Html(String),
    /// Serves `initial` until lazy content is forced, then `materialized`
    Lazy {
        initial: String,
        materialized: String,
    },
    Fail(String),
    Stall,
    /// Serves whatever is scripted at the target URL
    Redirect(String),
}

/// Fetch session that serves canned pages keyed by URL and records every call
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    pages: HashMap<String, Script>,
    current: Option<StaticPage>,
    pending: Option<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages
            .insert(url.to_string(), Script::Html(html.to_string()));
        self
    }

    pub fn lazy_page(mut self, url: &str, initial: &str, materialized: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            Script::Lazy {
                initial: initial.to_string(),
                materialized: materialized.to_string(),
            },
        );
        self
    }

    pub fn failing_page(mut self, url: &str, message: &str) -> Self {
        self.pages
            .insert(url.to_string(), Script::Fail(message.to_string()));
        self
    }

    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        self.pages
            .insert(from.to_string(), Script::Redirect(to.to_string()));
        self
    }

    pub fn stalled_page(mut self, url: &str) -> Self {
        self.pages.insert(url.to_string(), Script::Stall);
        self
    }

    /// Shared view of the call log, still readable after the session is moved
    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn current(&mut self) -> Result<&mut StaticPage, FetchError> {
        self.current.as_mut().ok_or(FetchError::NoPage)
    }

    /// Follows at most one scripted redirect
    fn resolve(&self, url: &Url) -> (Url, Option<Script>) {
        match self.pages.get(url.as_str()) {
            Some(Script::Redirect(target)) => match Url::parse(target) {
                Ok(served) => {
                    let script = self.pages.get(served.as_str()).cloned();
                    (served, script)
                }
                Err(_) => (url.clone(), None),
            },
            script => (url.clone(), script.cloned()),
        }
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn load(&mut self, url: &Url) -> Result<(), FetchError> {
        self.record(format!("load {}", url));
        self.current = None;
        self.pending = None;

        let (served, script) = self.resolve(url);
        match script {
            Some(Script::Html(html)) => {
                self.current = Some(StaticPage::new(served, html));
                Ok(())
            }
            Some(Script::Lazy {
                initial,
                materialized,
            }) => {
                self.current = Some(StaticPage::new(served, initial));
                self.pending = Some(materialized);
                Ok(())
            }
            Some(Script::Fail(message)) => Err(FetchError::Navigation {
                url: url.to_string(),
                message,
            }),
            Some(Script::Stall) => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
            Some(Script::Redirect(_)) | None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    fn current_url(&self) -> Option<Url> {
        self.current.as_ref().map(|page| page.url().clone())
    }

    async fn wait_until_interactable(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<ElementHandle, FetchError> {
        self.record(format!("wait {}", selector));
        self.current()?
            .first_interactable(selector)?
            .ok_or_else(|| FetchError::Timeout {
                what: format!("interactable '{}'", selector),
                timeout,
            })
    }

    async fn trigger(&mut self, element: &ElementHandle) -> Result<(), FetchError> {
        self.record(format!("trigger {}", element.selector()));
        self.current()?;
        Ok(())
    }

    async fn force_materialize(&mut self) -> Result<(), FetchError> {
        self.record("materialize".to_string());
        let url = self.current()?.url().clone();
        if let Some(html) = self.pending.take() {
            self.current = Some(StaticPage::new(url, html));
        }
        Ok(())
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>, FetchError> {
        self.record(format!("query {}", selector));
        self.current()?.select(selector)
    }
}

/// Route page markup with `count` complete listings using the default selectors
pub fn listing_page(count: usize) -> String {
    let mut html = String::from(r#"<html><body><div class="button">View Buses</div>"#);
    for i in 0..count {
        html.push_str(&format!(
            r#"<div class="bus-item">
                <div class="travels lh-24 f-bold d-color">Operator {i}</div>
                <div class="bus-type f-12 m-top-16 l-color evBus">A/C Sleeper (2+1)</div>
                <div class="dp-time f-19 d-color f-bold">0{i}:30</div>
                <div class="dur l-color lh-24">05h 15m</div>
                <div class="bp-time f-19 d-color disp-Inline">1{i}:45</div>
                <div class="rating-sec lh-24">4.{i}</div>
                <span class="fare d-block">INR 1,2{i}0</span>
                <div class="seat-left m-top-30">{seats} Seats available</div>
            </div>"#,
            i = i,
            seats = 10 + i
        ));
    }
    html.push_str("</body></html>");
    html
}

/// Region landing page markup linking to each `(name, href)` pair
pub fn region_page(routes: &[(&str, &str)]) -> String {
    let mut html = String::from("<html><body><div class=\"route_details\">");
    for (name, href) in routes {
        html.push_str(&format!(r#"<a class="route" href="{}">{}</a>"#, href, name));
    }
    html.push_str("</div></body></html>");
    html
}
