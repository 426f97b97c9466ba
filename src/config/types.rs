use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Bus-Crawler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    #[serde(default, rename = "region")]
    pub regions: Vec<RegionEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of fetch sessions working regions in parallel
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Upper bound for loading a region or route page (milliseconds)
    #[serde(rename = "page-load-timeout-ms", default = "default_page_load_timeout")]
    pub page_load_timeout_ms: u64,

    /// How long to wait for the reveal control to become interactable (milliseconds)
    #[serde(rename = "reveal-timeout-ms", default = "default_reveal_timeout")]
    pub reveal_timeout_ms: u64,

    /// Fixed wait after forcing lazy content to load (milliseconds)
    #[serde(rename = "settle-ms", default = "default_settle")]
    pub settle_ms: u64,

    /// Upper bound for waiting on the listing count to stop changing (milliseconds)
    #[serde(rename = "settle-timeout-ms", default = "default_settle_timeout")]
    pub settle_timeout_ms: u64,

    /// Interval between condition polls (milliseconds)
    #[serde(rename = "poll-interval-ms", default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// First delay before retrying a failed flush (milliseconds)
    #[serde(
        rename = "flush-initial-backoff-ms",
        default = "default_flush_initial_backoff"
    )]
    pub flush_initial_backoff_ms: u64,

    /// Total time budget for flush retries (milliseconds)
    #[serde(rename = "flush-max-elapsed-ms", default = "default_flush_max_elapsed")]
    pub flush_max_elapsed_ms: u64,
}

impl CrawlerConfig {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_millis(self.page_load_timeout_ms)
    }

    pub fn reveal_timeout(&self) -> Duration {
        Duration::from_millis(self.reveal_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn flush_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.flush_initial_backoff_ms)
    }

    pub fn flush_max_elapsed(&self) -> Duration {
        Duration::from_millis(self.flush_max_elapsed_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            page_load_timeout_ms: default_page_load_timeout(),
            reveal_timeout_ms: default_reveal_timeout(),
            settle_ms: default_settle(),
            settle_timeout_ms: default_settle_timeout(),
            poll_interval_ms: default_poll_interval(),
            flush_initial_backoff_ms: default_flush_initial_backoff(),
            flush_max_elapsed_ms: default_flush_max_elapsed(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Which page fetcher backs the crawl sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FetchEngine {
    /// Plain HTTP GET with static DOM queries
    #[default]
    Http,
    /// Headless Chromium driven over CDP
    Browser,
}

/// Page fetcher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    #[serde(default)]
    pub engine: FetchEngine,

    /// Run the browser without a window
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Explicit Chrome/Chromium executable
    #[serde(rename = "chrome-path", default)]
    pub chrome_path: Option<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            engine: FetchEngine::default(),
            headless: true,
            chrome_path: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// CSS selectors for the elements the pipeline reads
///
/// Defaults target the layout of the redBus regional pages.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    /// Route links on a region landing page
    #[serde(default = "default_route_selector")]
    pub route: String,

    /// Control that reveals the bus list on a route page
    #[serde(default = "default_reveal_selector")]
    pub reveal: String,

    #[serde(default = "default_operator_selector")]
    pub operator: String,

    #[serde(rename = "vehicle-class", default = "default_vehicle_class_selector")]
    pub vehicle_class: String,

    #[serde(default = "default_departure_selector")]
    pub departure: String,

    #[serde(default = "default_duration_selector")]
    pub duration: String,

    #[serde(default = "default_arrival_selector")]
    pub arrival: String,

    #[serde(default = "default_rating_selector")]
    pub rating: String,

    #[serde(default = "default_fare_selector")]
    pub fare: String,

    #[serde(default = "default_seats_selector")]
    pub seats: String,
}

impl SelectorConfig {
    /// All selectors paired with their config key, for validation and display
    pub fn entries(&self) -> [(&'static str, &str); 10] {
        [
            ("route", self.route.as_str()),
            ("reveal", self.reveal.as_str()),
            ("operator", self.operator.as_str()),
            ("vehicle-class", self.vehicle_class.as_str()),
            ("departure", self.departure.as_str()),
            ("duration", self.duration.as_str()),
            ("arrival", self.arrival.as_str()),
            ("rating", self.rating.as_str()),
            ("fare", self.fare.as_str()),
            ("seats", self.seats.as_str()),
        ]
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            route: default_route_selector(),
            reveal: default_reveal_selector(),
            operator: default_operator_selector(),
            vehicle_class: default_vehicle_class_selector(),
            departure: default_departure_selector(),
            duration: default_duration_selector(),
            arrival: default_arrival_selector(),
            rating: default_rating_selector(),
            fare: default_fare_selector(),
            seats: default_seats_selector(),
        }
    }
}

/// A target region and the landing page that lists its routes
#[derive(Debug, Clone, Deserialize)]
pub struct RegionEntry {
    /// Display name stored with every listing (e.g., "Goa")
    pub name: String,

    /// Landing page advertising the region's routes
    #[serde(rename = "entry-url")]
    pub entry_url: String,
}

fn default_workers() -> u32 {
    1
}

fn default_page_load_timeout() -> u64 {
    30_000
}

fn default_reveal_timeout() -> u64 {
    10_000
}

fn default_settle() -> u64 {
    2_000
}

fn default_settle_timeout() -> u64 {
    15_000
}

fn default_poll_interval() -> u64 {
    250
}

fn default_flush_initial_backoff() -> u64 {
    500
}

fn default_flush_max_elapsed() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

fn default_route_selector() -> String {
    ".route".to_string()
}

fn default_reveal_selector() -> String {
    ".button".to_string()
}

fn default_operator_selector() -> String {
    ".travels.lh-24.f-bold.d-color".to_string()
}

fn default_vehicle_class_selector() -> String {
    ".bus-type.f-12.m-top-16.l-color.evBus".to_string()
}

fn default_departure_selector() -> String {
    ".dp-time.f-19.d-color.f-bold".to_string()
}

fn default_duration_selector() -> String {
    ".dur.l-color.lh-24".to_string()
}

fn default_arrival_selector() -> String {
    ".bp-time.f-19.d-color.disp-Inline".to_string()
}

fn default_rating_selector() -> String {
    "div.rating-sec.lh-24".to_string()
}

fn default_fare_selector() -> String {
    ".fare.d-block".to_string()
}

fn default_seats_selector() -> String {
    "div.seat-left.m-top-30, div.seat-left.m-top-16".to_string()
}
