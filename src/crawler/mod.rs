//! Crawler module for the region → route → listing pipeline
//!
//! This module contains the core crawling logic, including:
//! - Page fetching sessions, over plain HTTP or a headless browser
//! - Route discovery on region landing pages
//! - Listing extraction and normalization on route pages
//! - Region scheduling across workers and overall crawl coordination

#[cfg(feature = "browser")]
mod browser;
mod coordinator;
mod discovery;
mod extractor;
mod fetcher;
mod normalizer;
mod parser;
mod scheduler;
mod wait;

#[cfg(test)]
mod testing;

#[cfg(feature = "browser")]
pub use browser::BrowserFetcher;
pub use coordinator::{initialize_and_run, CrawlReport, Orchestrator};
pub use discovery::{discover_routes, Region, Route};
pub use extractor::{ListingExtractor, RawListingColumns};
pub use fetcher::{
    build_http_client, close_sessions, load_page, open_sessions, ElementHandle, FetchError,
    HttpFetcher, PageFetcher,
};
pub use normalizer::{normalize, parse_fare, parse_rating, parse_seats};
pub use parser::{resolve_link, StaticPage};
pub use scheduler::RegionQueue;
pub use wait::Deadline;
