//! State module for tracking crawl progress
//!
//! - `CrawlPhase`: where a worker is in the region → route → listing loop
//! - `PhaseTracker`: per-worker phase holder that traces transitions

mod crawl_phase;

pub use crawl_phase::{CrawlPhase, FailureScope, PhaseTracker};
