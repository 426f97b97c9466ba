//! Output module for crawl reports and listing statistics
//!
//! This module handles:
//! - Printing the outcome of a crawl run
//! - Loading and printing listing statistics from the database

pub mod stats;

pub use stats::{load_statistics, print_statistics, run_duration_seconds, ListingStatistics};

use crate::crawler::CrawlReport;

/// Formats the one-line summary logged and printed at the end of a run
pub fn report_line(report: &CrawlReport) -> String {
    let outcome = if report.cancelled {
        "cancelled"
    } else {
        "completed"
    };

    format!(
        "Run {} {}: {} records written ({} of {} regions crawled, {} failed; {} routes, {} failed)",
        report.run_id,
        outcome,
        report.records_written,
        report.regions_crawled,
        report.regions_total,
        report.regions_failed,
        report.routes_discovered,
        report.routes_failed
    )
}

/// Prints a crawl report to stdout
pub fn print_crawl_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");
    println!("  Run ID: {}", report.run_id);
    println!(
        "  Regions: {} crawled, {} failed, {} configured",
        report.regions_crawled, report.regions_failed, report.regions_total
    );
    println!(
        "  Routes: {} discovered, {} failed",
        report.routes_discovered, report.routes_failed
    );
    println!("  Listings collected: {}", report.listings_collected);
    println!("  Records written: {}", report.records_written);
    if report.cancelled {
        println!("\nRun was cancelled; collected listings were still written.");
    }
}
