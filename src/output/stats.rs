//! Statistics generation from the listing database
//!
//! This module provides functionality for extracting and displaying
//! listing statistics from the storage layer.

use crate::storage::{RunRecord, SqliteStorage, StorageResult};

/// Listing statistics summary
#[derive(Debug, Clone)]
pub struct ListingStatistics {
    /// Total number of listings across all runs
    pub total_listings: u64,

    /// Listing counts per region, largest first
    pub listings_by_region: Vec<(String, u64)>,

    /// Number of recorded crawl runs
    pub total_runs: u64,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Listings stamped with the most recent run
    pub latest_run_listings: u64,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(ListingStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &SqliteStorage) -> StorageResult<ListingStatistics> {
    let latest_run = storage.get_latest_run()?;
    let latest_run_listings = match &latest_run {
        Some(run) => storage.count_listings_for_run(run.id)?,
        None => 0,
    };

    Ok(ListingStatistics {
        total_listings: storage.count_listings()?,
        listings_by_region: storage.count_listings_by_region()?,
        total_runs: storage.count_runs()?,
        latest_run,
        latest_run_listings,
    })
}

/// Wall-clock length of a finished run in whole seconds
pub fn run_duration_seconds(run: &RunRecord) -> Option<i64> {
    let started = run
        .started_at
        .parse::<chrono::DateTime<chrono::Utc>>()
        .ok()?;
    let finished = run
        .finished_at
        .as_deref()?
        .parse::<chrono::DateTime<chrono::Utc>>()
        .ok()?;

    Some((finished - started).num_seconds())
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &ListingStatistics) {
    println!("=== Listing Statistics ===\n");

    println!("Overview:");
    println!("  Total listings: {}", stats.total_listings);
    println!("  Crawl runs: {}", stats.total_runs);
    println!();

    if !stats.listings_by_region.is_empty() {
        println!("Listings by Region:");
        for (region, count) in &stats.listings_by_region {
            let percentage = if stats.total_listings > 0 {
                (*count as f64 / stats.total_listings as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", region, count, percentage);
        }
        println!();
    }

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  ID: {}", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            if let Some(seconds) = run_duration_seconds(run) {
                println!("  Duration: {}s", seconds);
            }
            println!(
                "  Records written: {} ({} stored)",
                run.records_written, stats.latest_run_listings
            );
        }
        None => println!("No crawl runs recorded yet."),
    }
}
