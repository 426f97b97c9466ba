//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Appending listing batches stamped with their crawl run
//! - Run tracking (start, finish, status, record count)
//! - Read helpers for the presentation client's access patterns

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{ListingSink, StorageError, StorageResult};

use sha2::{Digest, Sha256};
use std::path::Path;

/// Opens a storage database, creating the schema if needed
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// One departure on a route, as persisted in `bus_info`
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRecord {
    pub region: String,
    pub route_name: String,
    pub route_link: String,
    pub operator: String,
    pub vehicle_class: String,
    pub departure_time: String,
    pub duration: String,
    pub arrival_time: String,
    pub rating: f64,
    pub fare: f64,
    pub seats_available: u32,
}

impl ListingRecord {
    /// Hex SHA-256 over the fields that identify a listing across runs
    ///
    /// Covers region, route link, operator, departure time and fare.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            self.region.as_str(),
            self.route_link.as_str(),
            self.operator.as_str(),
            self.departure_time.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        hasher.update(self.fare.to_bits().to_be_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub records_written: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Secondary sort on price for route listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceOrder {
    #[default]
    LowToHigh,
    HighToLow,
}

impl PriceOrder {
    fn sql(&self) -> &'static str {
        match self {
            Self::LowToHigh => "ASC",
            Self::HighToLow => "DESC",
        }
    }
}
