//! Storage traits and error types
//!
//! This module defines the sink interface the crawl pipeline writes through
//! and the associated error types.

use crate::storage::{ListingRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable destination for listing batches
///
/// Reads are deliberately absent; querying stored listings belongs to the
/// presentation client.
pub trait ListingSink {
    /// Creates the backing tables and indexes if they do not exist
    ///
    /// Safe to call before every run.
    fn ensure_schema(&mut self) -> StorageResult<()>;

    /// Appends a batch of records stamped with `run_id`
    ///
    /// # Returns
    ///
    /// The number of rows written
    fn append(&mut self, run_id: i64, records: &[ListingRecord]) -> StorageResult<usize>;

    /// Creates a new crawl run in the `running` state
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file that drives the run
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Marks a run finished with its final status and record count
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        records_written: u64,
    ) -> StorageResult<()>;
}
