//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ListingSink trait
//! plus the read queries the `--stats` mode and the presentation client use.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ListingSink, StorageError, StorageResult};
use crate::storage::{ListingRecord, PriceOrder, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path` and ensures the schema
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA busy_timeout = 5000;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        let mut storage = Self { conn };
        storage.ensure_schema()?;
        Ok(storage)
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let mut storage = Self { conn };
        storage.ensure_schema()?;
        Ok(storage)
    }

    // ===== Run Queries =====

    /// Gets a run by ID
    pub fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status, records_written
                 FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    /// Gets the most recent run
    pub fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status, records_written
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    /// Counts all recorded runs
    pub fn count_runs(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Listing Queries =====

    /// Counts all stored listings
    pub fn count_listings(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM bus_info", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Counts listings stamped with `run_id`
    pub fn count_listings_for_run(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM bus_info WHERE Run_Id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Counts listings per region, largest first
    pub fn count_listings_by_region(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT State, COUNT(*) AS n FROM bus_info GROUP BY State ORDER BY n DESC, State",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Distinct route names starting with `prefix`, alphabetically
    pub fn route_names_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let pattern = format!("{}%", escape_like(prefix));
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT Route_Name FROM bus_info
             WHERE Route_Name LIKE ?1 ESCAPE '\\'
             ORDER BY Route_Name",
        )?;

        let names = stmt
            .query_map(params![pattern], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(names)
    }

    /// All listings for a route, best rated first, then by price
    pub fn listings_for_route(
        &self,
        route_name: &str,
        price_order: PriceOrder,
    ) -> StorageResult<Vec<ListingRecord>> {
        let query = format!(
            "SELECT State, Route_Name, Route_Link, Bus_Name, Bus_Type, Departing_Time,
                    Duration, Reaching_Time, Star_Rating, Price, Seat_Availability
             FROM bus_info
             WHERE Route_Name = ?1
             ORDER BY Star_Rating DESC, Price {}, Id",
            price_order.sql()
        );

        let mut stmt = self.conn.prepare(&query)?;
        let listings = stmt
            .query_map(params![route_name], listing_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(listings)
    }
}

impl ListingSink for SqliteStorage {
    fn ensure_schema(&mut self) -> StorageResult<()> {
        initialize_schema(&self.conn)?;
        Ok(())
    }

    fn append(&mut self, run_id: i64, records: &[ListingRecord]) -> StorageResult<usize> {
        // Take the write lock up front so a busy database waits here
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut written = 0;

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO bus_info
                 (Run_Id, State, Route_Name, Route_Link, Bus_Name, Bus_Type, Departing_Time,
                  Duration, Reaching_Time, Star_Rating, Price, Seat_Availability, Listing_Hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;

            for record in records {
                written += stmt.execute(params![
                    run_id,
                    record.region,
                    record.route_name,
                    record.route_link,
                    record.operator,
                    record.vehicle_class,
                    record.departure_time,
                    record.duration,
                    record.arrival_time,
                    record.rating,
                    record.fare,
                    record.seats_available,
                    record.content_hash(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(written)
    }

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        records_written: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, records_written = ?3 WHERE id = ?4",
            params![status.to_db_string(), now, records_written as i64, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Failed),
        records_written: row.get::<_, i64>(5)? as u64,
    })
}

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<ListingRecord> {
    Ok(ListingRecord {
        region: row.get(0)?,
        route_name: row.get(1)?,
        route_link: row.get(2)?,
        operator: row.get(3)?,
        vehicle_class: row.get(4)?,
        departure_time: row.get(5)?,
        duration: row.get(6)?,
        arrival_time: row.get(7)?,
        rating: row.get(8)?,
        fare: row.get(9)?,
        seats_available: row.get(10)?,
    })
}

/// Escapes LIKE wildcards so a prefix matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
