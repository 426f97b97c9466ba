//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Bus-Crawler database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    records_written INTEGER NOT NULL DEFAULT 0
);

-- One row per crawled departure
CREATE TABLE IF NOT EXISTS bus_info (
    Id INTEGER PRIMARY KEY AUTOINCREMENT,
    Run_Id INTEGER REFERENCES runs(id),
    State TEXT NOT NULL,
    Route_Name TEXT NOT NULL,
    Route_Link TEXT NOT NULL,
    Bus_Name TEXT NOT NULL,
    Bus_Type TEXT NOT NULL,
    Departing_Time TEXT NOT NULL,
    Duration TEXT NOT NULL,
    Reaching_Time TEXT NOT NULL,
    Star_Rating REAL NOT NULL DEFAULT 0,
    Price REAL NOT NULL DEFAULT 0,
    Seat_Availability INTEGER NOT NULL DEFAULT 0,
    Listing_Hash TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bus_info_route_name ON bus_info(Route_Name);
CREATE INDEX IF NOT EXISTS idx_bus_info_route_rating_price ON bus_info(Route_Name, Star_Rating, Price);
CREATE INDEX IF NOT EXISTS idx_bus_info_run ON bus_info(Run_Id);
CREATE INDEX IF NOT EXISTS idx_bus_info_hash ON bus_info(Listing_Hash);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
