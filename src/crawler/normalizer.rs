//! Alignment of raw listing columns into typed records
//!
//! Everything here is pure: identical columns always produce identical
//! records, and malformed text falls back to a default instead of failing.

use crate::crawler::discovery::{Region, Route};
use crate::crawler::extractor::RawListingColumns;
use crate::storage::ListingRecord;

/// Builds one record per entry of the operator column
///
/// Fields whose column is shorter than the operator column take their
/// default: an empty string for text, zero for numbers.
pub fn normalize(route: &Route, region: &Region, columns: &RawListingColumns) -> Vec<ListingRecord> {
    (0..columns.row_count())
        .map(|i| ListingRecord {
            region: region.name.clone(),
            route_name: route.name.clone(),
            route_link: route.link.to_string(),
            operator: text_at(&columns.operator, i),
            vehicle_class: text_at(&columns.vehicle_class, i),
            departure_time: text_at(&columns.departure, i),
            duration: text_at(&columns.duration, i),
            arrival_time: text_at(&columns.arrival, i),
            rating: cell(&columns.rating, i).map_or(0.0, parse_rating),
            fare: cell(&columns.fare, i).map_or(0.0, parse_fare),
            seats_available: cell(&columns.seats, i).map_or(0, parse_seats),
        })
        .collect()
}

fn cell(column: &[String], index: usize) -> Option<&str> {
    column.get(index).map(String::as_str)
}

fn text_at(column: &[String], index: usize) -> String {
    cell(column, index).map(str::trim).unwrap_or_default().to_string()
}

/// Parses a star rating such as `"4.3"`, defaulting to 0.0
///
/// The whole trimmed cell must be a number; `"4.3 (120 ratings)"` is 0.0.
pub fn parse_rating(text: &str) -> f64 {
    non_negative(text.trim())
}

/// Parses a fare such as `"INR 1,234"`, defaulting to 0.0
///
/// A short currency prefix (`INR`, `Rs.`, `₹`) and thousands separators are
/// dropped, and what remains must be a number: `"INR 1,234 onwards"` is 0.0.
///
/// # Example
///
/// ```
/// use bus_crawler::crawler::parse_fare;
///
/// assert_eq!(parse_fare("INR 1,234"), 1234.0);
/// assert_eq!(parse_fare("₹ 899.50"), 899.5);
/// assert_eq!(parse_fare("garbage"), 0.0);
/// assert_eq!(parse_fare("INR 1,234 onwards"), 0.0);
/// ```
pub fn parse_fare(text: &str) -> f64 {
    let cleaned: String = text.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim();

    let Some(start) = cleaned.find(|c: char| c.is_ascii_digit()) else {
        return 0.0;
    };

    let prefix = &cleaned[..start];
    let mut start = start;
    if prefix == "." {
        // A bare leading decimal point belongs to the number
        start = 0;
    } else if !is_currency_prefix(prefix) {
        return 0.0;
    }

    non_negative(cleaned[start..].trim())
}

fn non_negative(number: &str) -> f64 {
    number
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
        .unwrap_or(0.0)
}

/// An empty prefix, or one short token made of letters, symbols and dots
fn is_currency_prefix(prefix: &str) -> bool {
    let token = prefix.trim();
    if token.is_empty() {
        return true;
    }

    token.chars().count() <= 4
        && !token.contains(char::is_whitespace)
        && token
            .chars()
            .all(|c| c.is_alphabetic() || c == '.' || c == '$' || !c.is_ascii())
}

/// Parses a seat count such as `"12 Seats available"`, defaulting to 0
pub fn parse_seats(text: &str) -> u32 {
    text.split_whitespace()
        .next()
        .and_then(|token| token.parse::<u32>().ok())
        .unwrap_or(0)
}
