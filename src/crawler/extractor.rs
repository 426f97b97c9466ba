//! Listing extraction from route pages
//!
//! Route pages render listings asynchronously and in batches as the viewport
//! scrolls, so extraction follows a fixed protocol:
//!
//! 1. Load the route page within the page-load bound
//! 2. Wait for the reveal control to become interactable, then trigger it
//! 3. Force lazy content to materialize
//! 4. Wait for the settle interval, then until the listing count stops changing
//! 5. Query each field selector independently
//!
//! Querying before step 4 undercounts listings.

use crate::config::{CrawlerConfig, SelectorConfig};
use crate::crawler::discovery::Route;
use crate::crawler::fetcher::{load_page, FetchError, PageFetcher};
use crate::crawler::wait::Deadline;

/// Raw text per listing field, one column per selector
///
/// Columns are aligned by index but need not be the same length; the
/// operator column is the row count anchor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawListingColumns {
    pub operator: Vec<String>,
    pub vehicle_class: Vec<String>,
    pub departure: Vec<String>,
    pub duration: Vec<String>,
    pub arrival: Vec<String>,
    pub rating: Vec<String>,
    pub fare: Vec<String>,
    pub seats: Vec<String>,
}

impl RawListingColumns {
    /// Number of listings, as given by the operator column
    pub fn row_count(&self) -> usize {
        self.operator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operator.is_empty()
    }

    /// True if every column has as many entries as the operator column
    pub fn is_aligned(&self) -> bool {
        let rows = self.row_count();
        [
            &self.vehicle_class,
            &self.departure,
            &self.duration,
            &self.arrival,
            &self.rating,
            &self.fare,
            &self.seats,
        ]
        .iter()
        .all(|column| column.len() == rows)
    }
}

/// Drives a fetch session through the reveal protocol for one route at a time
pub struct ListingExtractor<'a> {
    selectors: &'a SelectorConfig,
    timing: &'a CrawlerConfig,
}

impl<'a> ListingExtractor<'a> {
    pub fn new(selectors: &'a SelectorConfig, timing: &'a CrawlerConfig) -> Self {
        Self { selectors, timing }
    }

    /// Extracts the listing columns for `route`, surfacing any failure
    ///
    /// # Errors
    ///
    /// Returns the fetch error if the page fails to load, the reveal control
    /// never becomes interactable, or a query fails.
    pub async fn try_extract(
        &self,
        fetcher: &mut dyn PageFetcher,
        route: &Route,
    ) -> Result<RawListingColumns, FetchError> {
        load_page(fetcher, &route.link, self.timing.page_load_timeout()).await?;

        let reveal = fetcher
            .wait_until_interactable(&self.selectors.reveal, self.timing.reveal_timeout())
            .await?;
        fetcher.trigger(&reveal).await?;
        fetcher.force_materialize().await?;

        let settled = self.wait_for_listings(fetcher).await?;
        tracing::trace!(route = %route.link, listings = settled, "Listing count settled");

        let columns = RawListingColumns {
            operator: query_texts(fetcher, &self.selectors.operator).await?,
            vehicle_class: query_texts(fetcher, &self.selectors.vehicle_class).await?,
            departure: query_texts(fetcher, &self.selectors.departure).await?,
            duration: query_texts(fetcher, &self.selectors.duration).await?,
            arrival: query_texts(fetcher, &self.selectors.arrival).await?,
            rating: query_texts(fetcher, &self.selectors.rating).await?,
            fare: query_texts(fetcher, &self.selectors.fare).await?,
            seats: query_texts(fetcher, &self.selectors.seats).await?,
        };

        if !columns.is_aligned() {
            tracing::debug!(
                route = %route.link,
                operators = columns.operator.len(),
                ratings = columns.rating.len(),
                seats = columns.seats.len(),
                "Listing columns differ in length"
            );
        }

        Ok(columns)
    }

    /// Extracts the listing columns for `route`, logging failures
    ///
    /// A failed route yields empty columns rather than an error.
    pub async fn extract(&self, fetcher: &mut dyn PageFetcher, route: &Route) -> RawListingColumns {
        match self.try_extract(fetcher, route).await {
            Ok(columns) => columns,
            Err(e) => {
                tracing::warn!(route = %route.link, error = %e, "Listing extraction failed");
                RawListingColumns::default()
            }
        }
    }

    /// Waits the settle interval, then polls until two consecutive operator
    /// counts agree and are non-zero or the settle timeout passes
    async fn wait_for_listings(&self, fetcher: &mut dyn PageFetcher) -> Result<usize, FetchError> {
        let settle = self.timing.settle();
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }

        let deadline = Deadline::after(self.timing.settle_timeout());
        let mut previous = None;

        loop {
            let count = fetcher.query_all(&self.selectors.operator).await?.len();
            if count > 0 && previous == Some(count) {
                return Ok(count);
            }

            if deadline.is_expired() {
                return Ok(count);
            }

            previous = Some(count);
            deadline.pause(self.timing.poll_interval()).await;
        }
    }
}

async fn query_texts(
    fetcher: &mut dyn PageFetcher,
    selector: &str,
) -> Result<Vec<String>, FetchError> {
    let elements = fetcher.query_all(selector).await?;
    Ok(elements.into_iter().map(|e| e.into_text()).collect())
}
