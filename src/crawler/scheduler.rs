//! Scheduler for handing regions to crawl workers
//!
//! This module handles:
//! - The shared queue of regions not yet claimed by a worker
//! - Guaranteeing each region is claimed by exactly one worker
//! - Refusing new work once the run is cancelled

use crate::crawler::discovery::Region;
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Queue of regions shared by every worker of a run
///
/// Regions are handed out in configuration order. Each region goes to
/// exactly one worker, which then walks all of its routes in page order.
pub struct RegionQueue {
    /// Regions not yet claimed
    pending: Mutex<VecDeque<Region>>,

    /// Run-scoped cancellation signal
    cancel: CancellationToken,
}

impl RegionQueue {
    /// Creates a queue holding `regions` in order
    pub fn new(regions: Vec<Region>, cancel: CancellationToken) -> Self {
        Self {
            pending: Mutex::new(VecDeque::from(regions)),
            cancel,
        }
    }

    /// Claims the next region
    ///
    /// # Returns
    ///
    /// * `Some(Region)` - A region no other worker has claimed
    /// * `None` - The queue is drained or the run was cancelled
    pub async fn next_region(&self) -> Option<Region> {
        if self.cancel.is_cancelled() {
            return None;
        }

        let region = self.pending.lock().await.pop_front();
        if let Some(region) = &region {
            tracing::debug!(region = %region.name, "Region claimed");
        }
        region
    }

    /// Number of regions not yet claimed
    pub async fn remaining(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// True once the run-scoped cancellation signal has been raised
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
