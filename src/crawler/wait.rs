//! Bounded polling for conditions on a rendered page

use std::time::Duration;
use tokio::time::Instant;

/// A point in time after which a poll loop must give up
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            expires_at: Instant::now() + timeout,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Sleeps for `interval`, or until the deadline if that comes first
    pub async fn pause(&self, interval: Duration) {
        let nap = interval.min(self.remaining());
        if !nap.is_zero() {
            tokio::time::sleep(nap).await;
        }
    }
}
