/// Crawl phase definitions for tracking where a worker is in a run
///
/// This module defines the phases a crawl worker moves through and which
/// transitions between them are legal.
use std::fmt;

/// Which scope a failure was confined to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureScope {
    /// The region landing page could not be loaded or read
    Region,
    /// A single route page could not be extracted
    Route,
}

/// Represents the current phase of a crawl worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// No run in progress
    Idle,

    /// Loading a region's entry page and discovering its routes
    PerRegion,

    /// Extracting listings from one route page
    PerRoute,

    /// Turning extracted columns into records
    Normalizing,

    /// The run buffer has been flushed to storage
    Persisted,

    /// A region or route failed; the worker recovers into the loop
    Failed(FailureScope),
}

impl CrawlPhase {
    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;

        matches!(
            (*self, next),
            (Idle, PerRegion)
                | (PerRegion, Failed(FailureScope::Region))
                | (Failed(FailureScope::Region), PerRegion)
                | (PerRegion, PerRoute)
                | (PerRoute, Failed(FailureScope::Route))
                | (Failed(FailureScope::Route), PerRoute)
                | (PerRoute, Normalizing)
                | (Normalizing, PerRoute)
                | (PerRoute, PerRegion)
                | (PerRegion, Persisted)
                | (Persisted, Idle)
        )
    }

    /// Returns true if the phase is a recoverable failure side-state
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns a stable string form used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::PerRegion => "per_region",
            Self::PerRoute => "per_route",
            Self::Normalizing => "normalizing",
            Self::Persisted => "persisted",
            Self::Failed(FailureScope::Region) => "failed_region",
            Self::Failed(FailureScope::Route) => "failed_route",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks one worker's phase and traces every transition
#[derive(Debug)]
pub struct PhaseTracker {
    scope: String,
    phase: CrawlPhase,
}

impl PhaseTracker {
    /// Creates a tracker in the idle phase; `scope` names it in log lines
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            phase: CrawlPhase::Idle,
        }
    }

    pub fn current(&self) -> CrawlPhase {
        self.phase
    }

    /// Moves to `next`, logging illegal transitions instead of panicking
    ///
    /// Re-entering the current phase is a no-op.
    pub fn advance(&mut self, next: CrawlPhase) {
        if self.phase == next {
            return;
        }

        if !self.phase.can_transition_to(next) {
            tracing::warn!(
                scope = %self.scope,
                "Unexpected phase transition {} -> {}",
                self.phase,
                next
            );
        } else {
            tracing::trace!(scope = %self.scope, "Phase {} -> {}", self.phase, next);
        }
        self.phase = next;
    }
}
