//! Decides when the follower list has been exhausted.
//!
//! The detector is pure: it folds one [`ListObservation`] per iteration into
//! a small amount of state and answers with a [`StopReason`] once any
//! end-of-list signal holds. Signals are checked from strongest to weakest.

use std::fmt;

use crate::config::CollectorConfig;
use crate::surface::ScrollMetrics;

/// Why the collection loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The page showed an explicit end-of-results marker.
    EndMarker,
    /// Scroll position held at the extent with nothing loading.
    ScrolledToEnd,
    /// Collected count reached the advertised total.
    ExpectedTotalReached,
    /// Too long without growth.
    StallCeiling,
    /// Too many stale-handle failures in total.
    StaleCircuitBreaker,
    /// The list container could not be recovered.
    ContainerLost,
    /// Re-authentication did not succeed.
    RecoveryFailed,
    Timeout,
    Cancelled,
    Fatal(String),
}

impl StopReason {
    /// `true` when the list was read to its end rather than abandoned.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            StopReason::EndMarker | StopReason::ScrolledToEnd | StopReason::ExpectedTotalReached
        )
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            StopReason::EndMarker => "end_marker",
            StopReason::ScrolledToEnd => "scrolled_to_end",
            StopReason::ExpectedTotalReached => "expected_total_reached",
            StopReason::StallCeiling => "stall_ceiling",
            StopReason::StaleCircuitBreaker => "stale_circuit_breaker",
            StopReason::ContainerLost => "container_lost",
            StopReason::RecoveryFailed => "recovery_failed",
            StopReason::Timeout => "timeout",
            StopReason::Cancelled => "cancelled",
            StopReason::Fatal(_) => "fatal",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Fatal(msg) => write!(f, "fatal: {msg}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// What the loop saw in one iteration, after harvesting.
#[derive(Debug, Clone, Copy)]
pub struct ListObservation {
    pub iteration: u32,
    pub metrics: ScrollMetrics,
    pub loading: bool,
    pub end_marker: bool,
    pub collected: usize,
    pub expected_total: Option<u64>,
    pub consecutive_no_growth: u32,
}

#[derive(Debug, Clone)]
pub struct EndOfListDetector {
    epsilon: f64,
    bottom_confirmations: u32,
    expected_ratio: f64,
    stall_ceiling: u32,
    min_iterations: u32,
    bottom_streak: u32,
}

impl EndOfListDetector {
    #[must_use]
    pub fn new(config: &CollectorConfig) -> Self {
        Self {
            epsilon: config.bottom_epsilon_px,
            bottom_confirmations: config.bottom_confirmations.max(1),
            expected_ratio: config.expected_total_ratio,
            stall_ceiling: config.stall_ceiling,
            min_iterations: config.min_iterations,
            bottom_streak: 0,
        }
    }

    #[must_use]
    pub fn bottom_streak(&self) -> u32 {
        self.bottom_streak
    }

    /// Folds in one observation and returns a stop reason once the list is done.
    pub fn observe(&mut self, obs: &ListObservation) -> Option<StopReason> {
        let settled_at_end = obs.metrics.is_at_end(self.epsilon)
            && !obs.loading
            && obs.consecutive_no_growth > 0;
        if settled_at_end {
            self.bottom_streak += 1;
        } else {
            self.bottom_streak = 0;
        }

        if obs.end_marker {
            return Some(StopReason::EndMarker);
        }
        if self.bottom_streak >= self.bottom_confirmations {
            return Some(StopReason::ScrolledToEnd);
        }
        if self.expected_total_reached(obs) {
            return Some(StopReason::ExpectedTotalReached);
        }
        if obs.consecutive_no_growth > self.stall_ceiling && obs.iteration >= self.min_iterations {
            return Some(StopReason::StallCeiling);
        }
        None
    }

    // Advisory only: the advertised count is rounded and lags, so it must be
    // corroborated by an iteration that found nothing new.
    fn expected_total_reached(&self, obs: &ListObservation) -> bool {
        let Some(total) = obs.expected_total.filter(|t| *t > 0) else {
            return false;
        };
        #[allow(clippy::cast_precision_loss)]
        let (collected, total) = (obs.collected as f64, total as f64);
        obs.consecutive_no_growth > 0 && collected >= total * self.expected_ratio
    }
}
