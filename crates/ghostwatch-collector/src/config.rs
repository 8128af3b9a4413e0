use std::time::Duration;

use ghostwatch_core::AppConfig;

use crate::retry::RetryPolicy;

/// Tuning for one collection run.
///
/// Production values come from [`CollectorConfig::from_app_config`]; tests
/// start from [`CollectorConfig::default`] and call
/// [`CollectorConfig::without_pacing`].
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Base settle time after each scroll action.
    pub scroll_pause: Duration,
    /// Randomize settle times by ±25%.
    pub jitter: bool,
    pub checkpoint_interval: Duration,
    /// Wall-clock ceiling for the whole loop.
    pub max_duration: Duration,
    /// Rotate scroll technique every this many no-growth iterations.
    pub rotate_after_stalls: u32,
    /// No-growth iterations tolerated before giving up (after `min_iterations`).
    pub stall_ceiling: u32,
    pub min_iterations: u32,
    /// Consecutive at-bottom observations required to call the list finished.
    pub bottom_confirmations: u32,
    /// Pixels from the scroll extent still counted as "at the bottom".
    pub bottom_epsilon_px: f64,
    /// Total stale failures before the circuit breaker trips.
    pub stale_ceiling: u32,
    /// Consecutive stale failures before a page refresh.
    pub stale_escalation: u32,
    pub max_page_refreshes: u32,
    pub max_reauth_attempts: u32,
    /// Fraction of the page-reported total treated as complete.
    pub expected_total_ratio: f64,
    /// Iterations with an unchanged scroll height before re-locating the container.
    pub height_stagnation_limit: u32,
    pub retry: RetryPolicy,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            scroll_pause: Duration::from_millis(2500),
            jitter: true,
            checkpoint_interval: Duration::from_secs(60),
            max_duration: Duration::from_secs(3 * 60 * 60),
            rotate_after_stalls: 3,
            stall_ceiling: 18,
            min_iterations: 10,
            bottom_confirmations: 3,
            bottom_epsilon_px: 5.0,
            stale_ceiling: 15,
            stale_escalation: 3,
            max_page_refreshes: 3,
            max_reauth_attempts: 2,
            expected_total_ratio: 0.95,
            height_stagnation_limit: 3,
            retry: RetryPolicy::default(),
        }
    }
}

impl CollectorConfig {
    #[must_use]
    pub fn from_app_config(app: &AppConfig) -> Self {
        Self {
            scroll_pause: Duration::from_millis(app.scroll_pause_ms),
            checkpoint_interval: Duration::from_secs(app.checkpoint_interval_secs),
            max_duration: Duration::from_secs(app.max_collection_secs),
            rotate_after_stalls: app.rotate_after_stalls.max(1),
            stall_ceiling: app.stall_ceiling,
            min_iterations: app.min_iterations,
            bottom_confirmations: app.bottom_confirmations.max(1),
            stale_ceiling: app.stale_ceiling,
            stale_escalation: app.stale_escalation,
            max_page_refreshes: app.max_page_refreshes,
            max_reauth_attempts: app.max_reauth_attempts,
            expected_total_ratio: app.expected_total_ratio,
            retry: RetryPolicy::new(
                app.max_retries,
                Duration::from_millis(app.retry_backoff_base_ms),
            ),
            ..Self::default()
        }
    }

    /// Removes every sleep: zero settle time, zero back-off, no jitter.
    #[must_use]
    pub fn without_pacing(mut self) -> Self {
        self.scroll_pause = Duration::ZERO;
        self.jitter = false;
        self.retry.backoff_base = Duration::ZERO;
        self.retry.max_delay = Duration::ZERO;
        self.retry.jitter = false;
        self
    }
}
