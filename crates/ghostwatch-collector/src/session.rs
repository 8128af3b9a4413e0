use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ghostwatch_core::Record;
use uuid::Uuid;

/// Cooperative cancellation shared between the caller and a running loop.
///
/// Checked at the top of every iteration; the loop still writes its final
/// checkpoint after observing it.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Identity and starting state of one collection run.
#[derive(Debug, Clone)]
pub struct CollectionSession {
    pub id: String,
    pub target: String,
    pub started_at: DateTime<Utc>,
    /// Records carried over from an earlier checkpoint.
    pub seed: Vec<Record>,
    /// Overrides the count the page advertises, when known from elsewhere.
    pub expected_total: Option<u64>,
}

impl CollectionSession {
    /// A fresh session with a new random id.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            target: target.into(),
            started_at: Utc::now(),
            seed: Vec::new(),
            expected_total: None,
        }
    }

    /// Continues from `seed` under a new session id.
    ///
    /// Seed records keep their order and win over anything collected later.
    #[must_use]
    pub fn resume(target: impl Into<String>, seed: Vec<Record>) -> Self {
        Self {
            seed,
            ..Self::new(target)
        }
    }

    #[must_use]
    pub fn with_expected_total(mut self, total: u64) -> Self {
        self.expected_total = Some(total);
        self
    }
}
