//! Follower engagement aggregation and ghost classification.
//!
//! Source files on disk become [`EngagementEvent`]s, which the
//! [`EngagementAggregator`] folds into per-follower [`EngagementMetrics`].
//! Scores are computed once all events are folded, then split into ghost
//! tiers and exported as CSV.

pub mod aggregate;
pub mod classify;
pub mod error;
pub mod export;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod scorer;
pub mod sources;
pub mod types;

pub use aggregate::{aggregate, EngagementAggregator};
pub use classify::{
    categorize, category_of, classify, GhostCategories, GhostClassification,
    DEFAULT_GHOST_THRESHOLD,
};
pub use error::EngagementError;
pub use export::{export_reports, sorted_by_score, ReportPaths};
pub use scorer::{engagement_score, rate, recency_factor};
pub use sources::{parse_timestamp, EngagementSources};
pub use types::{EngagementEvent, EngagementMetrics, EventKind, GhostCategory};
