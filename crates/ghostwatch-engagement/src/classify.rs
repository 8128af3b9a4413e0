use serde::Serialize;

use crate::types::{EngagementMetrics, GhostCategory};

/// Default score below which a follower counts as a ghost.
pub const DEFAULT_GHOST_THRESHOLD: f64 = 0.1;
pub const PROBABLE_GHOST_BELOW: f64 = 0.05;
pub const POSSIBLE_GHOST_BELOW: f64 = 0.10;

/// Followers split around a single score threshold.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GhostClassification<'a> {
    pub ghost_followers: Vec<&'a EngagementMetrics>,
    pub active_followers: Vec<&'a EngagementMetrics>,
}

/// Ghost followers bucketed by how sure we are.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GhostCategories<'a> {
    pub definite: Vec<&'a EngagementMetrics>,
    pub probable: Vec<&'a EngagementMetrics>,
    pub possible: Vec<&'a EngagementMetrics>,
}

impl GhostCategories<'_> {
    #[must_use]
    pub fn total(&self) -> usize {
        self.definite.len() + self.probable.len() + self.possible.len()
    }
}

/// Splits `metrics` into ghosts (`score < threshold`) and active followers.
#[must_use]
pub fn classify(metrics: &[EngagementMetrics], threshold: f64) -> GhostClassification<'_> {
    let (ghost_followers, active_followers): (Vec<_>, Vec<_>) = metrics
        .iter()
        .partition(|m| m.engagement_score < threshold);
    GhostClassification {
        ghost_followers,
        active_followers,
    }
}

/// A follower with no interactions at all is a definite ghost whatever its
/// score; the score thresholds only apply after that check.
#[must_use]
pub fn category_of(m: &EngagementMetrics) -> GhostCategory {
    if m.has_no_interactions() {
        GhostCategory::DefiniteGhost
    } else if m.engagement_score < PROBABLE_GHOST_BELOW {
        GhostCategory::ProbableGhost
    } else if m.engagement_score < POSSIBLE_GHOST_BELOW {
        GhostCategory::PossibleGhost
    } else {
        GhostCategory::Active
    }
}

#[must_use]
pub fn categorize(metrics: &[EngagementMetrics]) -> GhostCategories<'_> {
    let mut out = GhostCategories::default();
    for m in metrics {
        match category_of(m) {
            GhostCategory::DefiniteGhost => out.definite.push(m),
            GhostCategory::ProbableGhost => out.probable.push(m),
            GhostCategory::PossibleGhost => out.possible.push(m),
            GhostCategory::Active => {}
        }
    }
    out
}
