use chrono::{DateTime, Utc};

use crate::types::EngagementMetrics;

pub const LIKE_WEIGHT: f64 = 0.3;
pub const COMMENT_WEIGHT: f64 = 0.3;
pub const STORY_WEIGHT: f64 = 0.2;
pub const REEL_WEIGHT: f64 = 0.1;
pub const ACTIVITY_WEIGHT: f64 = 0.1;

/// Per-day decay rate of the recency factor.
pub const RECENCY_DECAY: f64 = 0.1;

/// `numerator / max(1, denominator)`. Content a follower never saw scores
/// zero on that term rather than being undefined.
#[must_use]
pub fn rate(numerator: u32, denominator: u32) -> f64 {
    f64::from(numerator) / f64::from(denominator.max(1))
}

/// `exp(-0.1 * days)` since the last engagement, or `1.0` when there was none.
///
/// Whole days only, and engagement stamped after `now` counts as today.
#[must_use]
pub fn recency_factor(last_engagement: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(last) = last_engagement else {
        return 1.0;
    };
    let days = (now - last).num_days().max(0);
    #[allow(clippy::cast_precision_loss)]
    let days = days as f64;
    (-RECENCY_DECAY * days).exp()
}

/// Weighted engagement rates scaled by the recency factor.
#[must_use]
pub fn engagement_score(m: &EngagementMetrics, now: DateTime<Utc>) -> f64 {
    let weighted = LIKE_WEIGHT * rate(m.like_count, m.posts_seen)
        + COMMENT_WEIGHT * rate(m.comment_count, m.posts_seen)
        + STORY_WEIGHT * rate(m.story_view_count, m.stories_seen)
        + REEL_WEIGHT * rate(m.reel_engagement_count, m.reels_seen)
        + ACTIVITY_WEIGHT * rate(m.active_now_count, m.activity_checks);
    recency_factor(m.last_engagement, now) * weighted
}
