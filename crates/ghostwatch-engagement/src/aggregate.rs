use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::scorer::engagement_score;
use crate::types::{EngagementEvent, EngagementMetrics, EventKind};

/// Folds engagement events into per-follower counters.
///
/// Only followers in the universe given to [`EngagementAggregator::new`] are
/// tracked; events about anyone else are counted as skipped. Scores are not
/// computed until [`EngagementAggregator::finish`].
#[derive(Debug)]
pub struct EngagementAggregator {
    metrics: Vec<EngagementMetrics>,
    index: HashMap<String, usize>,
    folded: usize,
    skipped: usize,
}

impl EngagementAggregator {
    pub fn new<I, S>(entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut metrics = Vec::new();
        let mut index = HashMap::new();
        for entity in entities {
            let username = entity.into();
            if index.contains_key(&username) {
                continue;
            }
            index.insert(username.clone(), metrics.len());
            metrics.push(EngagementMetrics::new(username));
        }
        Self {
            metrics,
            index,
            folded: 0,
            skipped: 0,
        }
    }

    /// Applies one event. Returns `false` if its subject is not tracked.
    pub fn fold(&mut self, event: &EngagementEvent) -> bool {
        let Some(&slot) = self.index.get(&event.subject) else {
            self.skipped += 1;
            return false;
        };
        let m = &mut self.metrics[slot];

        match event.kind {
            EventKind::Like => {
                m.like_count += 1;
                m.posts_seen += 1;
                m.touch(event.timestamp);
            }
            EventKind::Comment => {
                m.comment_count += 1;
                m.posts_seen += 1;
                m.touch(event.timestamp);
            }
            EventKind::StoryView => {
                m.story_view_count += 1;
                m.stories_seen += 1;
                m.touch(event.timestamp);
            }
            EventKind::ReelEngagement => {
                m.reel_engagement_count += 1;
                m.reels_seen += 1;
                m.touch(event.timestamp);
            }
            EventKind::PresencePing { active } => {
                m.activity_checks += 1;
                if active {
                    m.active_now_count += 1;
                    m.touch(event.timestamp);
                }
            }
        }

        self.folded += 1;
        true
    }

    pub fn fold_all<'a, I>(&mut self, events: I)
    where
        I: IntoIterator<Item = &'a EngagementEvent>,
    {
        for event in events {
            self.fold(event);
        }
    }

    #[must_use]
    pub fn folded(&self) -> usize {
        self.folded
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Scores every follower against `now` and returns the metrics in the
    /// order the universe was given.
    #[must_use]
    pub fn finish(self, now: DateTime<Utc>) -> Vec<EngagementMetrics> {
        if self.skipped > 0 {
            tracing::debug!(
                skipped = self.skipped,
                "events for accounts outside the follower list were ignored"
            );
        }
        let mut metrics = self.metrics;
        for m in &mut metrics {
            m.engagement_score = engagement_score(m, now);
        }
        metrics
    }
}

/// Builds scored metrics for `entities` from `events` in one pass.
pub fn aggregate<'a, I, S, E>(entities: I, events: E, now: DateTime<Utc>) -> Vec<EngagementMetrics>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    E: IntoIterator<Item = &'a EngagementEvent>,
{
    let mut aggregator = EngagementAggregator::new(entities);
    aggregator.fold_all(events);
    tracing::info!(
        followers = aggregator.metrics.len(),
        events = aggregator.folded(),
        skipped = aggregator.skipped(),
        "engagement aggregated"
    );
    aggregator.finish(now)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn event(kind: EventKind, who: &str, at: DateTime<Utc>) -> EngagementEvent {
        EngagementEvent::new(kind, who, Some(at))
    }

    #[test]
    fn likes_and_comments_both_count_a_post_as_seen() {
        let now = Utc::now();
        let events = vec![
            event(EventKind::Like, "alice", now),
            event(EventKind::Comment, "alice", now),
        ];
        let metrics = aggregate(["alice"], &events, now);
        let alice = &metrics[0];
        assert_eq!(alice.like_count, 1);
        assert_eq!(alice.comment_count, 1);
        assert_eq!(alice.posts_seen, 2);
    }

    #[test]
    fn unknown_subjects_are_skipped() {
        let now = Utc::now();
        let mut agg = EngagementAggregator::new(["alice"]);
        assert!(!agg.fold(&event(EventKind::Like, "mallory", now)));
        assert!(agg.fold(&event(EventKind::Like, "alice", now)));
        assert_eq!(agg.skipped(), 1);
        assert_eq!(agg.folded(), 1);
        let metrics = agg.finish(now);
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].like_count, 1);
    }

    #[test]
    fn last_engagement_is_the_newest_not_the_last_seen() {
        let now = Utc::now();
        let newer = now - Duration::days(1);
        let older = now - Duration::days(9);
        let events = vec![
            event(EventKind::StoryView, "bob", newer),
            event(EventKind::ReelEngagement, "bob", older),
        ];
        let metrics = aggregate(["bob"], &events, now);
        assert_eq!(metrics[0].last_engagement, Some(newer));
        assert_eq!(metrics[0].stories_seen, 1);
        assert_eq!(metrics[0].reels_seen, 1);
    }

    #[test]
    fn inactive_pings_count_checks_only() {
        let now = Utc::now();
        let events = vec![
            event(EventKind::PresencePing { active: false }, "carol", now),
            event(EventKind::PresencePing { active: true }, "carol", now - Duration::days(2)),
            event(EventKind::PresencePing { active: false }, "carol", now),
        ];
        let metrics = aggregate(["carol"], &events, now);
        let carol = &metrics[0];
        assert_eq!(carol.activity_checks, 3);
        assert_eq!(carol.active_now_count, 1);
        assert_eq!(carol.last_engagement, Some(now - Duration::days(2)));
    }

    #[test]
    fn universe_order_is_kept_and_duplicates_collapse() {
        let now = Utc::now();
        let none: Vec<EngagementEvent> = Vec::new();
        let metrics = aggregate(["zed", "amy", "zed"], &none, now);
        let names: Vec<&str> = metrics.iter().map(|m| m.username.as_str()).collect();
        assert_eq!(names, vec!["zed", "amy"]);
        assert!(metrics.iter().all(|m| m.engagement_score.abs() < f64::EPSILON));
    }
}
