//! Seeded generator for plausible engagement source data.
//!
//! Only compiled for tests or with the `fixtures` feature. Nothing in the
//! scoring path depends on it.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};

use crate::sources::{
    ActivityCheck, CommentBlock, CommentEntry, EngagementSources, LikeBlock, PostEngagement,
    ReelEngagement, StoryEngagement,
};

const POSTS: usize = 5;
const REELS: usize = 3;
const MAX_ACTIVITY_CHECKS: usize = 50;
const ACTIVE_PROBABILITY: f64 = 0.2;

const COMMENT_TEXTS: [&str; 6] = [
    "love this",
    "great shot",
    "so good",
    "wow",
    "amazing",
    "need this",
];

/// Generates five posts, one story, three reels and up to fifty presence
/// checks drawn from `usernames`. The same `seed` always yields the same data.
#[must_use]
pub fn simulate(usernames: &[String], seed: u64, now: DateTime<Utc>) -> EngagementSources {
    let mut rng = StdRng::seed_from_u64(seed);
    let stamp = |hours_ago: i64| (now - Duration::hours(hours_ago)).to_rfc3339();

    let posts = (0..POSTS)
        .map(|i| {
            let likers = pick(&mut rng, usernames, 10, 50);
            let comments = random_comments(&mut rng, usernames, 10);
            PostEngagement {
                post_id: Some(format!("post_{i}")),
                url: Some(format!("https://www.instagram.com/p/post_{i}/")),
                timestamp: Some(stamp(hours(i, 48))),
                likes: LikeBlock {
                    count: likers.len() as u64,
                    usernames: likers,
                },
                view_count: rng.random_bool(0.5).then(|| rng.random_range(100..=500)),
                comments,
            }
        })
        .collect();

    let viewers = pick(&mut rng, usernames, 20, 100);
    let stories = vec![StoryEngagement {
        story_id: Some("story_0".into()),
        timestamp: Some(stamp(6)),
        viewer_count: viewers.len() as u64,
        viewers,
    }];

    let reels = (0..REELS)
        .map(|i| {
            let likers = pick(&mut rng, usernames, 15, 70);
            let comments = random_comments(&mut rng, usernames, 15);
            ReelEngagement {
                reel_id: Some(format!("reel_{i}")),
                url: Some(format!("https://www.instagram.com/reel/reel_{i}/")),
                timestamp: Some(stamp(hours(i, 72))),
                likes: LikeBlock {
                    count: likers.len() as u64,
                    usernames: likers,
                },
                view_count: Some(rng.random_range(200..=1000)),
                comments,
            }
        })
        .collect();

    let checked = pick(&mut rng, usernames, MAX_ACTIVITY_CHECKS, MAX_ACTIVITY_CHECKS);
    let checked_at = stamp(0);
    let activity = checked
        .into_iter()
        .map(|username| ActivityCheck {
            username,
            timestamp: Some(checked_at.clone()),
            is_active: rng.random_bool(ACTIVE_PROBABILITY),
        })
        .collect();

    EngagementSources {
        posts,
        stories,
        reels,
        activity,
    }
}

fn hours(index: usize, spacing: i64) -> i64 {
    i64::try_from(index).map_or(0, |i| i * spacing)
}

/// Picks between `lo` and `hi` distinct usernames, both capped at the pool size.
fn pick(rng: &mut StdRng, pool: &[String], lo: usize, hi: usize) -> Vec<String> {
    let hi = hi.min(pool.len());
    let lo = lo.min(hi);
    let amount = rng.random_range(lo..=hi);
    sample(rng, pool.len(), amount)
        .into_iter()
        .map(|i| pool[i].clone())
        .collect()
}

fn random_comments(rng: &mut StdRng, pool: &[String], max: usize) -> CommentBlock {
    let authors = pick(rng, pool, 0, max);
    let comments: Vec<CommentEntry> = authors
        .into_iter()
        .map(|username| CommentEntry {
            username: Some(username),
            text: Some(COMMENT_TEXTS[rng.random_range(0..COMMENT_TEXTS.len())].to_string()),
        })
        .collect();
    CommentBlock {
        count: comments.len() as u64,
        comments,
    }
}
