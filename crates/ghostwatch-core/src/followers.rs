//! Follower-level statistics and preliminary categorization.
//!
//! Everything here works on profile data from the enrichment pass. Records
//! that were never analyzed only contribute to the username-based checks.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::records::{AccountType, FollowerSnapshot, Record, RecordSet};

const BOT_USERNAME_PATTERNS: &[&str] = &["bot", "follow", "gram", "like"];
const HIGH_FOLLOWER_THRESHOLD: u64 = 10_000;

/// Returns `true` when a username looks machine-generated.
///
/// Matches either a known spam fragment or a long alphanumeric handle that
/// contains at least one digit.
#[must_use]
pub fn is_potential_bot(username: &str) -> bool {
    let lower = username.to_lowercase();
    if BOT_USERNAME_PATTERNS.iter().any(|p| lower.contains(p)) {
        return true;
    }
    lower.chars().count() >= 10
        && lower.chars().all(char::is_alphanumeric)
        && lower.chars().any(|c| c.is_ascii_digit())
}

/// Following many, followed by few, posting almost nothing.
#[must_use]
pub fn has_low_engagement_potential(record: &Record) -> bool {
    let following = record.following_count.unwrap_or(0);
    let followers = record.followers_count.unwrap_or(0);
    let posts = record.posts_count.unwrap_or(0);

    #[allow(clippy::cast_precision_loss)]
    let ratio = following as f64 / followers.max(1) as f64;
    following > 1000 && (followers < 100 || ratio > 10.0) && posts < 10
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccountTypeBreakdown {
    pub personal: usize,
    pub business: usize,
    pub creator: usize,
    pub unknown: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrivacyBreakdown {
    pub private: usize,
    pub public: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FollowerStatistics {
    pub total_followers: usize,
    pub analyzed_profiles: usize,
    pub account_types: AccountTypeBreakdown,
    pub privacy_status: PrivacyBreakdown,
    pub potential_bots: usize,
    pub high_follower_accounts: usize,
    pub low_engagement_potential: usize,
    pub avg_followers: f64,
    pub avg_following: f64,
    pub avg_posts: f64,
}

/// Summarizes a follower list.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn follower_statistics(records: &[Record]) -> FollowerStatistics {
    let mut stats = FollowerStatistics {
        total_followers: records.len(),
        ..FollowerStatistics::default()
    };

    let mut total_followers = 0u64;
    let mut total_following = 0u64;
    let mut total_posts = 0u64;

    for record in records {
        if is_potential_bot(&record.username) {
            stats.potential_bots += 1;
        }
        if !record.detailed_profile_analyzed {
            continue;
        }
        stats.analyzed_profiles += 1;

        match record.account_type.unwrap_or(AccountType::Unknown) {
            AccountType::Personal => stats.account_types.personal += 1,
            AccountType::Business => stats.account_types.business += 1,
            AccountType::Creator => stats.account_types.creator += 1,
            AccountType::Unknown => stats.account_types.unknown += 1,
        }

        if record.is_private.unwrap_or(false) {
            stats.privacy_status.private += 1;
        } else {
            stats.privacy_status.public += 1;
        }

        let followers = record.followers_count.unwrap_or(0);
        total_followers = total_followers.saturating_add(followers);
        total_following = total_following.saturating_add(record.following_count.unwrap_or(0));
        total_posts = total_posts.saturating_add(record.posts_count.unwrap_or(0));

        if followers > HIGH_FOLLOWER_THRESHOLD {
            stats.high_follower_accounts += 1;
        }
        if has_low_engagement_potential(record) {
            stats.low_engagement_potential += 1;
        }
    }

    if stats.analyzed_profiles > 0 {
        let n = stats.analyzed_profiles as f64;
        stats.avg_followers = total_followers as f64 / n;
        stats.avg_following = total_following as f64 / n;
        stats.avg_posts = total_posts as f64 / n;
    }

    stats
}

/// Username lists per preliminary category. Only analyzed profiles are placed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FollowerCategories {
    pub potential_bots: Vec<String>,
    pub business_accounts: Vec<String>,
    pub creator_accounts: Vec<String>,
    pub private_accounts: Vec<String>,
    pub public_personal_accounts: Vec<String>,
    pub high_follower_accounts: Vec<String>,
    pub low_engagement_potential: Vec<String>,
}

#[must_use]
pub fn categorize_followers(records: &[Record]) -> FollowerCategories {
    let mut categories = FollowerCategories::default();

    for record in records.iter().filter(|r| r.detailed_profile_analyzed) {
        let name = || record.username.clone();

        if is_potential_bot(&record.username) {
            categories.potential_bots.push(name());
        }

        let account_type = record.account_type.unwrap_or(AccountType::Unknown);
        match account_type {
            AccountType::Business => categories.business_accounts.push(name()),
            AccountType::Creator => categories.creator_accounts.push(name()),
            AccountType::Personal | AccountType::Unknown => {}
        }

        if record.is_private.unwrap_or(false) {
            categories.private_accounts.push(name());
        } else if account_type == AccountType::Personal {
            categories.public_personal_accounts.push(name());
        }

        if record.followers_count.unwrap_or(0) > HIGH_FOLLOWER_THRESHOLD {
            categories.high_follower_accounts.push(name());
        }
        if has_low_engagement_potential(record) {
            categories.low_engagement_potential.push(name());
        }
    }

    categories
}

/// Unions several record lists, keeping the first record seen per username.
#[must_use]
pub fn merge_records<'a>(sources: impl IntoIterator<Item = &'a [Record]>) -> RecordSet {
    let mut merged = RecordSet::new();
    for source in sources {
        for record in source {
            merged.insert(record.clone());
        }
    }
    merged
}

/// Merges several snapshots of the same account into one, oldest first.
///
/// Snapshots are ordered by collection time before merging so the earliest
/// sighting of each follower is the one kept.
#[must_use]
pub fn merge_snapshots(
    target: &str,
    snapshots: &[FollowerSnapshot],
    merged_at: DateTime<Utc>,
) -> FollowerSnapshot {
    let mut ordered: Vec<&FollowerSnapshot> = snapshots.iter().collect();
    ordered.sort_by_key(|s| s.collection_timestamp);
    let merged = merge_records(ordered.iter().map(|s| s.followers.as_slice()));
    FollowerSnapshot::new(target, merged.into_vec(), merged_at)
}
