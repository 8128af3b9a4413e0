//! Collected follower records and the insertion-ordered dedup set that holds them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account classification shown on a profile page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Personal,
    Business,
    Creator,
    Unknown,
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountType::Personal => write!(f, "personal"),
            AccountType::Business => write!(f, "business"),
            AccountType::Creator => write!(f, "creator"),
            AccountType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Profile details gathered by the enrichment pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDetails {
    pub posts_count: u64,
    pub followers_count: u64,
    pub following_count: u64,
    pub account_type: AccountType,
    pub is_private: bool,
}

/// One collected follower.
///
/// `username` is the stable identity. Everything else is best-effort and may
/// be missing when the list row did not render it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fullname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic_url: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    pub collected_at: DateTime<Utc>,
    #[serde(default)]
    pub detailed_profile_analyzed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_analyzed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub following_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_type: Option<AccountType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
}

impl Record {
    /// Creates a bare record with only the identity and collection time set.
    #[must_use]
    pub fn new(username: impl Into<String>, collected_at: DateTime<Utc>) -> Self {
        Self {
            username: username.into(),
            fullname: None,
            profile_pic_url: None,
            is_verified: false,
            collected_at,
            detailed_profile_analyzed: false,
            profile_analyzed_at: None,
            posts_count: None,
            followers_count: None,
            following_count: None,
            account_type: None,
            is_private: None,
        }
    }

    #[must_use]
    pub fn with_fullname(mut self, fullname: impl Into<String>) -> Self {
        let fullname = fullname.into();
        self.fullname = if fullname.trim().is_empty() {
            None
        } else {
            Some(fullname)
        };
        self
    }

    #[must_use]
    pub fn verified(mut self, is_verified: bool) -> Self {
        self.is_verified = is_verified;
        self
    }

    /// Copies enrichment results onto the record and marks it analyzed.
    pub fn apply_details(&mut self, details: &ProfileDetails, analyzed_at: DateTime<Utc>) {
        self.posts_count = Some(details.posts_count);
        self.followers_count = Some(details.followers_count);
        self.following_count = Some(details.following_count);
        self.account_type = Some(details.account_type);
        self.is_private = Some(details.is_private);
        self.detailed_profile_analyzed = true;
        self.profile_analyzed_at = Some(analyzed_at);
    }
}

/// Insertion-ordered set of records keyed by username.
///
/// The first record seen for a username wins; later duplicates are dropped
/// rather than merged so that resumed sessions keep their original ordering.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: Vec<Record>,
    positions: HashMap<String, usize>,
}

impl RecordSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from previously persisted records, dropping duplicates.
    #[must_use]
    pub fn from_seed(seed: impl IntoIterator<Item = Record>) -> Self {
        let mut set = Self::new();
        for record in seed {
            set.insert(record);
        }
        set
    }

    /// Inserts `record` unless its username is already present.
    ///
    /// Returns `true` when the record was new.
    pub fn insert(&mut self, record: Record) -> bool {
        if self.positions.contains_key(&record.username) {
            return false;
        }
        self.positions
            .insert(record.username.clone(), self.records.len());
        self.records.push(record);
        true
    }

    #[must_use]
    pub fn contains(&self, username: &str) -> bool {
        self.positions.contains_key(username)
    }

    #[must_use]
    pub fn get(&self, username: &str) -> Option<&Record> {
        self.positions.get(username).map(|&idx| &self.records[idx])
    }

    pub fn get_mut(&mut self, username: &str) -> Option<&mut Record> {
        let idx = *self.positions.get(username)?;
        self.records.get_mut(idx)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    #[must_use]
    pub fn usernames(&self) -> Vec<String> {
        self.records.iter().map(|r| r.username.clone()).collect()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Record> {
        self.records
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Exported follower file: the full record list for one target account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowerSnapshot {
    pub target_username: String,
    pub collection_timestamp: DateTime<Utc>,
    pub total_followers_collected: usize,
    pub followers: Vec<Record>,
}

impl FollowerSnapshot {
    #[must_use]
    pub fn new(
        target_username: impl Into<String>,
        followers: Vec<Record>,
        collection_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            target_username: target_username.into(),
            collection_timestamp,
            total_followers_collected: followers.len(),
            followers,
        }
    }
}
