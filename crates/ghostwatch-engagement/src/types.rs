use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an engagement event records about its subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    Like,
    Comment,
    StoryView,
    ReelEngagement,
    /// One observation of the subject's online status.
    PresencePing { active: bool },
}

impl EventKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::StoryView => "story_view",
            Self::ReelEngagement => "reel_engagement",
            Self::PresencePing { .. } => "presence_ping",
        }
    }
}

/// One observed interaction between a follower and the target account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementEvent {
    #[serde(flatten)]
    pub kind: EventKind,
    /// Username of the follower the event is about.
    pub subject: String,
    /// Post, story or reel the event came from. `None` for presence pings.
    pub content_id: Option<String>,
    /// `None` when the source file carried no parseable timestamp. Such
    /// events still count but never move `last_engagement`.
    pub timestamp: Option<DateTime<Utc>>,
    /// Comment text, when there is one.
    pub payload: Option<String>,
}

impl EngagementEvent {
    #[must_use]
    pub fn new(kind: EventKind, subject: impl Into<String>, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            content_id: None,
            timestamp,
            payload: None,
        }
    }

    #[must_use]
    pub fn with_content_id(mut self, content_id: Option<String>) -> Self {
        self.content_id = content_id;
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Option<String>) -> Self {
        self.payload = payload;
        self
    }
}

/// Accumulated engagement counters for a single follower.
///
/// Field order is the column order of the metrics export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    pub username: String,
    pub like_count: u32,
    pub comment_count: u32,
    pub story_view_count: u32,
    pub reel_engagement_count: u32,
    pub active_now_count: u32,
    pub posts_seen: u32,
    pub stories_seen: u32,
    pub reels_seen: u32,
    pub activity_checks: u32,
    pub last_engagement: Option<DateTime<Utc>>,
    /// Filled in once all events are folded. Zero until then.
    pub engagement_score: f64,
}

impl EngagementMetrics {
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    /// True when none of the five interaction counters moved.
    #[must_use]
    pub fn has_no_interactions(&self) -> bool {
        self.like_count == 0
            && self.comment_count == 0
            && self.story_view_count == 0
            && self.reel_engagement_count == 0
            && self.active_now_count == 0
    }

    /// Moves `last_engagement` forward to `at` if it is newer.
    pub fn touch(&mut self, at: Option<DateTime<Utc>>) {
        if let Some(at) = at {
            if self.last_engagement.is_none_or(|prev| at > prev) {
                self.last_engagement = Some(at);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GhostCategory {
    DefiniteGhost,
    ProbableGhost,
    PossibleGhost,
    Active,
}

impl GhostCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DefiniteGhost => "definite_ghost",
            Self::ProbableGhost => "probable_ghost",
            Self::PossibleGhost => "possible_ghost",
            Self::Active => "active",
        }
    }

    #[must_use]
    pub fn is_ghost(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for GhostCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
