//! On-disk engagement source files and their conversion into events.
//!
//! Four JSON arrays live under the engagement directory, one per content
//! type, named `<target>_post_engagement.json` and so on.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::EngagementError;
use crate::types::{EngagementEvent, EventKind};

const POSTS_SUFFIX: &str = "post_engagement";
const STORIES_SUFFIX: &str = "story_engagement";
const REELS_SUFFIX: &str = "reel_engagement";
const ACTIVITY_SUFFIX: &str = "online_activity";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeBlock {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub usernames: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEntry {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentBlock {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub comments: Vec<CommentEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEngagement {
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub likes: LikeBlock,
    #[serde(default)]
    pub comments: CommentBlock,
    #[serde(default)]
    pub view_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryEngagement {
    #[serde(default)]
    pub story_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub viewer_count: u64,
    #[serde(default)]
    pub viewers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReelEngagement {
    #[serde(default)]
    pub reel_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub likes: LikeBlock,
    #[serde(default)]
    pub comments: CommentBlock,
    #[serde(default)]
    pub view_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCheck {
    pub username: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

/// Everything observed about one target's audience.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngagementSources {
    pub posts: Vec<PostEngagement>,
    pub stories: Vec<StoryEngagement>,
    pub reels: Vec<ReelEngagement>,
    pub activity: Vec<ActivityCheck>,
}

impl EngagementSources {
    /// Reads whichever of the four source files exist for `target`.
    ///
    /// A missing file is logged and treated as empty.
    ///
    /// # Errors
    ///
    /// Returns [`EngagementError`] if a file exists but cannot be read or
    /// does not hold the expected JSON array.
    pub fn load(dir: &Path, target: &str) -> Result<Self, EngagementError> {
        Ok(Self {
            posts: load_array(&source_path(dir, target, POSTS_SUFFIX))?,
            stories: load_array(&source_path(dir, target, STORIES_SUFFIX))?,
            reels: load_array(&source_path(dir, target, REELS_SUFFIX))?,
            activity: load_array(&source_path(dir, target, ACTIVITY_SUFFIX))?,
        })
    }

    /// Writes all four source files for `target`, creating `dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`EngagementError`] on any filesystem or serialization failure.
    pub fn save(&self, dir: &Path, target: &str) -> Result<Vec<PathBuf>, EngagementError> {
        fs::create_dir_all(dir).map_err(|e| EngagementError::io(dir, e))?;
        Ok(vec![
            save_array(&source_path(dir, target, POSTS_SUFFIX), &self.posts)?,
            save_array(&source_path(dir, target, STORIES_SUFFIX), &self.stories)?,
            save_array(&source_path(dir, target, REELS_SUFFIX), &self.reels)?,
            save_array(&source_path(dir, target, ACTIVITY_SUFFIX), &self.activity)?,
        ])
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
            && self.stories.is_empty()
            && self.reels.is_empty()
            && self.activity.is_empty()
    }

    /// Flattens the source files into one event per interaction.
    #[must_use]
    pub fn events(&self) -> Vec<EngagementEvent> {
        let mut events = Vec::new();

        for post in &self.posts {
            let at = post.timestamp.as_deref().and_then(parse_timestamp);
            let id = post.post_id.clone().or_else(|| post.url.clone());
            for liker in &post.likes.usernames {
                events.push(EngagementEvent::new(EventKind::Like, liker, at).with_content_id(id.clone()));
            }
            for comment in &post.comments.comments {
                let Some(author) = &comment.username else {
                    continue;
                };
                events.push(
                    EngagementEvent::new(EventKind::Comment, author, at)
                        .with_content_id(id.clone())
                        .with_payload(comment.text.clone()),
                );
            }
        }

        for story in &self.stories {
            let at = story.timestamp.as_deref().and_then(parse_timestamp);
            for viewer in &story.viewers {
                events.push(
                    EngagementEvent::new(EventKind::StoryView, viewer, at)
                        .with_content_id(story.story_id.clone()),
                );
            }
        }

        for reel in &self.reels {
            let at = reel.timestamp.as_deref().and_then(parse_timestamp);
            let id = reel.reel_id.clone().or_else(|| reel.url.clone());
            let commenters = reel.comments.comments.iter().filter_map(|c| c.username.as_ref());
            for who in reel.likes.usernames.iter().chain(commenters) {
                events.push(
                    EngagementEvent::new(EventKind::ReelEngagement, who, at)
                        .with_content_id(id.clone()),
                );
            }
        }

        for check in &self.activity {
            let at = check.timestamp.as_deref().and_then(parse_timestamp);
            events.push(EngagementEvent::new(
                EventKind::PresencePing {
                    active: check.is_active,
                },
                &check.username,
                at,
            ));
        }

        events
    }
}

#[must_use]
pub fn source_path(dir: &Path, target: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{target}_{suffix}.json"))
}

/// Parses an RFC 3339 timestamp, or a naive ISO-8601 one taken as UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    tracing::debug!(value = raw, "unparseable engagement timestamp");
    None
}

fn load_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, EngagementError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "engagement source file not found, skipping");
            return Ok(Vec::new());
        }
        Err(e) => return Err(EngagementError::io(path, e)),
    };
    let items: Vec<T> = serde_json::from_slice(&bytes).map_err(|source| EngagementError::Json {
        context: path.display().to_string(),
        source,
    })?;
    tracing::debug!(path = %path.display(), entries = items.len(), "loaded engagement source");
    Ok(items)
}

fn save_array<T: Serialize>(path: &Path, items: &[T]) -> Result<PathBuf, EngagementError> {
    let file = fs::File::create(path).map_err(|e| EngagementError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, items).map_err(|source| EngagementError::Json {
        context: path.display().to_string(),
        source,
    })?;
    writer.flush().map_err(|e| EngagementError::io(path, e))?;
    Ok(path.to_path_buf())
}
