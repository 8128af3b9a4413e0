use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classify::{categorize, classify};
use crate::error::EngagementError;
use crate::types::EngagementMetrics;

/// Where each report landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportPaths {
    pub metrics: PathBuf,
    pub ghost_followers: PathBuf,
    pub definite_ghosts: PathBuf,
    pub probable_ghosts: PathBuf,
    pub possible_ghosts: PathBuf,
}

#[derive(Serialize)]
struct GhostRow<'a> {
    username: &'a str,
    engagement_score: f64,
    last_engagement: Option<DateTime<Utc>>,
}

impl<'a> From<&'a EngagementMetrics> for GhostRow<'a> {
    fn from(m: &'a EngagementMetrics) -> Self {
        Self {
            username: &m.username,
            engagement_score: m.engagement_score,
            last_engagement: m.last_engagement,
        }
    }
}

const METRICS_HEADER: [&str; 12] = [
    "username",
    "like_count",
    "comment_count",
    "story_view_count",
    "reel_engagement_count",
    "active_now_count",
    "posts_seen",
    "stories_seen",
    "reels_seen",
    "activity_checks",
    "last_engagement",
    "engagement_score",
];

const GHOST_HEADER: [&str; 3] = ["username", "engagement_score", "last_engagement"];

/// Ascending by score, ties broken by username.
#[must_use]
pub fn sorted_by_score(metrics: &[EngagementMetrics]) -> Vec<EngagementMetrics> {
    let mut sorted = metrics.to_vec();
    sorted.sort_by(|a, b| {
        a.engagement_score
            .total_cmp(&b.engagement_score)
            .then_with(|| a.username.cmp(&b.username))
    });
    sorted
}

/// Writes the full metrics table and the four ghost lists for `target` into
/// `dir`, creating it if needed. Every file is sorted by score ascending and
/// carries a header row even when empty.
///
/// # Errors
///
/// Returns [`EngagementError`] if the directory cannot be created or a file
/// cannot be written.
pub fn export_reports(
    dir: &Path,
    target: &str,
    metrics: &[EngagementMetrics],
    ghost_threshold: f64,
) -> Result<ReportPaths, EngagementError> {
    fs::create_dir_all(dir).map_err(|e| EngagementError::io(dir, e))?;

    let sorted = sorted_by_score(metrics);
    let ghosts = classify(&sorted, ghost_threshold).ghost_followers;
    let categories = categorize(&sorted);

    let paths = ReportPaths {
        metrics: dir.join(format!("{target}_engagement_metrics.csv")),
        ghost_followers: dir.join(format!("{target}_ghost_followers.csv")),
        definite_ghosts: dir.join(format!("{target}_definite_ghosts.csv")),
        probable_ghosts: dir.join(format!("{target}_probable_ghosts.csv")),
        possible_ghosts: dir.join(format!("{target}_possible_ghosts.csv")),
    };

    write_csv(&paths.metrics, &METRICS_HEADER, &sorted)?;
    write_ghosts(&paths.ghost_followers, &ghosts)?;
    write_ghosts(&paths.definite_ghosts, &categories.definite)?;
    write_ghosts(&paths.probable_ghosts, &categories.probable)?;
    write_ghosts(&paths.possible_ghosts, &categories.possible)?;

    tracing::info!(
        target = target,
        followers = sorted.len(),
        ghosts = ghosts.len(),
        definite = categories.definite.len(),
        probable = categories.probable.len(),
        possible = categories.possible.len(),
        dir = %dir.display(),
        "engagement reports written"
    );
    Ok(paths)
}

fn write_ghosts(path: &Path, rows: &[&EngagementMetrics]) -> Result<(), EngagementError> {
    let rows: Vec<GhostRow<'_>> = rows.iter().map(|m| GhostRow::from(*m)).collect();
    write_csv(path, &GHOST_HEADER, &rows)
}

fn write_csv<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<(), EngagementError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|e| EngagementError::io(path, e))?;
    Ok(())
}
