//! Follower list commands: statistics, categories, merging and checkpoints.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use ghostwatch_collector::{read_snapshot, ProgressStore};
use ghostwatch_core::{
    categorize_followers, follower_statistics, merge_snapshots, AppConfig, FollowerSnapshot,
    Record,
};

/// Loads the follower list for `target`, from `snapshot` when given and from
/// the most recent checkpoint otherwise.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be read or no checkpoint exists.
pub(crate) fn load_followers(
    config: &AppConfig,
    target: &str,
    snapshot: Option<&Path>,
) -> anyhow::Result<Vec<Record>> {
    if let Some(path) = snapshot {
        let snapshot = read_snapshot(path)
            .with_context(|| format!("reading follower snapshot {}", path.display()))?;
        return Ok(snapshot.followers);
    }

    let store = ProgressStore::open(config.followers_dir(), target)?;
    let checkpoint = store
        .load_latest_for_target()?
        .ok_or_else(|| anyhow::anyhow!("no follower checkpoints found for '{target}'"))?;
    tracing::info!(
        target = target,
        session = %checkpoint.session_id,
        followers = checkpoint.total_records,
        "loaded follower checkpoint"
    );
    Ok(checkpoint.records)
}

pub(crate) fn run_stats(
    config: &AppConfig,
    target: &str,
    snapshot: Option<&Path>,
) -> anyhow::Result<()> {
    let records = load_followers(config, target, snapshot)?;
    let stats = follower_statistics(&records);

    println!("followers of {target}: {}", stats.total_followers);
    println!("analyzed profiles:     {}", stats.analyzed_profiles);
    println!(
        "account types:         personal {} / business {} / creator {} / unknown {}",
        stats.account_types.personal,
        stats.account_types.business,
        stats.account_types.creator,
        stats.account_types.unknown
    );
    println!(
        "privacy:               private {} / public {}",
        stats.privacy_status.private, stats.privacy_status.public
    );
    println!("potential bots:        {}", stats.potential_bots);
    println!("high-follower:         {}", stats.high_follower_accounts);
    println!("low engagement:        {}", stats.low_engagement_potential);
    println!(
        "averages:              {:.1} followers / {:.1} following / {:.1} posts",
        stats.avg_followers, stats.avg_following, stats.avg_posts
    );
    Ok(())
}

pub(crate) fn run_categorize(
    config: &AppConfig,
    target: &str,
    snapshot: Option<&Path>,
) -> anyhow::Result<()> {
    let records = load_followers(config, target, snapshot)?;
    let categories = categorize_followers(&records);
    println!("{}", serde_json::to_string_pretty(&categories)?);
    Ok(())
}

/// Merges snapshot files, and optionally every stored session, into one
/// follower file. Returns the path written.
///
/// # Errors
///
/// Returns an error if there is nothing to merge or any read or write fails.
pub(crate) fn run_merge(
    config: &AppConfig,
    target: &str,
    inputs: &[PathBuf],
    all_sessions: bool,
    output: Option<&str>,
) -> anyhow::Result<PathBuf> {
    let store = ProgressStore::open(config.followers_dir(), target)?;
    let mut snapshots: Vec<FollowerSnapshot> = Vec::new();

    for path in inputs {
        let snapshot = read_snapshot(path)
            .with_context(|| format!("reading follower snapshot {}", path.display()))?;
        snapshots.push(snapshot);
    }

    if all_sessions {
        for summary in store.list_sessions()? {
            if let Some(checkpoint) = store.load_latest(&summary.session_id)? {
                snapshots.push(FollowerSnapshot::new(
                    target,
                    checkpoint.records,
                    checkpoint.saved_at,
                ));
            }
        }
    }

    anyhow::ensure!(
        !snapshots.is_empty(),
        "nothing to merge: pass --input files or --all-sessions"
    );

    let merged = merge_snapshots(target, &snapshots, Utc::now());
    let file_name = output.map_or_else(|| format!("{target}_followers_merged.json"), str::to_owned);
    let path = store.write_snapshot(&merged, &file_name)?;

    println!(
        "merged {} sources into {} unique followers: {}",
        snapshots.len(),
        merged.total_followers_collected,
        path.display()
    );
    Ok(path)
}

pub(crate) fn run_checkpoints(config: &AppConfig, target: &str) -> anyhow::Result<()> {
    let store = ProgressStore::open(config.followers_dir(), target)?;
    let sessions = store.list_sessions()?;

    if sessions.is_empty() {
        println!("no checkpoint sessions for {target}");
        return Ok(());
    }

    println!("{:<38} {:>11} {:>9}  saved at", "session", "checkpoints", "records");
    for s in &sessions {
        println!(
            "{:<38} {:>11} {:>9}  {}",
            s.session_id,
            s.checkpoints,
            s.total_records,
            s.saved_at.to_rfc3339()
        );
    }
    Ok(())
}
