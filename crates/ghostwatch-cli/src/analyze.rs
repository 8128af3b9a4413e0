//! Engagement analysis: aggregate, classify and export ghost reports.

use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use ghostwatch_core::AppConfig;
use ghostwatch_engagement::{
    aggregate, categorize, classify, export_reports, EngagementSources, ReportPaths,
};

use crate::followers::load_followers;

/// Scores every follower of `target` against the stored engagement files and
/// writes the CSV reports.
///
/// # Errors
///
/// Returns an error if followers cannot be loaded, an engagement file is
/// malformed, or the reports cannot be written.
pub(crate) fn run_analyze(
    config: &AppConfig,
    target: &str,
    threshold: Option<f64>,
    snapshot: Option<&Path>,
) -> anyhow::Result<()> {
    let paths = analyze(config, target, threshold, snapshot)?;
    println!("metrics:         {}", paths.metrics.display());
    println!("ghost followers: {}", paths.ghost_followers.display());
    println!("definite ghosts: {}", paths.definite_ghosts.display());
    println!("probable ghosts: {}", paths.probable_ghosts.display());
    println!("possible ghosts: {}", paths.possible_ghosts.display());
    Ok(())
}

pub(crate) fn analyze(
    config: &AppConfig,
    target: &str,
    threshold: Option<f64>,
    snapshot: Option<&Path>,
) -> anyhow::Result<ReportPaths> {
    let threshold = threshold.unwrap_or(config.ghost_threshold);
    anyhow::ensure!(
        threshold > 0.0 && threshold <= 1.0,
        "threshold must be in (0, 1], got {threshold}"
    );

    let followers = load_followers(config, target, snapshot)?;
    let sources = EngagementSources::load(&config.engagement_dir(), target)
        .context("loading engagement source files")?;
    if sources.is_empty() {
        tracing::warn!(target = target, "no engagement data found; every follower will score zero");
    }

    let events = sources.events();
    let metrics = aggregate(followers.iter().map(|r| r.username.as_str()), &events, Utc::now());

    let split = classify(&metrics, threshold);
    let tiers = categorize(&metrics);
    println!(
        "{target}: {} followers, {} ghosts below {threshold} ({} definite, {} probable, {} possible)",
        metrics.len(),
        split.ghost_followers.len(),
        tiers.definite.len(),
        tiers.probable.len(),
        tiers.possible.len()
    );

    let paths = export_reports(&config.reports_dir(), target, &metrics, threshold)?;
    Ok(paths)
}

#[cfg(feature = "fixtures")]
pub(crate) fn run_simulate(config: &AppConfig, target: &str, seed: u64) -> anyhow::Result<()> {
    let followers = load_followers(config, target, None)?;
    let usernames: Vec<String> = followers.into_iter().map(|r| r.username).collect();
    let sources = ghostwatch_engagement::fixtures::simulate(&usernames, seed, Utc::now());
    let written = sources.save(&config.engagement_dir(), target)?;
    for path in written {
        println!("wrote {}", path.display());
    }
    Ok(())
}
