use std::time::Duration;

use chrono::Utc;
use ghostwatch_core::RecordSet;
use serde::Serialize;

use crate::error::FailureClass;
use crate::store::CheckpointSink;
use crate::surface::ProfileInspector;

const CHECKPOINT_EVERY: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
    pub attempted: usize,
    pub analyzed: usize,
    pub failed: usize,
    pub checkpoints_written: usize,
}

/// Visits up to `limit` profiles that were not analyzed yet and copies their
/// counters onto the records.
///
/// Profiles that fail to load are skipped. A fatal failure (browser gone)
/// stops the pass early. Progress is checkpointed every few profiles and once
/// at the end.
pub async fn enrich_profiles<I, K>(
    inspector: &mut I,
    records: &mut RecordSet,
    limit: usize,
    pause: Duration,
    session_id: &str,
    sink: &mut K,
) -> EnrichmentReport
where
    I: ProfileInspector,
    K: CheckpointSink + ?Sized,
{
    let pending: Vec<String> = records
        .iter()
        .filter(|r| !r.detailed_profile_analyzed)
        .take(limit)
        .map(|r| r.username.clone())
        .collect();

    tracing::info!(
        pending = pending.len(),
        total = records.len(),
        "analyzing follower profiles"
    );

    let mut report = EnrichmentReport::default();
    let mut unsaved = 0usize;

    for (idx, username) in pending.iter().enumerate() {
        if idx > 0 && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        report.attempted += 1;

        match inspector.inspect(username).await {
            Ok(details) => {
                if let Some(record) = records.get_mut(username) {
                    record.apply_details(&details, Utc::now());
                }
                report.analyzed += 1;
                unsaved += 1;
                tracing::debug!(
                    username = %username,
                    followers = details.followers_count,
                    account_type = %details.account_type,
                    "profile analyzed"
                );
            }
            Err(err) if err.class() == FailureClass::Fatal => {
                tracing::error!(username = %username, error = %err, "profile analysis aborted");
                report.failed += 1;
                break;
            }
            Err(err) => {
                tracing::warn!(username = %username, error = %err, "skipping profile");
                report.failed += 1;
            }
        }

        if unsaved >= CHECKPOINT_EVERY {
            save(sink, session_id, records, &mut report);
            unsaved = 0;
        }
    }

    if unsaved > 0 {
        save(sink, session_id, records, &mut report);
    }

    tracing::info!(
        analyzed = report.analyzed,
        failed = report.failed,
        "profile analysis finished"
    );
    report
}

fn save<K: CheckpointSink + ?Sized>(
    sink: &mut K,
    session_id: &str,
    records: &RecordSet,
    report: &mut EnrichmentReport,
) {
    match sink.checkpoint(session_id, records.as_slice()) {
        Ok(()) => report.checkpoints_written += 1,
        Err(err) => tracing::warn!(error = %err, "enrichment checkpoint failed"),
    }
}
