//! Integration tests for `CollectionEngine::collect`.
//!
//! Drives the engine against an in-memory lazy-loading list that can be told
//! to grow slowly, show an end marker, go stale, lose its container, or put up
//! a login wall. No test sleeps: pacing and back-off are zeroed.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use ghostwatch_collector::{
    CancelFlag, CheckpointSink, CollectError, CollectionEngine, CollectionOutcome,
    CollectionSession, CollectorConfig, ContainerLocator, ItemExtractor, ProgressStore,
    ScrollMetrics, ScrollSurface, SessionGuard, StopReason, StoreError,
};
use ghostwatch_core::Record;

/// Follower list simulation. The container handle is a generation number;
/// replacing the container bumps it and every older handle goes stale.
struct SimulatedList {
    total: usize,
    initial: usize,
    loaded: usize,
    batch: usize,
    row_height: f64,
    client_height: f64,
    scroll_top: f64,
    generation: u32,
    /// Load a batch when scrolled to within one row of the end.
    lazy_on_scroll: bool,
    /// Load a batch every N polls regardless of position, spinner shown meanwhile.
    reveal_every_poll: Option<u32>,
    /// One poll per iteration (the end-marker probe).
    polls: u32,
    end_marker_at: Option<usize>,
    /// Show the end marker from this poll on, whatever has loaded.
    end_marker_from_poll: Option<u32>,
    /// Virtualized window as `(start, len)`; only these rows are rendered.
    window: Option<(usize, usize)>,
    /// Rows the window moves down, and grows by, on each poll.
    window_step: (usize, usize),
    reads: u32,
    stale_every_read: Option<u32>,
    advertised_total: Option<u64>,
    stale_visible_calls: u32,
    churn_every_poll: Option<u32>,
    cancel_after_polls: Option<(u32, CancelFlag)>,
    locate_ok: u32,
    locate_calls: u32,
    reload_calls: u32,
    reauth_calls: u32,
    reauth_fails: bool,
    interstitial: bool,
    interstitial_on_next_read: bool,
    duplicate_pairs: bool,
    stuck_loading: bool,
}

impl SimulatedList {
    fn new(total: usize) -> Self {
        let initial = 20;
        Self {
            total,
            initial,
            loaded: initial.min(total),
            batch: 10,
            row_height: 40.0,
            client_height: 400.0,
            scroll_top: 0.0,
            generation: 0,
            lazy_on_scroll: true,
            reveal_every_poll: None,
            polls: 0,
            end_marker_at: None,
            end_marker_from_poll: None,
            window: None,
            window_step: (0, 0),
            reads: 0,
            stale_every_read: None,
            advertised_total: None,
            stale_visible_calls: 0,
            churn_every_poll: None,
            cancel_after_polls: None,
            locate_ok: u32::MAX,
            locate_calls: 0,
            reload_calls: 0,
            reauth_calls: 0,
            reauth_fails: false,
            interstitial: false,
            interstitial_on_next_read: false,
            duplicate_pairs: false,
            stuck_loading: false,
        }
    }

    fn slow(total: usize, every: u32, batch: usize) -> Self {
        Self {
            lazy_on_scroll: false,
            reveal_every_poll: Some(every),
            batch,
            ..Self::new(total)
        }
    }

    /// Renders only a window that slides down and lengthens on every poll.
    fn sliding(total: usize, slide: usize, grow: usize) -> Self {
        let list = Self {
            lazy_on_scroll: false,
            end_marker_at: Some(total),
            window_step: (slide, grow),
            ..Self::new(total)
        };
        Self {
            window: Some((0, list.loaded)),
            ..list
        }
    }

    fn scroll_height(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let rows = self.loaded as f64;
        rows * self.row_height
    }

    fn max_top(&self) -> f64 {
        (self.scroll_height() - self.client_height).max(0.0)
    }

    fn check(&self, container: u32) -> Result<(), CollectError> {
        if container == self.generation {
            Ok(())
        } else {
            Err(CollectError::StaleHandle(format!(
                "container generation {container} replaced by {}",
                self.generation
            )))
        }
    }

    fn load_batch(&mut self) {
        self.loaded = (self.loaded + self.batch).min(self.total);
    }
}

#[async_trait]
impl ContainerLocator for SimulatedList {
    type Container = u32;

    async fn locate(&mut self) -> Result<u32, CollectError> {
        self.locate_calls += 1;
        if self.locate_calls > self.locate_ok {
            return Err(CollectError::ContainerLost);
        }
        Ok(self.generation)
    }
}

#[async_trait]
impl ItemExtractor for SimulatedList {
    type Item = usize;

    async fn visible_items(&mut self, container: &u32) -> Result<Vec<usize>, CollectError> {
        self.check(*container)?;
        if self.interstitial_on_next_read {
            self.interstitial_on_next_read = false;
            self.interstitial = true;
            return Err(CollectError::InterstitialDetected("suspicious activity".into()));
        }
        if self.stale_visible_calls > 0 {
            self.stale_visible_calls -= 1;
            return Err(CollectError::StaleHandle("row detached".into()));
        }
        self.reads += 1;
        if self.stale_every_read.is_some_and(|k| self.reads % k == 0) {
            return Err(CollectError::StaleHandle("row recycled".into()));
        }
        match self.window {
            Some((start, len)) => Ok((start..(start + len).min(self.loaded)).collect()),
            None => Ok((0..self.loaded).collect()),
        }
    }

    async fn extract(&mut self, item: &usize) -> Result<Record, CollectError> {
        let n = if self.duplicate_pairs { item / 2 } else { *item };
        Ok(Record::new(format!("user{n:04}"), Utc::now()))
    }
}

#[async_trait]
impl ScrollSurface for SimulatedList {
    async fn metrics(&mut self, container: &u32) -> Result<ScrollMetrics, CollectError> {
        self.check(*container)?;
        Ok(ScrollMetrics {
            scroll_top: self.scroll_top,
            scroll_height: self.scroll_height(),
            client_height: self.client_height,
        })
    }

    async fn scroll_to(&mut self, container: &u32, top: f64) -> Result<(), CollectError> {
        self.check(*container)?;
        self.scroll_top = top.clamp(0.0, self.max_top());
        if self.lazy_on_scroll && self.max_top() - self.scroll_top <= self.row_height {
            self.load_batch();
        }
        Ok(())
    }

    async fn activate(&mut self, _item: &usize) -> Result<(), CollectError> {
        Ok(())
    }

    async fn end_marker_visible(&mut self, container: &u32) -> Result<bool, CollectError> {
        self.check(*container)?;
        self.polls += 1;
        let visible = self.end_marker_at.is_some_and(|n| self.loaded >= n)
            || self.end_marker_from_poll.is_some_and(|n| self.polls >= n);

        if let Some((start, len)) = self.window {
            let (slide, grow) = self.window_step;
            let (start, len) = (start + slide, len + grow);
            self.window = Some((start, len));
            self.loaded = self.loaded.max((start + len).min(self.total));
        }

        if let Some(every) = self.reveal_every_poll {
            if self.polls % every == 0 {
                self.load_batch();
            }
        }
        if let Some(every) = self.churn_every_poll {
            if self.polls % every == 0 {
                self.generation += 1;
            }
        }
        if let Some((after, flag)) = &self.cancel_after_polls {
            if self.polls >= *after {
                flag.cancel();
            }
        }
        Ok(visible)
    }

    async fn loading_indicator_active(&mut self, container: &u32) -> Result<bool, CollectError> {
        self.check(*container)?;
        Ok(self.stuck_loading || (self.reveal_every_poll.is_some() && self.loaded < self.total))
    }

    async fn expected_total(&mut self) -> Option<u64> {
        self.advertised_total
    }

    async fn reload(&mut self) -> Result<(), CollectError> {
        self.reload_calls += 1;
        self.generation += 1;
        self.scroll_top = 0.0;
        self.loaded = self.initial.min(self.total);
        Ok(())
    }
}

#[async_trait]
impl SessionGuard for SimulatedList {
    async fn is_authenticated(&mut self) -> bool {
        true
    }

    async fn reauthenticate(&mut self) -> Result<(), CollectError> {
        self.reauth_calls += 1;
        if self.reauth_fails {
            return Err(CollectError::ReauthFailed("bad credentials".into()));
        }
        self.interstitial = false;
        Ok(())
    }

    async fn is_interstitial_present(&mut self) -> bool {
        self.interstitial
    }
}

/// Records every checkpoint as a list of usernames.
#[derive(Default)]
struct MemorySink {
    snapshots: Vec<Vec<String>>,
}

impl CheckpointSink for MemorySink {
    fn checkpoint(&mut self, _session_id: &str, records: &[Record]) -> Result<(), StoreError> {
        self.snapshots
            .push(records.iter().map(|r| r.username.clone()).collect());
        Ok(())
    }
}

fn config() -> CollectorConfig {
    let mut cfg = CollectorConfig::default().without_pacing();
    cfg.checkpoint_interval = Duration::from_secs(3600);
    cfg.max_duration = Duration::from_secs(60);
    cfg
}

fn usernames(records: &[Record]) -> Vec<String> {
    records.iter().map(|r| r.username.clone()).collect()
}

fn expected_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("user{i:04}")).collect()
}

async fn run(site: &mut SimulatedList, cfg: CollectorConfig) -> (CollectionOutcome, MemorySink) {
    let mut sink = MemorySink::default();
    let outcome = CollectionEngine::new(cfg)
        .collect(
            site,
            CollectionSession::new("target"),
            &mut sink,
            &CancelFlag::new(),
        )
        .await;
    (outcome, sink)
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn collects_whole_list_in_display_order() {
    let mut site = SimulatedList::new(100);
    let (outcome, _) = run(&mut site, config()).await;

    assert_eq!(outcome.stop_reason, StopReason::ScrolledToEnd);
    assert!(outcome.is_complete());
    assert_eq!(usernames(&outcome.records), expected_names(100));
    assert_eq!(outcome.stats.new_records, 100);
    assert_eq!(outcome.stats.page_refreshes, 0);
}

#[tokio::test]
async fn end_marker_stops_before_list_is_exhausted() {
    let mut site = SimulatedList::new(1000);
    site.end_marker_at = Some(50);
    let (outcome, _) = run(&mut site, config()).await;

    assert_eq!(outcome.stop_reason, StopReason::EndMarker);
    assert!(outcome.records.len() >= 50);
    assert!(outcome.records.len() < 100, "got {}", outcome.records.len());
}

#[tokio::test]
async fn end_marker_stops_after_technique_rotation() {
    let mut site = SimulatedList::new(20);
    site.lazy_on_scroll = false;
    site.stuck_loading = true;
    site.end_marker_from_poll = Some(8);
    let (outcome, _) = run(&mut site, config()).await;

    assert_eq!(outcome.stop_reason, StopReason::EndMarker);
    assert_eq!(outcome.stats.iterations, 8, "stops on the poll that shows the marker");
    assert!(
        outcome.stats.technique_rotations >= 2,
        "technique had moved off normal scrolling"
    );
    assert_eq!(outcome.records.len(), 20);
}

#[tokio::test]
async fn sliding_window_collects_every_rendered_row() {
    let mut site = SimulatedList::sliding(120, 5, 1);
    let (outcome, _) = run(&mut site, config()).await;

    assert_eq!(outcome.stop_reason, StopReason::EndMarker);
    assert!(outcome.is_complete());
    assert_eq!(usernames(&outcome.records), expected_names(120));
    assert!(outcome.stats.duplicates_dropped > 0, "overlapping rows were re-read");
}

#[tokio::test]
async fn slow_growth_is_not_mistaken_for_a_stall() {
    let mut site = SimulatedList::slow(30, 5, 1);
    let (outcome, _) = run(&mut site, config()).await;

    assert_eq!(outcome.stop_reason, StopReason::ScrolledToEnd);
    assert_eq!(outcome.records.len(), 30);
    assert_eq!(outcome.stats.page_refreshes, 0);
    assert_eq!(site.reload_calls, 0);
}

#[tokio::test]
async fn expected_total_ends_collection_on_a_quiet_iteration() {
    let mut site = SimulatedList::slow(200, 2, 10);
    site.advertised_total = Some(60);
    let (outcome, _) = run(&mut site, config()).await;

    assert_eq!(outcome.stop_reason, StopReason::ExpectedTotalReached);
    assert!(outcome.records.len() >= 57);
    assert!(outcome.records.len() < 200);
}

#[tokio::test]
async fn stuck_spinner_hits_stall_ceiling() {
    let mut site = SimulatedList::new(100);
    site.lazy_on_scroll = false;
    site.stuck_loading = true;
    let cfg = config();
    let (outcome, _) = run(&mut site, cfg.clone()).await;

    assert_eq!(outcome.stop_reason, StopReason::StallCeiling);
    assert!(!outcome.is_complete());
    assert_eq!(outcome.records.len(), 20);
    assert!(outcome.stats.iterations >= cfg.min_iterations);
    assert_eq!(outcome.stats.iterations, cfg.stall_ceiling + 2);
    assert!(outcome.stats.technique_rotations >= 6);
}

// ---------------------------------------------------------------------------
// Dedup, checkpoints, resume
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_rows_are_dropped() {
    let mut site = SimulatedList::new(40);
    site.duplicate_pairs = true;
    let (outcome, _) = run(&mut site, config()).await;

    assert!(outcome.is_complete());
    assert_eq!(usernames(&outcome.records), expected_names(20));
    assert!(outcome.stats.duplicates_dropped >= 20);
}

#[tokio::test]
async fn checkpoints_only_grow_and_end_with_the_result() {
    let mut site = SimulatedList::new(80);
    let mut cfg = config();
    cfg.checkpoint_interval = Duration::ZERO;
    let (outcome, sink) = run(&mut site, cfg).await;

    assert!(sink.snapshots.len() >= 3, "got {}", sink.snapshots.len());
    for pair in sink.snapshots.windows(2) {
        assert!(pair[1].len() >= pair[0].len());
        assert_eq!(pair[1][..pair[0].len()], pair[0][..], "earlier records keep their order");
    }
    assert_eq!(sink.snapshots.last().unwrap(), &usernames(&outcome.records));
    assert_eq!(outcome.stats.checkpoints_written as usize, sink.snapshots.len());
}

#[tokio::test]
async fn final_checkpoint_is_written_without_periodic_ones() {
    let mut site = SimulatedList::new(30);
    let (outcome, sink) = run(&mut site, config()).await;

    assert_eq!(sink.snapshots.len(), 1);
    assert_eq!(sink.snapshots[0].len(), outcome.records.len());
}

#[tokio::test]
async fn resumed_session_keeps_seed_records_first() {
    let seed: Vec<Record> = (0..10)
        .map(|i| Record::new(format!("user{i:04}"), Utc::now()).with_fullname("Seeded"))
        .collect();
    let mut site = SimulatedList::new(30);
    let mut sink = MemorySink::default();

    let outcome = CollectionEngine::new(config())
        .collect(
            &mut site,
            CollectionSession::resume("target", seed),
            &mut sink,
            &CancelFlag::new(),
        )
        .await;

    assert_eq!(usernames(&outcome.records), expected_names(30));
    assert!(outcome.records[..10]
        .iter()
        .all(|r| r.fullname.as_deref() == Some("Seeded")));
    assert_eq!(outcome.stats.new_records, 20);
}

#[tokio::test]
async fn progress_store_receives_the_full_result() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = ProgressStore::open(dir.path(), "target").unwrap();
    let mut site = SimulatedList::new(50);
    let session = CollectionSession::new("target");
    let session_id = session.id.clone();

    let outcome = CollectionEngine::new(config())
        .collect(&mut site, session, &mut store, &CancelFlag::new())
        .await;

    let latest = store.load_latest(&session_id).unwrap().unwrap();
    assert_eq!(latest.total_records, 50);
    assert_eq!(usernames(&latest.records), usernames(&outcome.records));
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transient_stale_reads_are_relocated() {
    let mut site = SimulatedList::new(60);
    site.stale_visible_calls = 2;
    let (outcome, _) = run(&mut site, config()).await;

    assert!(outcome.is_complete());
    assert_eq!(outcome.records.len(), 60);
    assert_eq!(outcome.stats.stale_failures, 2);
    assert!(outcome.stats.relocations >= 2);
    assert_eq!(outcome.stats.page_refreshes, 0);
}

#[tokio::test]
async fn flat_scroll_height_relocates_container() {
    let mut site = SimulatedList::slow(40, 4, 5);
    let (outcome, _) = run(&mut site, config()).await;

    assert!(outcome.is_complete(), "stopped with {}", outcome.stop_reason);
    assert_eq!(outcome.records.len(), 40);
    assert_eq!(outcome.stats.stale_failures, 0);
    assert!(outcome.stats.relocations >= 1);
    assert!(site.locate_calls >= 2);
    assert_eq!(site.reload_calls, 0);
}

#[tokio::test]
async fn stale_reads_between_successful_iterations_do_not_refresh() {
    let mut site = SimulatedList::new(20);
    site.lazy_on_scroll = false;
    site.stuck_loading = true;
    site.stale_every_read = Some(2);
    let mut cfg = config();
    cfg.height_stagnation_limit = 1;
    cfg.stale_ceiling = 100;
    cfg.stall_ceiling = 6;
    cfg.min_iterations = 1;
    let (outcome, _) = run(&mut site, cfg.clone()).await;

    assert_eq!(outcome.stop_reason, StopReason::StallCeiling);
    assert!(outcome.stats.stale_failures > cfg.stale_escalation);
    assert_eq!(outcome.stats.page_refreshes, 0);
    assert_eq!(site.reload_calls, 0);
}

#[tokio::test]
async fn repeated_stale_reads_escalate_to_page_refresh() {
    let mut site = SimulatedList::new(60);
    site.stale_visible_calls = 4;
    let (outcome, _) = run(&mut site, config()).await;

    assert!(outcome.is_complete());
    assert_eq!(outcome.records.len(), 60);
    assert_eq!(outcome.stats.page_refreshes, 1);
    assert_eq!(site.reload_calls, 1);
}

#[tokio::test]
async fn container_churn_is_survived() {
    let mut site = SimulatedList::new(80);
    site.churn_every_poll = Some(4);
    let (outcome, _) = run(&mut site, config()).await;

    assert!(outcome.is_complete(), "stopped with {}", outcome.stop_reason);
    assert_eq!(outcome.records.len(), 80);
    assert!(outcome.stats.stale_failures > 0);
}

#[tokio::test]
async fn permanent_staleness_trips_circuit_breaker() {
    let mut site = SimulatedList::new(60);
    site.stale_visible_calls = u32::MAX;
    let cfg = config();
    let (outcome, sink) = run(&mut site, cfg.clone()).await;

    assert_eq!(outcome.stop_reason, StopReason::StaleCircuitBreaker);
    assert_eq!(outcome.stats.stale_failures, cfg.stale_ceiling + 1);
    assert_eq!(outcome.stats.page_refreshes, cfg.max_page_refreshes);
    assert_eq!(sink.snapshots.len(), 1, "final checkpoint still written");
}

#[tokio::test]
async fn lost_container_returns_partial_results() {
    let mut site = SimulatedList::new(200);
    site.locate_ok = 1;
    site.churn_every_poll = Some(3);
    let cfg = config();
    let (outcome, sink) = run(&mut site, cfg.clone()).await;

    assert_eq!(outcome.stop_reason, StopReason::ContainerLost);
    assert!(!outcome.is_complete());
    assert!(!outcome.records.is_empty());
    assert!(outcome.records.len() < 200);
    assert_eq!(outcome.stats.page_refreshes, cfg.max_page_refreshes);
    assert_eq!(sink.snapshots.last().unwrap().len(), outcome.records.len());
}

#[tokio::test]
async fn missing_container_at_start_stops_without_iterating() {
    let mut site = SimulatedList::new(50);
    site.locate_ok = 0;
    let (outcome, sink) = run(&mut site, config()).await;

    assert_eq!(outcome.stop_reason, StopReason::ContainerLost);
    assert_eq!(outcome.stats.iterations, 0);
    assert!(outcome.records.is_empty());
    assert_eq!(sink.snapshots.len(), 1);
}

#[tokio::test]
async fn interstitial_triggers_reauthentication() {
    let mut site = SimulatedList::new(50);
    site.interstitial_on_next_read = true;
    let (outcome, _) = run(&mut site, config()).await;

    assert!(outcome.is_complete(), "stopped with {}", outcome.stop_reason);
    assert_eq!(outcome.records.len(), 50);
    assert_eq!(site.reauth_calls, 1);
    assert_eq!(outcome.stats.reauthentications, 1);
    assert_eq!(outcome.stats.page_refreshes, 1);
}

#[tokio::test]
async fn failed_reauthentication_stops_with_recovery_failed() {
    let mut site = SimulatedList::new(50);
    site.interstitial = true;
    site.reauth_fails = true;
    let cfg = config();
    let (outcome, _) = run(&mut site, cfg.clone()).await;

    assert_eq!(outcome.stop_reason, StopReason::RecoveryFailed);
    assert_eq!(site.reauth_calls, cfg.max_reauth_attempts);
    assert!(outcome.records.is_empty());
}

// ---------------------------------------------------------------------------
// Cancellation and time budget
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancelled_before_start_still_checkpoints_seed() {
    let seed = vec![Record::new("user0000", Utc::now())];
    let mut site = SimulatedList::new(50);
    let mut sink = MemorySink::default();
    let cancel = CancelFlag::new();
    cancel.cancel();

    let outcome = CollectionEngine::new(config())
        .collect(
            &mut site,
            CollectionSession::resume("target", seed),
            &mut sink,
            &cancel,
        )
        .await;

    assert_eq!(outcome.stop_reason, StopReason::Cancelled);
    assert_eq!(outcome.stats.iterations, 0);
    assert_eq!(sink.snapshots, vec![vec!["user0000".to_string()]]);
}

#[tokio::test]
async fn cancellation_mid_run_returns_partial_results() {
    let cancel = CancelFlag::new();
    let mut site = SimulatedList::new(500);
    site.cancel_after_polls = Some((3, cancel.clone()));
    let mut sink = MemorySink::default();

    let outcome = CollectionEngine::new(config())
        .collect(&mut site, CollectionSession::new("target"), &mut sink, &cancel)
        .await;

    assert_eq!(outcome.stop_reason, StopReason::Cancelled);
    assert_eq!(outcome.stats.iterations, 3);
    assert!(!outcome.records.is_empty());
    assert!(outcome.records.len() < 500);
}

#[tokio::test]
async fn zero_time_budget_times_out_immediately() {
    let mut site = SimulatedList::new(50);
    let mut cfg = config();
    cfg.max_duration = Duration::ZERO;
    let (outcome, _) = run(&mut site, cfg).await;

    assert_eq!(outcome.stop_reason, StopReason::Timeout);
    assert_eq!(outcome.stats.iterations, 0);
}
