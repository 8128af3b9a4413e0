//! The paginated collection loop.
//!
//! One iteration:
//!
//! 1. Read every visible row and dedup it into the record set.
//! 2. Update the growth counters; rotate the scroll technique after a run of
//!    iterations without growth, reset it after any growth.
//! 3. Ask the end-of-list detector whether the list is done.
//! 4. Advance the scroll with the current technique and watch the scroll
//!    height for stagnation.
//!
//! Failures are routed by [`FailureClass`] to the recovery controller, and a
//! checkpoint is written on a timer and once more when the loop exits for any
//! reason. The loop never returns an error: every exit path yields the
//! records collected so far together with a [`StopReason`].

use std::time::Duration;

use ghostwatch_core::{Record, RecordSet};
use serde::Serialize;
use tokio::time::Instant;

use crate::config::CollectorConfig;
use crate::detector::{EndOfListDetector, ListObservation, StopReason};
use crate::driver::{ScrollDriver, ScrollTechnique};
use crate::error::{CollectError, FailureClass};
use crate::recovery::RecoveryController;
use crate::session::{CancelFlag, CollectionSession};
use crate::store::CheckpointSink;
use crate::surface::{ScrollSurface, SessionGuard};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub iterations: u32,
    pub new_records: usize,
    pub duplicates_dropped: usize,
    pub extraction_failures: usize,
    pub stale_failures: u32,
    pub relocations: u32,
    pub page_refreshes: u32,
    pub reauthentications: u32,
    pub technique_rotations: u32,
    pub checkpoints_written: u32,
    pub checkpoint_failures: u32,
}

#[derive(Debug, Clone)]
pub struct CollectionOutcome {
    pub session_id: String,
    pub target: String,
    pub records: Vec<Record>,
    pub stop_reason: StopReason,
    pub stats: CollectionStats,
    pub elapsed: Duration,
}

impl CollectionOutcome {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.stop_reason.is_complete()
    }
}

/// Mutable loop state for one run.
struct LoopState {
    collected: RecordSet,
    iteration: u32,
    consecutive_no_growth: u32,
    same_height_iterations: u32,
    technique: ScrollTechnique,
    technique_iterations: u32,
    stale_failures: u32,
    consecutive_stale_failures: u32,
    expected_total: Option<u64>,
    checkpointed_len: Option<usize>,
    last_checkpoint: Instant,
}

impl LoopState {
    fn new(seed: Vec<Record>, expected_total: Option<u64>) -> Self {
        Self {
            collected: RecordSet::from_seed(seed),
            iteration: 0,
            consecutive_no_growth: 0,
            same_height_iterations: 0,
            technique: ScrollTechnique::Normal,
            technique_iterations: 0,
            stale_failures: 0,
            consecutive_stale_failures: 0,
            expected_total,
            checkpointed_len: None,
            last_checkpoint: Instant::now(),
        }
    }

    /// Forget height tracking after the container was replaced.
    fn container_replaced(&mut self) {
        self.same_height_iterations = 0;
    }
}

enum Step {
    Continue,
    Relocate,
    Stop(StopReason),
}

#[derive(Debug, Clone)]
pub struct CollectionEngine {
    config: CollectorConfig,
    driver: ScrollDriver,
}

impl CollectionEngine {
    #[must_use]
    pub fn new(config: CollectorConfig) -> Self {
        let driver = ScrollDriver::new(config.scroll_pause, config.jitter);
        Self { config, driver }
    }

    /// Runs the loop until the list is exhausted, recovery gives up, the
    /// time budget runs out, or `cancel` is raised.
    pub async fn collect<S, K>(
        &self,
        site: &mut S,
        mut session: CollectionSession,
        sink: &mut K,
        cancel: &CancelFlag,
    ) -> CollectionOutcome
    where
        S: ScrollSurface + SessionGuard,
        K: CheckpointSink + ?Sized,
    {
        let started = Instant::now();
        let mut stats = CollectionStats::default();
        let mut recovery = RecoveryController::new(&self.config);
        let mut detector = EndOfListDetector::new(&self.config);
        let mut state = LoopState::new(std::mem::take(&mut session.seed), session.expected_total);
        let seeded = state.collected.len();

        tracing::info!(
            session_id = %session.id,
            target = %session.target,
            seeded,
            "starting follower collection"
        );

        let stop_reason = match recovery.acquire(site).await {
            Err(reason) => reason,
            Ok(mut container) => {
                if state.expected_total.is_none() {
                    state.expected_total = site.expected_total().await;
                }
                if let Some(total) = state.expected_total {
                    tracing::info!(expected_total = total, "page reports follower count");
                }

                loop {
                    if cancel.is_cancelled() {
                        break StopReason::Cancelled;
                    }
                    if started.elapsed() >= self.config.max_duration {
                        break StopReason::Timeout;
                    }
                    state.iteration += 1;
                    stats.iterations += 1;

                    let step = match self
                        .iterate(site, &container, &mut state, &mut detector, &mut stats)
                        .await
                    {
                        Ok(step) => step,
                        Err(err) => match self
                            .handle_failure(site, err, &mut state, &mut recovery, &mut stats)
                            .await
                        {
                            Ok(Some(replacement)) => {
                                container = replacement;
                                state.container_replaced();
                                Step::Continue
                            }
                            Ok(None) => Step::Continue,
                            Err(reason) => Step::Stop(reason),
                        },
                    };

                    match step {
                        Step::Stop(reason) => break reason,
                        Step::Relocate => {
                            tracing::debug!(
                                iteration = state.iteration,
                                "scroll height stagnant, re-locating container"
                            );
                            match recovery.restore(site).await {
                                Ok(replacement) => {
                                    container = replacement;
                                    state.container_replaced();
                                }
                                Err(reason) => break reason,
                            }
                        }
                        Step::Continue => {}
                    }

                    self.checkpoint(&session, &mut state, sink, &mut stats, false);
                }
            }
        };

        self.checkpoint(&session, &mut state, sink, &mut stats, true);

        stats.relocations = recovery.relocations();
        stats.page_refreshes = recovery.page_refreshes();
        stats.reauthentications = recovery.reauthentications();
        stats.new_records = state.collected.len().saturating_sub(seeded);

        let elapsed = started.elapsed();
        if stop_reason.is_complete() {
            tracing::info!(
                session_id = %session.id,
                records = state.collected.len(),
                iterations = stats.iterations,
                reason = %stop_reason,
                elapsed_secs = elapsed.as_secs(),
                "follower collection complete"
            );
        } else {
            tracing::warn!(
                session_id = %session.id,
                records = state.collected.len(),
                iterations = stats.iterations,
                reason = %stop_reason,
                elapsed_secs = elapsed.as_secs(),
                "follower collection stopped early, returning partial results"
            );
        }

        CollectionOutcome {
            session_id: session.id,
            target: session.target,
            records: state.collected.into_vec(),
            stop_reason,
            stats,
            elapsed,
        }
    }

    async fn iterate<S: ScrollSurface>(
        &self,
        site: &mut S,
        container: &S::Container,
        state: &mut LoopState,
        detector: &mut EndOfListDetector,
        stats: &mut CollectionStats,
    ) -> Result<Step, CollectError> {
        let new_records = Self::harvest(site, container, state, stats).await?;

        if new_records > 0 {
            if state.technique != ScrollTechnique::Normal {
                tracing::debug!(technique = %state.technique, "list grew, back to normal scrolling");
            }
            state.consecutive_no_growth = 0;
            state.technique = ScrollTechnique::Normal;
            state.technique_iterations = 0;
            state.stale_failures = 0;
        } else {
            state.consecutive_no_growth += 1;
            if state.consecutive_no_growth % self.config.rotate_after_stalls.max(1) == 0 {
                state.technique = state.technique.next();
                state.technique_iterations = 0;
                stats.technique_rotations += 1;
                tracing::debug!(
                    no_growth = state.consecutive_no_growth,
                    technique = %state.technique,
                    "no new followers, rotating scroll technique"
                );
            }
        }

        let metrics = site.metrics(container).await?;
        let loading = site.loading_indicator_active(container).await?;
        let end_marker = site.end_marker_visible(container).await?;
        let observation = ListObservation {
            iteration: state.iteration,
            metrics,
            loading,
            end_marker,
            collected: state.collected.len(),
            expected_total: state.expected_total,
            consecutive_no_growth: state.consecutive_no_growth,
        };
        if let Some(reason) = detector.observe(&observation) {
            return Ok(Step::Stop(reason));
        }

        state.technique_iterations += 1;
        let report = self
            .driver
            .advance(site, container, state.technique, state.technique_iterations, metrics)
            .await?;

        if report.height_changed() {
            state.same_height_iterations = 0;
        } else {
            state.same_height_iterations += 1;
        }
        state.consecutive_stale_failures = 0;

        tracing::debug!(
            iteration = state.iteration,
            collected = state.collected.len(),
            new_records,
            no_growth = state.consecutive_no_growth,
            technique = %state.technique,
            moved = report.moved(),
            "iteration finished"
        );

        if state.same_height_iterations >= self.config.height_stagnation_limit {
            state.same_height_iterations = 0;
            return Ok(Step::Relocate);
        }
        Ok(Step::Continue)
    }

    /// Extracts every row in the rendered window. Virtualized lists slide the
    /// window as well as growing it, so positions say nothing about which
    /// rows were seen; repeats fall out in the record set.
    async fn harvest<S: ScrollSurface>(
        site: &mut S,
        container: &S::Container,
        state: &mut LoopState,
        stats: &mut CollectionStats,
    ) -> Result<usize, CollectError> {
        let items = site.visible_items(container).await?;

        let mut new_records = 0;
        for (idx, item) in items.iter().enumerate() {
            match site.extract(item).await {
                Ok(record) => {
                    if state.collected.insert(record) {
                        new_records += 1;
                    } else {
                        stats.duplicates_dropped += 1;
                    }
                }
                Err(err) if err.class() == FailureClass::Extraction => {
                    stats.extraction_failures += 1;
                    tracing::debug!(position = idx, error = %err, "skipping unreadable row");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(new_records)
    }

    /// Routes one failure. `Ok(Some)` carries a replacement container.
    async fn handle_failure<S>(
        &self,
        site: &mut S,
        err: CollectError,
        state: &mut LoopState,
        recovery: &mut RecoveryController,
        stats: &mut CollectionStats,
    ) -> Result<Option<S::Container>, StopReason>
    where
        S: ScrollSurface + SessionGuard,
    {
        match err.class() {
            FailureClass::TransientDom => {
                state.stale_failures += 1;
                state.consecutive_stale_failures += 1;
                stats.stale_failures += 1;
                tracing::warn!(
                    stale_failures = state.stale_failures,
                    consecutive = state.consecutive_stale_failures,
                    error = %err,
                    "stale list element"
                );

                if state.stale_failures > self.config.stale_ceiling {
                    tracing::error!(
                        stale_failures = state.stale_failures,
                        "too many stale elements, stopping"
                    );
                    return Err(StopReason::StaleCircuitBreaker);
                }
                if state.consecutive_stale_failures > self.config.stale_escalation {
                    let container = recovery.refresh(site).await?;
                    state.consecutive_stale_failures = 0;
                    return Ok(Some(container));
                }
                recovery.restore(site).await.map(Some)
            }
            FailureClass::ContainerLost => {
                tracing::warn!(error = %err, "follower list container lost");
                recovery.restore(site).await.map(Some)
            }
            FailureClass::Interstitial | FailureClass::SessionExpired => {
                tracing::warn!(error = %err, "session interrupted, re-authenticating");
                recovery.recover_session(site).await.map(Some)
            }
            FailureClass::Extraction => {
                stats.extraction_failures += 1;
                Ok(None)
            }
            FailureClass::Fatal => {
                tracing::error!(error = %err, "unrecoverable collection failure");
                Err(StopReason::Fatal(err.to_string()))
            }
        }
    }

    /// Periodic checkpoints only fire when the interval has elapsed and the
    /// set grew; the final one is unconditional.
    fn checkpoint<K: CheckpointSink + ?Sized>(
        &self,
        session: &CollectionSession,
        state: &mut LoopState,
        sink: &mut K,
        stats: &mut CollectionStats,
        is_final: bool,
    ) {
        if !is_final {
            let due = state.last_checkpoint.elapsed() >= self.config.checkpoint_interval;
            let grew = state
                .checkpointed_len
                .is_none_or(|len| state.collected.len() > len);
            if !due || !grew {
                return;
            }
        }

        state.last_checkpoint = Instant::now();
        match sink.checkpoint(&session.id, state.collected.as_slice()) {
            Ok(()) => {
                stats.checkpoints_written += 1;
                state.checkpointed_len = Some(state.collected.len());
                tracing::info!(
                    session_id = %session.id,
                    records = state.collected.len(),
                    is_final,
                    "progress checkpoint saved"
                );
            }
            Err(err) => {
                stats.checkpoint_failures += 1;
                tracing::warn!(session_id = %session.id, error = %err, "checkpoint failed");
            }
        }
    }
}
