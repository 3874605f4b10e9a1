//! Coordination layer
//!
//! Single owner of the dashboard dataset and of the two background pipelines.
//! Backpressure protocol: while an analysis is pending or running, generation
//! idle signals are deferred and released only when the analysis completes.
//! Visible-set changes are debounced before a fresh analysis is dispatched,
//! and only the most recent snapshot is ever handed to the analytics worker.
//!
//! `CoordinatorState` holds the protocol flags and is pure (every transition
//! returns an explicit [`Action`]); `Coordinator::run` is the event loop that
//! executes those actions.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::analytics::{AnalyticsEvent, AnalyticsWorker};
use crate::config::Config;
use crate::filter;
use crate::generation::{GenerationEvent, GenerationWorker};
use crate::models::{FilterCriteria, RiskSummary, TransactionRecord, TransactionSummary};

/// What the event loop must do after a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    /// Analytics is busy; remember the idle signal and release it later.
    DeferBatch,
    /// Ask the generation worker for the next batch now.
    RequestNextBatch,
    /// Arm the debounce timer for a fresh analysis dispatch.
    ScheduleAnalyze,
    /// Drop the in-flight analysis and clear analytics state; optionally
    /// release a batch that was deferred behind it.
    CancelAnalytics { release_batch: bool },
}

/// Protocol flags with one authoritative owner and a single mutation point
/// per transition.
#[derive(Debug)]
pub struct CoordinatorState {
    analyzing: bool,
    batch_pending: bool,
    min_analyze_threshold: usize,
}

impl CoordinatorState {
    pub fn new(min_analyze_threshold: usize) -> Self {
        Self {
            analyzing: false,
            batch_pending: false,
            min_analyze_threshold,
        }
    }

    pub fn analyzing(&self) -> bool {
        self.analyzing
    }

    pub fn batch_pending(&self) -> bool {
        self.batch_pending
    }

    /// Generation signaled idle (a round finished with `done = true`).
    pub fn on_generation_idle(&mut self) -> Action {
        if self.analyzing {
            self.batch_pending = true;
            Action::DeferBatch
        } else {
            Action::RequestNextBatch
        }
    }

    /// The current analysis job completed (success, not cancellation).
    pub fn on_analytics_complete(&mut self) -> Action {
        self.analyzing = false;
        if self.batch_pending {
            self.batch_pending = false;
            Action::RequestNextBatch
        } else {
            Action::None
        }
    }

    /// The visible record set changed. Below the minimum threshold analytics
    /// is torn down entirely; otherwise the record set is marked as being
    /// analyzed from this moment, covering the debounce window as well.
    pub fn on_visible_changed(&mut self, visible_len: usize) -> Action {
        if visible_len < self.min_analyze_threshold {
            self.analyzing = false;
            let release_batch = self.batch_pending;
            self.batch_pending = false;
            Action::CancelAnalytics { release_batch }
        } else {
            self.analyzing = true;
            Action::ScheduleAnalyze
        }
    }
}

/// Latest-value view published for the rendering layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardView {
    pub total_records: usize,
    pub visible_records: usize,
    pub summary: TransactionSummary,
    pub risk: Option<RiskSummary>,
    pub analyzing: bool,
    pub categories: Vec<String>,
}

/// Observability counters, exposed through snapshots for tests and logs.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CoordinatorStats {
    pub batches_requested: u64,
    pub batches_deferred: u64,
    pub analyses_dispatched: u64,
    pub analyses_completed: u64,
    pub stale_events_discarded: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorSnapshot {
    pub total_records: usize,
    pub visible_records: usize,
    pub analyzing: bool,
    pub batch_pending: bool,
    pub stats: CoordinatorStats,
}

#[derive(Debug)]
pub enum CoordinatorCommand {
    SetFilters(FilterCriteria),
    /// Compact view caps filter evaluation at the configured page size.
    SetCompactView(bool),
    Snapshot(oneshot::Sender<CoordinatorSnapshot>),
    Shutdown,
}

/// Cloneable foreground handle to the running coordinator.
#[derive(Clone)]
pub struct DashboardHandle {
    commands: mpsc::Sender<CoordinatorCommand>,
    view: watch::Receiver<DashboardView>,
}

impl DashboardHandle {
    pub fn view(&self) -> watch::Receiver<DashboardView> {
        self.view.clone()
    }

    pub async fn set_filters(&self, criteria: FilterCriteria) -> Result<()> {
        self.commands
            .send(CoordinatorCommand::SetFilters(criteria))
            .await
            .context("coordinator is gone")
    }

    pub async fn set_compact_view(&self, enabled: bool) -> Result<()> {
        self.commands
            .send(CoordinatorCommand::SetCompactView(enabled))
            .await
            .context("coordinator is gone")
    }

    pub async fn snapshot(&self) -> Result<CoordinatorSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(CoordinatorCommand::Snapshot(tx))
            .await
            .context("coordinator is gone")?;
        rx.await.context("coordinator dropped snapshot request")
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.commands
            .send(CoordinatorCommand::Shutdown)
            .await
            .context("coordinator is gone")
    }
}

pub struct Coordinator {
    config: Config,
    generation: GenerationWorker,
    analytics: AnalyticsWorker,
    generation_events: mpsc::Receiver<GenerationEvent>,
    analytics_events: mpsc::Receiver<AnalyticsEvent>,
    commands: mpsc::Receiver<CoordinatorCommand>,
    view_tx: watch::Sender<DashboardView>,

    dataset: Vec<TransactionRecord>,
    summary: TransactionSummary,
    risk: Option<RiskSummary>,
    criteria: FilterCriteria,
    compact_limit: Option<usize>,
    visible: Vec<usize>,
    state: CoordinatorState,
    stats: CoordinatorStats,
}

impl Coordinator {
    /// Wire up both workers and spawn the coordinator event loop.
    pub fn spawn(config: Config) -> DashboardHandle {
        let (gen_tx, generation_events) = mpsc::channel(64);
        let (analytics_tx, analytics_events) = mpsc::channel(64);
        let generation =
            GenerationWorker::spawn(gen_tx, Duration::from_millis(config.stream_delay_ms));
        let analytics = AnalyticsWorker::spawn(analytics_tx);

        let (command_tx, commands) = mpsc::channel(32);
        let (view_tx, view_rx) = watch::channel(DashboardView::default());

        let coordinator = Self {
            state: CoordinatorState::new(config.min_analyze_threshold),
            config,
            generation,
            analytics,
            generation_events,
            analytics_events,
            commands,
            view_tx,
            dataset: Vec::new(),
            summary: TransactionSummary::default(),
            risk: None,
            criteria: FilterCriteria::default(),
            compact_limit: None,
            visible: Vec::new(),
            stats: CoordinatorStats::default(),
        };
        tokio::spawn(coordinator.run());

        DashboardHandle {
            commands: command_tx,
            view: view_rx,
        }
    }

    async fn run(mut self) {
        info!(
            total = self.config.total_transactions,
            batch = self.config.batch_size,
            "📊 dashboard coordinator starting"
        );
        if let Err(err) = self
            .generation
            .init(self.config.total_transactions, Some(self.config.batch_size))
            .await
        {
            warn!(%err, "could not start generation run");
        }

        // Cancellable scheduled dispatch: resetting the deadline before it
        // fires replaces the pending analysis with a later one.
        let mut debounce: Option<Instant> = None;

        loop {
            tokio::select! {
                Some(event) = self.generation_events.recv() => {
                    self.handle_generation_event(event, &mut debounce).await;
                }
                Some(event) = self.analytics_events.recv() => {
                    self.handle_analytics_event(event).await;
                }
                command = self.commands.recv() => {
                    match command {
                        Some(CoordinatorCommand::SetFilters(criteria)) => {
                            self.criteria = criteria;
                            self.refresh_visible(&mut debounce).await;
                        }
                        Some(CoordinatorCommand::SetCompactView(enabled)) => {
                            self.compact_limit = enabled.then_some(self.config.items_per_page);
                            self.refresh_visible(&mut debounce).await;
                        }
                        Some(CoordinatorCommand::Snapshot(reply)) => {
                            let _ = reply.send(self.snapshot());
                        }
                        Some(CoordinatorCommand::Shutdown) | None => break,
                    }
                }
                _ = tokio::time::sleep_until(debounce.unwrap_or_else(Instant::now)),
                        if debounce.is_some() => {
                    debounce = None;
                    self.dispatch_analysis().await;
                }
            }
            self.publish_view();
        }

        info!("📊 dashboard coordinator shutting down");
        self.generation.kill().await;
        self.analytics.kill().await;
    }

    async fn handle_generation_event(
        &mut self,
        event: GenerationEvent,
        debounce: &mut Option<Instant>,
    ) {
        match event {
            GenerationEvent::Seed { records, summary } => {
                debug!(count = records.len(), "seed batch received");
                self.dataset = records;
                self.summary = summary;
                self.risk = None;
                self.refresh_visible(debounce).await;
            }
            GenerationEvent::Batch {
                records,
                summary_delta,
                done,
            } => {
                if !records.is_empty() {
                    self.dataset.extend(records);
                    self.summary.merge(&summary_delta);
                    self.refresh_visible(debounce).await;
                }
                if done {
                    self.on_idle().await;
                }
            }
        }
    }

    async fn handle_analytics_event(&mut self, event: AnalyticsEvent) {
        // Receiver-side staleness check: an in-flight send for a superseded
        // job is discarded here even though the sender also checks.
        if event.job() != self.analytics.current_job() {
            self.stats.stale_events_discarded += 1;
            debug!(job = event.job(), "discarding stale analytics event");
            return;
        }

        match event {
            AnalyticsEvent::Partial {
                summary, processed, total, ..
            } => {
                debug!(processed, total, "partial risk summary");
                self.risk = Some(summary);
            }
            AnalyticsEvent::Complete {
                summary, total, ..
            } => {
                debug!(total, high_risk = summary.high_risk_count, "risk analysis complete");
                self.risk = Some(summary);
                self.stats.analyses_completed += 1;
                if self.state.on_analytics_complete() == Action::RequestNextBatch {
                    self.request_next_batch().await;
                }
            }
        }
    }

    /// A generation round finished; either keep the feed flowing or park it
    /// behind the running analysis.
    async fn on_idle(&mut self) {
        match self.state.on_generation_idle() {
            Action::RequestNextBatch => self.request_next_batch().await,
            Action::DeferBatch => {
                self.stats.batches_deferred += 1;
                debug!("generation idle while analyzing, batch deferred");
            }
            _ => {}
        }
    }

    async fn request_next_batch(&mut self) {
        self.stats.batches_requested += 1;
        if let Err(err) = self.generation.next_batch().await {
            warn!(%err, "could not request next generation batch");
        }
    }

    /// Re-derive the visible subset; if it changed, reset the debounce and
    /// run the analytics gating transition.
    async fn refresh_visible(&mut self, debounce: &mut Option<Instant>) {
        let visible = filter::evaluate(&self.dataset, &self.criteria, self.compact_limit);
        if visible == self.visible {
            return;
        }
        self.visible = visible;
        *debounce = None;

        match self.state.on_visible_changed(self.visible.len()) {
            Action::ScheduleAnalyze => {
                *debounce =
                    Some(Instant::now() + Duration::from_millis(self.config.debounce_ms));
            }
            Action::CancelAnalytics { release_batch } => {
                debug!(visible = self.visible.len(), "below threshold, analysis torn down");
                self.analytics.cancel();
                self.risk = None;
                if release_batch {
                    // The deferred batch would otherwise hang forever since
                    // no Complete event is coming.
                    self.request_next_batch().await;
                }
            }
            _ => {}
        }
    }

    /// Debounce elapsed uninterrupted: hand the latest visible snapshot to
    /// the analytics worker. Intermediate snapshots are never dispatched.
    async fn dispatch_analysis(&mut self) {
        let snapshot: Vec<TransactionRecord> = self
            .visible
            .iter()
            .map(|&index| self.dataset[index].clone())
            .collect();
        debug!(records = snapshot.len(), "dispatching risk analysis");
        match self.analytics.analyze(snapshot, Some(self.config.chunk_size)).await {
            Ok(_) => self.stats.analyses_dispatched += 1,
            Err(err) => warn!(%err, "could not dispatch analysis"),
        }
    }

    fn snapshot(&self) -> CoordinatorSnapshot {
        CoordinatorSnapshot {
            total_records: self.dataset.len(),
            visible_records: self.visible.len(),
            analyzing: self.state.analyzing(),
            batch_pending: self.state.batch_pending(),
            stats: self.stats,
        }
    }

    fn publish_view(&self) {
        let _ = self.view_tx.send(DashboardView {
            total_records: self.dataset.len(),
            visible_records: self.visible.len(),
            summary: self.summary.clone(),
            risk: self.risk.clone(),
            analyzing: self.state.analyzing(),
            categories: filter::categories(&self.dataset),
        });
    }
}
