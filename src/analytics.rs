//! Analytics pipeline
//!
//! Chunked, cancellable risk-analysis job over a snapshot of the visible
//! record set. Each `analyze` call supersedes the previous one via a
//! monotonically increasing job token; results from a stale token are dropped
//! on both sides of the channel.

use anyhow::{ensure, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::models::{RiskSummary, TransactionRecord};
use crate::scoring::{anomaly_score, combined_risk, pattern_score, HIGH_RISK_THRESHOLD};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

#[derive(Debug)]
pub enum AnalyticsCommand {
    Analyze {
        records: Vec<TransactionRecord>,
        chunk_size: usize,
        job: u64,
    },
    Kill,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnalyticsEvent {
    Partial {
        job: u64,
        summary: RiskSummary,
        processed: usize,
        total: usize,
    },
    Complete {
        job: u64,
        summary: RiskSummary,
        processed: usize,
        total: usize,
    },
}

impl AnalyticsEvent {
    pub fn job(&self) -> u64 {
        match self {
            AnalyticsEvent::Partial { job, .. } | AnalyticsEvent::Complete { job, .. } => *job,
        }
    }
}

/// Handle owning the spawned analytics task.
pub struct AnalyticsWorker {
    commands: mpsc::Sender<AnalyticsCommand>,
    token: Arc<AtomicU64>,
    canceled: Arc<AtomicBool>,
}

impl AnalyticsWorker {
    pub fn spawn(events: mpsc::Sender<AnalyticsEvent>) -> Self {
        let (commands, command_rx) = mpsc::channel(16);
        let token = Arc::new(AtomicU64::new(0));
        let canceled = Arc::new(AtomicBool::new(false));
        let task = WorkerTask {
            events,
            token: token.clone(),
            canceled: canceled.clone(),
        };
        tokio::spawn(task.run(command_rx));
        Self {
            commands,
            token,
            canceled,
        }
    }

    /// Start a fresh analysis job over `records`, superseding any run still
    /// in flight. An omitted chunk size falls back to [`DEFAULT_CHUNK_SIZE`].
    /// Returns the job token the run's events will carry.
    pub async fn analyze(
        &self,
        records: Vec<TransactionRecord>,
        chunk_size: Option<usize>,
    ) -> Result<u64> {
        let chunk_size = chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        ensure!(chunk_size > 0, "chunk_size must be positive, got 0");
        let job = self.token.fetch_add(1, Ordering::SeqCst) + 1;
        self.canceled.store(false, Ordering::SeqCst);
        self.commands
            .send(AnalyticsCommand::Analyze {
                records,
                chunk_size,
                job,
            })
            .await
            .context("analytics worker is gone")?;
        Ok(job)
    }

    /// Invalidate the current job. The run exits silently at its next
    /// cancellation check; no `Complete` is ever emitted for its token.
    pub fn cancel(&self) {
        self.token.fetch_add(1, Ordering::SeqCst);
        self.canceled.store(true, Ordering::SeqCst);
    }

    /// Cancel and shut the worker down permanently.
    pub async fn kill(&self) {
        self.cancel();
        let _ = self.commands.send(AnalyticsCommand::Kill).await;
    }

    /// Token of the most recently issued job; receivers discard events whose
    /// token does not match.
    pub fn current_job(&self) -> u64 {
        self.token.load(Ordering::SeqCst)
    }
}

struct WorkerTask {
    events: mpsc::Sender<AnalyticsEvent>,
    token: Arc<AtomicU64>,
    canceled: Arc<AtomicBool>,
}

impl WorkerTask {
    async fn run(self, mut commands: mpsc::Receiver<AnalyticsCommand>) {
        info!("🔬 analytics worker up");
        while let Some(command) = commands.recv().await {
            match command {
                AnalyticsCommand::Analyze {
                    records,
                    chunk_size,
                    job,
                } => {
                    if self.run_job(&records, chunk_size, job).await.is_err() {
                        warn!("analytics event channel closed mid-run");
                        break;
                    }
                }
                AnalyticsCommand::Kill => {
                    info!("🛑 analytics worker shutting down");
                    break;
                }
            }
        }
    }

    async fn run_job(
        &self,
        records: &[TransactionRecord],
        chunk_size: usize,
        job: u64,
    ) -> Result<(), ()> {
        let total = records.len();
        debug!(job, total, chunk_size, "analysis job starting");
        let mut summary = RiskSummary::new();

        for (index, record) in records.iter().enumerate() {
            if self.superseded(job) {
                debug!(job, processed = index, "analysis job superseded");
                return Ok(());
            }

            let risk = combined_risk(record, records);
            summary.total_risk_score += risk;
            if risk > HIGH_RISK_THRESHOLD {
                summary.high_risk_count += 1;
            }
            summary
                .patterns
                .insert(record.id.clone(), pattern_score(record, records));
            summary
                .anomalies
                .insert(record.id.clone(), anomaly_score(record, records));

            let processed = index + 1;
            if processed % chunk_size == 0 && processed < total {
                summary.generated_at = Utc::now();
                self.events
                    .send(AnalyticsEvent::Partial {
                        job,
                        summary: summary.clone(),
                        processed,
                        total,
                    })
                    .await
                    .map_err(|_| ())?;
                // Chunk boundary: hand control back so long runs never starve
                // the host.
                tokio::task::yield_now().await;
            }
        }

        if self.superseded(job) {
            debug!(job, "analysis job superseded before completion");
            return Ok(());
        }
        summary.generated_at = Utc::now();
        info!(
            job,
            total,
            high_risk = summary.high_risk_count,
            "analysis job complete"
        );
        self.events
            .send(AnalyticsEvent::Complete {
                job,
                summary,
                processed: total,
                total,
            })
            .await
            .map_err(|_| ())
    }

    fn superseded(&self, job: u64) -> bool {
        self.canceled.load(Ordering::SeqCst) || self.token.load(Ordering::SeqCst) != job
    }
}
