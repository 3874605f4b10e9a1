//! Generation pipeline
//!
//! Cancellable background job that streams synthetic transactions into the
//! dashboard: one immediate seed batch, then batches at a fixed cadence until
//! the run target is reached. After a run completes the coordination layer
//! drives further growth one batch at a time via `NextBatch`, so every round
//! re-enters the idle/backpressure protocol.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::generator::{summarize, TransactionGenerator};
use crate::models::{TransactionRecord, TransactionSummary};

/// Records delivered synchronously-sized on `Init`, before streaming starts.
pub const SEED_COUNT: usize = 200;
pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug)]
pub enum GenerationCommand {
    Init { total: usize, batch_size: usize },
    NextBatch,
    Kill,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GenerationEvent {
    Seed {
        records: Vec<TransactionRecord>,
        summary: TransactionSummary,
    },
    Batch {
        records: Vec<TransactionRecord>,
        summary_delta: TransactionSummary,
        done: bool,
    },
}

/// Handle owning the spawned generation task. Callers own exactly one run at
/// a time; two interleaved `init` calls on the same worker are not supported.
pub struct GenerationWorker {
    commands: mpsc::Sender<GenerationCommand>,
    cancel: Arc<AtomicBool>,
}

impl GenerationWorker {
    pub fn spawn(events: mpsc::Sender<GenerationEvent>, stream_delay: Duration) -> Self {
        Self::spawn_with_generator(events, stream_delay, TransactionGenerator::new())
    }

    /// Deterministic variant for tests.
    pub fn spawn_with_generator(
        events: mpsc::Sender<GenerationEvent>,
        stream_delay: Duration,
        generator: TransactionGenerator,
    ) -> Self {
        let (commands, command_rx) = mpsc::channel(16);
        let cancel = Arc::new(AtomicBool::new(false));
        let task = WorkerTask {
            events,
            cancel: cancel.clone(),
            stream_delay,
            generator,
            offset: 0,
            batch_size: DEFAULT_BATCH_SIZE,
        };
        tokio::spawn(task.run(command_rx));
        Self { commands, cancel }
    }

    /// Start a fresh generation run. The seed batch is emitted immediately,
    /// then batches of up to `batch_size` records stream until `total`.
    /// An omitted batch size falls back to [`DEFAULT_BATCH_SIZE`].
    pub async fn init(&self, total: usize, batch_size: Option<usize>) -> Result<()> {
        let batch_size = batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        ensure!(batch_size > 0, "batch_size must be positive, got 0");
        self.cancel.store(false, Ordering::SeqCst);
        self.commands
            .send(GenerationCommand::Init { total, batch_size })
            .await
            .context("generation worker is gone")
    }

    /// Request one more batch at the current offset. Emitted with
    /// `done = true` so the round immediately re-signals idle.
    pub async fn next_batch(&self) -> Result<()> {
        self.commands
            .send(GenerationCommand::NextBatch)
            .await
            .context("generation worker is gone")
    }

    /// Cooperative cancellation: the worker stops emitting as soon as it
    /// observes the flag, and never emits the terminal `done` afterwards.
    pub async fn kill(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        let _ = self.commands.send(GenerationCommand::Kill).await;
    }
}

struct WorkerTask {
    events: mpsc::Sender<GenerationEvent>,
    cancel: Arc<AtomicBool>,
    stream_delay: Duration,
    generator: TransactionGenerator,
    offset: usize,
    batch_size: usize,
}

impl WorkerTask {
    async fn run(mut self, mut commands: mpsc::Receiver<GenerationCommand>) {
        info!("🛰️ generation worker up");
        while let Some(command) = commands.recv().await {
            match command {
                GenerationCommand::Init { total, batch_size } => {
                    self.offset = 0;
                    self.batch_size = batch_size;
                    info!(total, batch_size, "generation run starting");
                    if self.stream_run(total).await.is_err() {
                        // Receiver dropped; nothing left to stream to.
                        warn!("generation event channel closed mid-run");
                        break;
                    }
                }
                GenerationCommand::NextBatch => {
                    if self.next_batch().await.is_err() {
                        warn!("generation event channel closed");
                        break;
                    }
                }
                GenerationCommand::Kill => {
                    info!("🛑 generation worker shutting down");
                    break;
                }
            }
        }
    }

    /// Seed, then stream batches until `total` or cancellation.
    async fn stream_run(&mut self, total: usize) -> Result<(), ()> {
        let seed_count = total.min(SEED_COUNT);
        let records = self.generator.generate(seed_count, 0);
        let summary = summarize(&records);
        self.offset = seed_count;
        self.emit(GenerationEvent::Seed { records, summary }).await?;

        if self.offset >= total {
            // Seed already met the target; terminal empty batch closes the run.
            return self
                .emit(GenerationEvent::Batch {
                    records: Vec::new(),
                    summary_delta: TransactionSummary::default(),
                    done: true,
                })
                .await;
        }

        loop {
            if self.canceled() {
                debug!(offset = self.offset, "generation run canceled");
                return Ok(());
            }

            let count = self.batch_size.min(total - self.offset);
            let records = self.generator.generate(count, self.offset);
            let summary_delta = summarize(&records);
            self.offset += count;
            let done = self.offset >= total;

            if self.canceled() {
                debug!(offset = self.offset, "generation run canceled before emit");
                return Ok(());
            }
            self.emit(GenerationEvent::Batch {
                records,
                summary_delta,
                done,
            })
            .await?;

            if done {
                info!(produced = self.offset, "generation run complete");
                return Ok(());
            }
            // Fixed yield between batches so the host stays responsive. A
            // cancellation arriving during the pause is observed on resume.
            tokio::time::sleep(self.stream_delay).await;
        }
    }

    async fn next_batch(&mut self) -> Result<(), ()> {
        if self.canceled() {
            return Ok(());
        }
        tokio::time::sleep(self.stream_delay).await;
        if self.canceled() {
            return Ok(());
        }

        let records = self.generator.generate(self.batch_size, self.offset);
        let summary_delta = summarize(&records);
        self.offset += records.len();
        debug!(offset = self.offset, "continuation batch produced");
        self.emit(GenerationEvent::Batch {
            records,
            summary_delta,
            done: true,
        })
        .await
    }

    fn canceled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    async fn emit(&self, event: GenerationEvent) -> Result<(), ()> {
        self.events.send(event).await.map_err(|_| ())
    }
}
