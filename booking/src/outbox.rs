//! Retry queue for compensating calls.
//!
//! Reverting a hold touches two places: the grid and the catalog mirror.
//! A first attempt that fails is handed here instead of being dropped;
//! the worker retries with a fixed backoff and bounded attempts. A job
//! that exhausts its attempts is logged and left to manual
//! reconciliation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use adapters::catalog::types::SlotUpdate;
use common::time::now_ms;
use grid::store::GridStore;
use grid::types::GridKey;

use crate::gateway::SlotMirror;

const MAX_ATTEMPTS: u32 = 5;
const RETRY_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub enum CompensationJob {
    ReleaseBuckets {
        key: GridKey,
        starts: Vec<chrono::NaiveTime>,
    },
    MirrorSlots {
        update: SlotUpdate,
    },
}

#[derive(Clone)]
pub struct CompensationOutbox {
    tx: mpsc::Sender<CompensationJob>,
}

impl CompensationOutbox {
    /// Hand over a compensating call that failed its first attempt.
    pub fn submit(&self, job: CompensationJob) {
        if self.tx.try_send(job).is_err() {
            error!("compensation outbox unavailable; manual reconciliation required");
        }
    }
}

pub fn outbox_channel(capacity: usize) -> (CompensationOutbox, mpsc::Receiver<CompensationJob>) {
    let (tx, rx) = mpsc::channel(capacity);
    (CompensationOutbox { tx }, rx)
}

pub struct CompensationWorker {
    grids: Arc<GridStore>,
    mirror: Arc<dyn SlotMirror>,
}

impl CompensationWorker {
    pub fn new(grids: Arc<GridStore>, mirror: Arc<dyn SlotMirror>) -> Self {
        Self { grids, mirror }
    }

    /// Worker loop; one job at a time, retries included.
    pub async fn run(self, mut rx: mpsc::Receiver<CompensationJob>) {
        info!(component = "outbox", event = "startup", "compensation worker started");

        while let Some(job) = rx.recv().await {
            self.drive(job).await;
        }

        warn!(component = "outbox", "outbox channel closed; worker exiting");
    }

    async fn drive(&self, job: CompensationJob) {
        for attempt in 1..=MAX_ATTEMPTS {
            match self.apply(&job).await {
                Ok(()) => {
                    if attempt > 1 {
                        info!(attempt, "compensation applied after retry");
                    }
                    return;
                }
                Err(e) => {
                    warn!(attempt, error = ?e, "compensation attempt failed");
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(RETRY_BACKOFF).await;
                    }
                }
            }
        }

        error!(job = ?job, "compensation exhausted retries; manual reconciliation required");
    }

    async fn apply(&self, job: &CompensationJob) -> anyhow::Result<()> {
        match job {
            CompensationJob::ReleaseBuckets { key, starts } => {
                self.grids.release(*key, starts, now_ms()).await?;
                Ok(())
            }
            CompensationJob::MirrorSlots { update } => self.mirror.push_slots(update).await,
        }
    }
}
