//! Expiry and compensation scheduling.
//!
//! Two independent duties:
//! - A one-shot expiry watcher per reservation, multiplexed onto a single
//!   task: deadlines live in one min-heap and the task sleeps until the
//!   earliest, so no thread or task is parked per outstanding order.
//! - A periodic lock sweep that marks past-time buckets Locked on every
//!   cached grid dated today.
//!
//! The watcher is never cancelled when settlement wins; it always fires
//! and performs a cheap existence check on the pending record. First
//! writer wins on that record, nothing else arbitrates the race.
//! Per-entry failures are logged and never abort either loop.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tracing::{debug, error, info, warn};

use common::time::now_ms;
use grid::store::GridStore;
use grid::types::{BucketStatus, GridKey};

use crate::gateway::{SlotMirror, slot_update};
use crate::notify::{Envelope, Notifier};
use crate::order::model::{OrderId, OrderStatus};
use crate::order::store::OrderStore;
use crate::outbox::{CompensationJob, CompensationOutbox};
use crate::pending::PendingStore;

/// Everything the watcher needs to compensate one reservation.
#[derive(Debug, Clone)]
pub struct ExpiryEntry {
    pub bill_code: String,
    pub order_id: OrderId,
    pub key: GridKey,
    pub bucket_starts: Vec<chrono::NaiveTime>,
}

struct Scheduled {
    due: Instant,
    seq: u64,
    entry: ExpiryEntry,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

#[derive(Clone)]
pub struct ExpiryHandle {
    tx: mpsc::Sender<(Instant, ExpiryEntry)>,
}

impl ExpiryHandle {
    /// Register a one-shot expiry `after` the given delay.
    pub async fn schedule(&self, entry: ExpiryEntry, after: Duration) -> anyhow::Result<()> {
        self.tx
            .send((Instant::now() + after, entry))
            .await
            .map_err(|_| anyhow::anyhow!("expiry watcher is gone"))
    }
}

pub fn expiry_channel(
    capacity: usize,
) -> (ExpiryHandle, mpsc::Receiver<(Instant, ExpiryEntry)>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ExpiryHandle { tx }, rx)
}

pub struct ExpiryWatcher {
    grids: Arc<GridStore>,
    orders: Arc<dyn OrderStore>,
    pending: Arc<PendingStore>,
    mirror: Arc<dyn SlotMirror>,
    notify: Arc<Notifier>,
    outbox: CompensationOutbox,
}

impl ExpiryWatcher {
    pub fn new(
        grids: Arc<GridStore>,
        orders: Arc<dyn OrderStore>,
        pending: Arc<PendingStore>,
        mirror: Arc<dyn SlotMirror>,
        notify: Arc<Notifier>,
        outbox: CompensationOutbox,
    ) -> Self {
        Self {
            grids,
            orders,
            pending,
            mirror,
            notify,
            outbox,
        }
    }

    /// Watcher loop. Exits when every handle is dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<(Instant, ExpiryEntry)>) {
        info!(component = "expiry", event = "startup", "expiry watcher started");

        let mut heap: BinaryHeap<Reverse<Scheduled>> = BinaryHeap::new();
        let mut seq = 0u64;

        loop {
            let next_due = heap.peek().map(|Reverse(s)| s.due);

            tokio::select! {
                received = rx.recv() => {
                    match received {
                        Some((due, entry)) => {
                            seq += 1;
                            heap.push(Reverse(Scheduled { due, seq, entry }));
                        }
                        None => break,
                    }
                }
                _ = async {
                    match next_due {
                        Some(due) => sleep_until(due).await,
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    if let Some(Reverse(s)) = heap.pop() {
                        self.fire(s.entry).await;
                    }
                }
            }
        }

        warn!(component = "expiry", "expiry channel closed; watcher exiting");
    }

    /// One timed-out reservation. Settlement may have won in the
    /// meantime; the pending record decides.
    async fn fire(&self, entry: ExpiryEntry) {
        let now = now_ms();

        let Some(tx) = self.pending.take(&entry.bill_code, now) else {
            debug!(bill_code = %entry.bill_code, "pending record gone; settlement won the race");
            return;
        };

        info!(
            order_id = %entry.order_id,
            bill_code = %entry.bill_code,
            amount = tx.amount,
            "reservation timed out; compensating"
        );

        match self.orders.fetch_by_id(&entry.order_id).await {
            Ok(Some(mut order)) => match order.transition(OrderStatus::Expired) {
                Ok(()) => {
                    if let Err(e) = self.orders.save(&order).await {
                        error!(error = ?e, "failed to persist expired order");
                    }
                }
                Err(e) => warn!(error = %e, "order not in an expirable state"),
            },
            Ok(None) => warn!(order_id = %entry.order_id, "timed-out order not found"),
            Err(e) => error!(error = ?e, "order lookup failed during expiry"),
        }

        if let Err(e) = self
            .grids
            .release(entry.key, &entry.bucket_starts, now)
            .await
        {
            error!(error = ?e, key = %entry.key, "compensation failed; buckets queued for retry");
            self.outbox.submit(CompensationJob::ReleaseBuckets {
                key: entry.key,
                starts: entry.bucket_starts.clone(),
            });
        }

        let update = slot_update(entry.key, BucketStatus::Available, &entry.bucket_starts);
        if let Err(e) = self.mirror.push_slots(&update).await {
            warn!(error = ?e, "compensating slot sync failed; queued for retry");
            self.outbox.submit(CompensationJob::MirrorSlots { update });
        }

        self.notify.push(
            &entry.order_id.to_string(),
            Envelope {
                key: entry.order_id.to_string(),
                result_code: "EXPIRED".to_string(),
                description: format!("reservation of {} expired unpaid", tx.amount),
            },
            now,
        );
    }
}

/// One pass of the lock sweep over every cached grid for `today`, plus
/// TTL housekeeping. Returns (buckets locked, records purged).
pub async fn sweep_pass(
    grids: &GridStore,
    pending: &PendingStore,
    notify: &Notifier,
    today: chrono::NaiveDate,
    time_now: chrono::NaiveTime,
    now_ms: u64,
) -> (usize, usize) {
    let mut locked = 0usize;
    for key in grids.keys_for(today) {
        locked += grids.lock_elapsed(key, time_now).await;
    }

    let purged = pending.purge_expired(now_ms) + notify.purge_expired(now_ms);
    (locked, purged)
}

/// Periodic lock sweep. Runs forever at the configured cadence; a slow
/// pass skips missed ticks rather than bunching them up.
pub async fn run_lock_sweep(
    grids: Arc<GridStore>,
    pending: Arc<PendingStore>,
    notify: Arc<Notifier>,
    every: Duration,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(every_ms = every.as_millis() as u64, "lock sweep started");

    loop {
        ticker.tick().await;

        let now = Utc::now();
        let (locked, purged) = sweep_pass(
            &grids,
            &pending,
            &notify,
            now.date_naive(),
            now.time(),
            now_ms(),
        )
        .await;

        if locked > 0 || purged > 0 {
            info!(locked, purged, "sweep pass complete");
        }
    }
}
