//! Reservation coordination.
//!
//! `reserve` runs on the request path, in discrete phases:
//!   1. Validate the requested bucket set.
//!   2. Atomically mark the buckets Booked in the grid.
//!   3. Persist the order in AwaitingPayment with computed totals.
//!   4. Request the payment QR from the gateway (the only external await
//!      on the request path); failure reverts the hold before surfacing.
//!   5. Store the pending transaction; its TTL outlives the timeout
//!      window so the expiry watcher always finds it.
//!   6. Register the one-shot expiry entry with the watcher.
//!   7. Mirror the booked slots to the catalog (best-effort).
//!
//! There is no two-phase commit across these side effects; a crash
//! mid-sequence can leave an order AwaitingPayment without a watcher
//! entry, bounded by the pending record's TTL.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, field, info, instrument, warn};
use uuid::Uuid;

use common::logger::warn_if_slow;
use common::time::now_ms;
use grid::store::GridStore;
use grid::types::{BucketStatus, CourtId, GridKey, RateClass};

use crate::error::BookingError;
use crate::expiry::{ExpiryEntry, ExpiryHandle};
use crate::gateway::{PaymentGateway, SlotMirror, slot_update};
use crate::order::model::{Order, OrderId, OrderStatus};
use crate::order::store::OrderStore;
use crate::outbox::{CompensationJob, CompensationOutbox};
use crate::pending::{PendingStore, PendingTransaction};

#[derive(Debug, Clone)]
pub struct ReserveRequest {
    pub court_id: CourtId,
    pub date: chrono::NaiveDate,
    pub bucket_starts: Vec<chrono::NaiveTime>,
    pub customer_name: String,
    pub customer_phone: String,
    pub rate: RateClass,
}

/// What the customer gets back: the persisted order plus the renderable
/// payment artifact.
#[derive(Debug, Clone)]
pub struct ReservationTicket {
    pub order: Order,
    pub qr_code: String,
}

pub struct ReservationCoordinator {
    grids: Arc<GridStore>,
    orders: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    mirror: Arc<dyn SlotMirror>,
    pending: Arc<PendingStore>,
    expiry: ExpiryHandle,
    outbox: CompensationOutbox,

    reservation_timeout_ms: u64,
    pending_ttl_ms: u64,
}

impl ReservationCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        grids: Arc<GridStore>,
        orders: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        mirror: Arc<dyn SlotMirror>,
        pending: Arc<PendingStore>,
        expiry: ExpiryHandle,
        outbox: CompensationOutbox,
        reservation_timeout_ms: u64,
        pending_ttl_ms: u64,
    ) -> Self {
        Self {
            grids,
            orders,
            gateway,
            mirror,
            pending,
            expiry,
            outbox,
            reservation_timeout_ms,
            pending_ttl_ms,
        }
    }

    #[instrument(
        skip(self, req),
        target = "reserve",
        fields(court_id = req.court_id, date = %req.date, order_id = field::Empty)
    )]
    pub async fn reserve(
        &self,
        req: ReserveRequest,
        now_ms: u64,
    ) -> Result<ReservationTicket, BookingError> {
        if req.bucket_starts.is_empty() {
            return Err(BookingError::Validation(
                "at least one bucket must be requested".to_string(),
            ));
        }

        let mut starts = req.bucket_starts.clone();
        starts.sort();
        starts.dedup();

        let key = GridKey::new(req.court_id, req.date);

        // Atomic hold: all requested buckets flip to Booked or nothing
        // changes and the caller gets a retryable conflict.
        let booked = self.grids.try_reserve(key, &starts, now_ms).await?;

        let amount: u64 = booked.iter().map(|b| b.price_for(req.rate)).sum();
        let bill_code = Uuid::new_v4().simple().to_string();

        let mut order = Order {
            order_id: Uuid::new_v4(),
            court_id: req.court_id,
            date: req.date,
            bucket_starts: starts.clone(),
            customer_name: req.customer_name,
            customer_phone: req.customer_phone,
            rate: req.rate,
            amount,
            bill_code: bill_code.clone(),
            status: OrderStatus::Created,
            created_at_ms: now_ms,
            settled_at_ms: None,
        };
        order.transition(OrderStatus::AwaitingPayment)?;

        tracing::Span::current().record("order_id", field::display(&order.order_id));

        if let Err(e) = warn_if_slow("order_save", Duration::from_millis(100), async {
            self.orders.save(&order).await
        })
        .await
        {
            self.revert_hold(key, &starts).await;
            return Err(BookingError::Internal(
                e.context("failed to persist new order"),
            ));
        }

        let qr = match warn_if_slow("paygate_qr", Duration::from_millis(2_000), async {
            self.gateway.request_qr(&bill_code, amount).await
        })
        .await
        {
            Ok(qr) => qr,
            Err(e) => {
                warn!(error = ?e, %bill_code, "payment QR request failed; reverting hold");
                self.revert_hold(key, &starts).await;

                // The order stays on record, just not payable.
                if order.transition(OrderStatus::Cancelled).is_ok() {
                    if let Err(e) = self.orders.save(&order).await {
                        error!(error = ?e, "failed to persist cancelled order");
                    }
                }

                return Err(BookingError::ExternalService(e.to_string()));
            }
        };

        self.pending.insert(PendingTransaction {
            bill_code: bill_code.clone(),
            order_id: order.order_id,
            amount,
            created_at_ms: now_ms,
            expires_at_ms: now_ms + self.pending_ttl_ms,
        });

        let entry = ExpiryEntry {
            bill_code: bill_code.clone(),
            order_id: order.order_id,
            key,
            bucket_starts: starts.clone(),
        };
        if let Err(e) = self
            .expiry
            .schedule(entry, Duration::from_millis(self.reservation_timeout_ms))
            .await
        {
            // The pending record's TTL remains the backstop.
            warn!(error = ?e, "expiry watcher unavailable");
        }

        if let Err(e) = self
            .mirror
            .push_slots(&slot_update(key, BucketStatus::Booked, &starts))
            .await
        {
            warn!(error = ?e, "booked-slot sync failed");
        }

        info!(%bill_code, amount, buckets = starts.len(), "reservation created");

        Ok(ReservationTicket {
            order,
            qr_code: qr.qr_code,
        })
    }

    /// Manual cancellation of an unpaid reservation: order Cancelled,
    /// buckets reverted, pending record removed so the expiry watcher
    /// becomes a no-op.
    #[instrument(skip(self), target = "reserve", fields(order_id = %order_id))]
    pub async fn cancel(&self, order_id: OrderId, now_ms: u64) -> Result<Order, BookingError> {
        let mut order = self
            .orders
            .fetch_by_id(&order_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("order {order_id}")))?;

        order.transition(OrderStatus::Cancelled)?;
        self.orders.save(&order).await?;

        let key = GridKey::new(order.court_id, order.date);
        self.revert_hold(key, &order.bucket_starts).await;
        self.pending.take(&order.bill_code, now_ms);

        info!("reservation cancelled");
        Ok(order)
    }

    /// Compensation for a failed late phase. A failed first attempt goes
    /// to the retry outbox rather than being dropped.
    async fn revert_hold(&self, key: GridKey, starts: &[chrono::NaiveTime]) {
        if let Err(e) = self.grids.release(key, starts, now_ms()).await {
            let failure = BookingError::Compensation(e.to_string());
            error!(code = failure.code(), error = %failure, %key, "buckets left booked; queued for retry");
            self.outbox.submit(CompensationJob::ReleaseBuckets {
                key,
                starts: starts.to_vec(),
            });
        }

        let update = slot_update(key, BucketStatus::Available, starts);
        if let Err(e) = self.mirror.push_slots(&update).await {
            warn!(error = ?e, "available-slot sync failed; queued for retry");
            self.outbox.submit(CompensationJob::MirrorSlots { update });
        }
    }
}
