//! Payment settlement correlation.
//!
//! The pending store's `take` is the idempotency boundary: the first
//! successful settlement consumes the record, so a replayed notification
//! (or one racing the expiry watcher) resolves to nothing and returns
//! cleanly with no state change.

use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use adapters::paygate::types::PaymentNotification;

use crate::error::BookingError;
use crate::notify::{Envelope, Notifier};
use crate::order::model::{LedgerEntry, OrderStatus};
use crate::order::store::OrderStore;
use crate::pending::PendingStore;

pub struct SettlementProcessor {
    pending: Arc<PendingStore>,
    orders: Arc<dyn OrderStore>,
    notify: Arc<Notifier>,
}

impl SettlementProcessor {
    pub fn new(
        pending: Arc<PendingStore>,
        orders: Arc<dyn OrderStore>,
        notify: Arc<Notifier>,
    ) -> Self {
        Self {
            pending,
            orders,
            notify,
        }
    }

    /// Correlate one asynchronous payment confirmation.
    ///
    /// Safe to invoke any number of times per bill code; only the first
    /// successful call transitions the order and appends a ledger entry.
    /// The grid is not touched: Booked is now a confirmed booking, not a
    /// hold.
    #[instrument(
        skip(self, n),
        target = "settle",
        fields(bill_code = %n.bill_code, result_code = %n.result_code)
    )]
    pub async fn settle(
        &self,
        n: &PaymentNotification,
        now_ms: u64,
    ) -> Result<(), BookingError> {
        if !n.is_success() {
            // A failed payment keeps its hold; the expiry watcher reverts it.
            warn!("payment failed at the gateway; leaving compensation to the expiry watcher");
            return Ok(());
        }

        let Some(tx) = self.pending.take(&n.bill_code, now_ms) else {
            debug!("no pending transaction for bill code; replay or late notification discarded");
            return Ok(());
        };

        if n.paid_amount != tx.amount {
            warn!(
                expected = tx.amount,
                paid = n.paid_amount,
                "settled amount differs from pending amount"
            );
        }

        let mut order = self
            .orders
            .fetch_by_id(&tx.order_id)
            .await
            .context("order lookup failed during settlement")?
            .ok_or_else(|| {
                BookingError::NotFound(format!(
                    "order {} behind bill code {}",
                    tx.order_id, n.bill_code
                ))
            })?;

        order.transition(OrderStatus::Paid)?;
        order.settled_at_ms = Some(now_ms);
        self.orders
            .save(&order)
            .await
            .context("failed to persist paid order")?;

        self.orders
            .append_ledger(&LedgerEntry {
                entry_id: Uuid::new_v4(),
                order_id: order.order_id,
                amount: n.paid_amount,
                external_ref: n.transaction_ref.clone(),
                recorded_at_ms: now_ms,
            })
            .await
            .context("failed to append ledger entry")?;

        self.notify.push(
            &order.order_id.to_string(),
            Envelope {
                key: order.order_id.to_string(),
                result_code: "PAID".to_string(),
                description: format!("payment of {} confirmed", n.paid_amount),
            },
            now_ms,
        );

        info!(order_id = %order.order_id, amount = n.paid_amount, "reservation settled");
        Ok(())
    }
}
