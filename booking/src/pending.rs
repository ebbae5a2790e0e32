use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::order::model::OrderId;

/// Short-lived record bridging reservation creation and payment
/// settlement or expiry.
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    pub bill_code: String,
    pub order_id: OrderId,
    pub amount: u64,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
}

/// In-memory store keyed by bill code.
///
/// `take` removes and returns the record in one step, the single
/// arbitration point for the settlement/timeout race: whoever takes the
/// record acts on it, the loser sees nothing. A record past its TTL is as
/// good as absent.
pub struct PendingStore {
    entries: Mutex<HashMap<String, PendingTransaction>>,
}

impl PendingStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, tx: PendingTransaction) {
        debug!(bill_code = %tx.bill_code, expires_at_ms = tx.expires_at_ms, "pending transaction stored");
        self.entries.lock().insert(tx.bill_code.clone(), tx);
    }

    pub fn take(&self, bill_code: &str, now_ms: u64) -> Option<PendingTransaction> {
        let tx = self.entries.lock().remove(bill_code)?;
        if now_ms >= tx.expires_at_ms {
            debug!(bill_code, "pending transaction already past its TTL");
            return None;
        }
        Some(tx)
    }

    /// Non-consuming lookup; respects the TTL.
    pub fn get(&self, bill_code: &str, now_ms: u64) -> Option<PendingTransaction> {
        self.entries
            .lock()
            .get(bill_code)
            .filter(|tx| now_ms < tx.expires_at_ms)
            .cloned()
    }

    /// Housekeeping for records neither settlement nor expiry consumed.
    pub fn purge_expired(&self, now_ms: u64) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, tx| now_ms < tx.expires_at_ms);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for PendingStore {
    fn default() -> Self {
        Self::new()
    }
}
