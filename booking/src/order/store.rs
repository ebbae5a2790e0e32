use anyhow::Result;
use async_trait::async_trait;

use crate::order::model::{LedgerEntry, Order, OrderId};

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert or update; upsert semantics keyed by order id.
    async fn save(&self, order: &Order) -> Result<()>;

    async fn fetch_by_id(&self, order_id: &OrderId) -> Result<Option<Order>>;

    async fn append_ledger(&self, entry: &LedgerEntry) -> Result<()>;

    async fn ledger_for(&self, order_id: &OrderId) -> Result<Vec<LedgerEntry>>;
}
