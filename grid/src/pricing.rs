use async_trait::async_trait;
use chrono::NaiveDate;

use crate::types::{CourtId, PriceRule};

/// Read side of the catalog collaborator: the configured price/time-slot
/// definitions a grid is built from.
#[async_trait]
pub trait PricingSource: Send + Sync {
    async fn price_rules(
        &self,
        court_id: CourtId,
        date: NaiveDate,
    ) -> anyhow::Result<Vec<PriceRule>>;
}
