use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use tracing::{debug, instrument};

use grid::pricing::PricingSource;
use grid::types::{CourtId, PriceRule};

use crate::catalog::errors::CatalogError;
use crate::catalog::types::{PriceRuleDto, SlotUpdate};

/// HTTP client for the catalog collaborator: price rules in, booking-slot
/// sync out.
#[derive(Clone)]
pub struct CatalogClient {
    http: Client,
    url: String,
}

impl CatalogClient {
    pub fn new(url: String) -> Result<Self, CatalogError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self { http, url })
    }

    #[instrument(skip(self), fields(court_id = court_id, date = %date), level = "debug")]
    pub async fn fetch_price_rules(
        &self,
        court_id: CourtId,
        date: NaiveDate,
    ) -> Result<Vec<PriceRule>, CatalogError> {
        let url = format!("{}/courts/{}/pricing?date={}", self.url, court_id, date);

        let resp = self.http.get(&url).send().await?.error_for_status()?;
        let dtos: Vec<PriceRuleDto> = resp.json().await?;

        debug!(rules = dtos.len(), "price rules fetched");

        dtos.into_iter().map(PriceRuleDto::into_rule).collect()
    }

    /// Mirror a bucket-status transition into the catalog's view.
    #[instrument(
        skip(self, update),
        fields(resource_id = update.resource_id, status = %update.status),
        level = "debug"
    )]
    pub async fn push_slot_update(&self, update: &SlotUpdate) -> Result<(), CatalogError> {
        let url = format!("{}/slots", self.url);

        self.http
            .post(&url)
            .json(update)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

#[async_trait]
impl PricingSource for CatalogClient {
    async fn price_rules(
        &self,
        court_id: CourtId,
        date: NaiveDate,
    ) -> anyhow::Result<Vec<PriceRule>> {
        Ok(self.fetch_price_rules(court_id, date).await?)
    }
}
