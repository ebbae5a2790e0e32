//! Collaborator seams of the booking core.
//!
//! The traits intentionally hide transport, signing and error formats;
//! implementations normalize failures into plain errors the coordinator
//! can compensate on. The HTTP clients in `adapters` are the production
//! implementations; tests substitute mocks.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveTime;

use adapters::catalog::CatalogClient;
use adapters::catalog::types::SlotUpdate;
use adapters::paygate::PayGateClient;
use grid::types::{BucketStatus, GridKey};

/// Renderable payment artifact handed back to the customer.
#[derive(Debug, Clone)]
pub struct QrIssued {
    pub bill_code: String,
    pub qr_code: String,
}

/// Payment gateway: exchanges a bill code and amount for a QR artifact.
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    async fn request_qr(&self, bill_code: &str, amount: u64) -> anyhow::Result<QrIssued>;
}

#[async_trait]
impl PaymentGateway for PayGateClient {
    async fn request_qr(&self, bill_code: &str, amount: u64) -> anyhow::Result<QrIssued> {
        let resp = PayGateClient::request_qr(self, bill_code, amount).await?;
        Ok(QrIssued {
            bill_code: resp.bill_code,
            qr_code: resp.qr_code,
        })
    }
}

/// Any collaborator holding a mirrored copy of the availability grid.
#[async_trait]
pub trait SlotMirror: Send + Sync + 'static {
    async fn push_slots(&self, update: &SlotUpdate) -> anyhow::Result<()>;
}

#[async_trait]
impl SlotMirror for CatalogClient {
    async fn push_slots(&self, update: &SlotUpdate) -> anyhow::Result<()> {
        Ok(self.push_slot_update(update).await?)
    }
}

/// Wire payload for one bucket-status transition on one court/date.
pub fn slot_update(key: GridKey, status: BucketStatus, starts: &[NaiveTime]) -> SlotUpdate {
    let times: Vec<String> = starts.iter().map(|t| t.format("%H:%M").to_string()).collect();

    SlotUpdate {
        resource_id: key.court_id,
        date: key.date.to_string(),
        status: status.to_string(),
        slots: BTreeMap::from([(format!("court-{}", key.court_id), times)]),
    }
}
