use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument};

use crate::paygate::errors::PayGateError;
use crate::paygate::sign::sign_payload;
use crate::paygate::types::{QrRequest, QrResponse, RESULT_SUCCESS};

/// HTTP client for the payment gateway collaborator.
#[derive(Clone)]
pub struct PayGateClient {
    http: Client,
    url: String,
    secret: String,
}

impl PayGateClient {
    pub fn new(url: String, secret: String) -> Result<Self, PayGateError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self { http, url, secret })
    }

    /// Request a renderable payment QR for `bill_code`/`amount`.
    ///
    /// The gateway echoes the bill code; a mismatch or a non-success
    /// result code fails the call.
    #[instrument(
        skip(self),
        fields(bill_code = %bill_code, amount = amount),
        level = "debug"
    )]
    pub async fn request_qr(
        &self,
        bill_code: &str,
        amount: u64,
    ) -> Result<QrResponse, PayGateError> {
        let req = QrRequest {
            bill_code: bill_code.to_string(),
            amount,
            signature: sign_payload(&self.secret, amount, bill_code),
        };

        let url = format!("{}/v1/qr", self.url);
        let resp = self
            .http
            .post(&url)
            .json(&req)
            .send()
            .await?
            .error_for_status()?;

        let qr: QrResponse = resp.json().await?;

        if qr.result_code != RESULT_SUCCESS {
            return Err(PayGateError::Rejected {
                code: qr.result_code,
            });
        }
        if qr.bill_code != bill_code {
            return Err(PayGateError::InvalidResponse);
        }

        debug!(bill_code = %qr.bill_code, "payment QR issued");

        Ok(qr)
    }
}
