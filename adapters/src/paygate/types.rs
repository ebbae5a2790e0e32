use serde::{Deserialize, Serialize};

/// Result code the gateway uses for a successful operation.
pub const RESULT_SUCCESS: &str = "00";

/// Outbound QR request. `signature` covers `amount|bill_code` with the
/// shared secret; the gateway recomputes and compares.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrRequest {
    pub bill_code: String,
    pub amount: u64,
    pub signature: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrResponse {
    pub result_code: String,
    pub bill_code: String,
    /// Renderable payment artifact (QR payload).
    pub qr_code: String,
}

/// Asynchronous payment confirmation pushed by the gateway.
///
/// Replays of the same `bill_code` must be tolerated by the receiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentNotification {
    pub bill_code: String,
    pub result_code: String,
    pub transaction_ref: String,
    pub paid_amount: u64,
}

impl PaymentNotification {
    pub fn is_success(&self) -> bool {
        self.result_code == RESULT_SUCCESS
    }
}
