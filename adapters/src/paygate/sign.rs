use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 over `amount|bill_code` with the shared secret.
pub fn sign_payload(secret: &str, amount: u64, bill_code: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(format!("{amount}|{bill_code}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
