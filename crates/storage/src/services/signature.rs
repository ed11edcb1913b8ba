//! HMAC-SHA256 signatures as used by the payment gateway: lowercase hex over
//! either `"{order_id}|{payment_id}"` (client confirmation) or the raw webhook
//! body.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn keyed(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length")
}

pub fn sign(secret: &str, message: &[u8]) -> String {
    let mut mac = keyed(secret);
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time comparison of `signature` (hex) against the expected MAC.
pub fn verify(secret: &str, message: &[u8], signature: &str) -> bool {
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };
    let mut mac = keyed(secret);
    mac.update(message);
    mac.verify_slice(&provided).is_ok()
}

pub fn payment_message(order_id: &str, payment_id: &str) -> String {
    format!("{order_id}|{payment_id}")
}
