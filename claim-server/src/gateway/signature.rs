//! Webhook signature (HMAC-SHA256)
//!
//! The signature is the hex HMAC of the webhook's `data` object serialized
//! as compact JSON with keys in sorted order.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Canonical bytes of a webhook `data` object
pub fn canonical_payload(data: &serde_json::Value) -> Vec<u8> {
    // Relies on serde_json's `preserve_order` feature staying off: Map is
    // then a BTreeMap and keys serialize sorted. Enabling it anywhere in the
    // dependency graph switches Map to insertion order and breaks signatures.
    serde_json::to_vec(data).unwrap_or_default()
}

/// Hex signature for `payload`
pub fn sign(payload: &[u8], secret: &str) -> Result<String, &'static str> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a hex signature in constant time
pub fn verify(payload: &[u8], signature: &str, secret: &str) -> Result<(), &'static str> {
    if signature.is_empty() {
        return Err("Missing webhook signature");
    }
    let sig_bytes = hex::decode(signature.trim()).map_err(|_| "Invalid signature hex")?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(payload);
    mac.verify_slice(&sig_bytes)
        .map_err(|_| "Webhook signature mismatch")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_then_verify() {
        let data = serde_json::json!({"status": "executed", "id": "pay_1"});
        let payload = canonical_payload(&data);
        let sig = sign(&payload, "whsec").unwrap();

        assert!(verify(&payload, &sig, "whsec").is_ok());
        assert_eq!(verify(&payload, &sig, "other"), Err("Webhook signature mismatch"));
        assert_eq!(verify(&payload, "zz", "whsec"), Err("Invalid signature hex"));
        assert_eq!(verify(&payload, "", "whsec"), Err("Missing webhook signature"));
    }

    #[test]
    fn test_canonical_payload_ignores_key_order() {
        let a: serde_json::Value = serde_json::from_str(r#"{"id":"pay_1","status":"executed"}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"status":"executed","id":"pay_1"}"#).unwrap();
        assert_eq!(canonical_payload(&a), canonical_payload(&b));
        assert_eq!(canonical_payload(&a), br#"{"id":"pay_1","status":"executed"}"#.to_vec());
    }
}
