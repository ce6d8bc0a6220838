//! `X-Hub-Signature-256` verification: `sha256=<hex HMAC-SHA256(secret, body)>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::webhook::WebhookError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
const PREFIX: &str = "sha256=";

fn mac(secret: &[u8], body: &[u8]) -> Result<Vec<u8>, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| WebhookError::Internal(format!("hmac key: {e}")))?;
    mac.update(body);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Header value a sender with `secret` would attach to `body`.
pub fn sign(secret: &[u8], body: &[u8]) -> Result<String, WebhookError> {
    Ok(format!("{PREFIX}{}", hex::encode(mac(secret, body)?)))
}

pub fn verify(secret: &[u8], body: &[u8], header: Option<&str>) -> Result<(), WebhookError> {
    let header = header.ok_or(WebhookError::MissingSignature)?;
    let encoded = header
        .trim()
        .strip_prefix(PREFIX)
        .ok_or_else(|| WebhookError::InvalidSignatureFormat("missing sha256= prefix".into()))?;
    let provided = hex::decode(encoded)
        .map_err(|e| WebhookError::InvalidSignatureFormat(e.to_string()))?;
    let expected = mac(secret, body)?;

    if bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
        Ok(())
    } else {
        Err(WebhookError::InvalidSignature)
    }
}
