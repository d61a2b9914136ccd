//! Webhook Signature
//!
//! The stream provider signs each delivery as
//! `0x` + hex(keccak256(body || secret)) and sends it in `x-signature`.

use crate::error::{RelayError, RelayResult};
use alloy::primitives::{hex, keccak256, B256};

/// Header carrying the delivery signature
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Digest of the body concatenated with the shared secret
pub fn digest(body: &[u8], secret: &str) -> B256 {
    let mut buf = Vec::with_capacity(body.len() + secret.len());
    buf.extend_from_slice(body);
    buf.extend_from_slice(secret.as_bytes());
    keccak256(&buf)
}

/// Produce the header value the provider would send for `body`
pub fn sign(body: &[u8], secret: &str) -> String {
    format!("0x{}", hex::encode(digest(body, secret)))
}

/// Check a received header against the body
pub fn verify(body: &[u8], secret: &str, header: Option<&str>) -> RelayResult<()> {
    let header = header
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(RelayError::MissingSignature)?;

    let received = hex::decode(header)
        .map_err(|e| RelayError::MalformedSignature(e.to_string()))?;
    if received.len() != 32 {
        return Err(RelayError::MalformedSignature(format!(
            "expected 32 bytes, got {}",
            received.len()
        )));
    }

    let expected = digest(body, secret);
    if constant_time_eq(expected.as_slice(), &received) {
        Ok(())
    } else {
        Err(RelayError::SignatureMismatch)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
