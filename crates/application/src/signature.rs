//! HMAC-SHA256 payload signing shared by outbound delivery and inbound
//! verification.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use tidewire_core::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Returns the hex HMAC-SHA256 of `body` keyed with `secret`.
pub fn sign_payload(secret: &str, body: &[u8]) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|error| AppError::Internal(format!("invalid signing secret: {error}")))?;
    mac.update(body);

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a hex signature header against `body` in constant time.
///
/// Accepts an optional `sha256=` prefix. Malformed headers never verify.
#[must_use]
pub fn verify_signature(secret: &str, body: &[u8], signature_header: &str) -> bool {
    let header = signature_header.trim();
    let header = header.strip_prefix("sha256=").unwrap_or(header);

    let Ok(provided) = hex::decode(header) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);

    mac.verify_slice(provided.as_slice()).is_ok()
}

/// Returns the hex SHA-256 content hash of a raw body.
#[must_use]
pub fn payload_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}
