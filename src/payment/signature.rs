//! Webhook signature verification.
//!
//! The provider sends `Stripe-Signature: t=<unix seconds>,v1=<hex>[,v1=<hex>...]`
//! where each `v1` is an HMAC-SHA256 of `"<t>.<raw body>"` keyed with the webhook
//! secret. A signature is valid when any `v1` matches and `t` is within the
//! tolerance window of the current time.

use crate::errors::{Error, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age (and clock skew) of a signed delivery, in seconds
pub const TOLERANCE_SECS: i64 = 300;

fn malformed(message: &str) -> Error {
    Error::InvalidSignature {
        message: message.to_string(),
    }
}

/// Checks `header` against `payload`.
///
/// Returns `Ok(false)` for a well-formed header whose signature does not match or
/// whose timestamp is outside the window.
///
/// # Errors
/// `InvalidSignature` when the header is missing its timestamp or signatures.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<bool> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for item in header.split(',') {
        match item.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| malformed("missing timestamp"))?;
    if signatures.is_empty() {
        return Err(malformed("missing v1 signature"));
    }
    let issued_at: i64 = timestamp
        .parse()
        .map_err(|_| malformed("timestamp is not a number"))?;

    if now.abs_diff(issued_at) > TOLERANCE_SECS.unsigned_abs() {
        tracing::warn!(issued_at, now, "Webhook signature outside tolerance window");
        return Ok(false);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| malformed("unusable webhook secret"))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    Ok(signatures.into_iter().any(|signature| {
        hex::decode(signature).is_ok_and(|expected| mac.clone().verify_slice(&expected).is_ok())
    }))
}

/// Header value a provider would send for `payload` at `timestamp`.
#[cfg(test)]
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    #![allow(clippy::expect_used)]
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC takes any key size");
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    const SECRET: &str = "whsec_test123secret456";
    const BODY: &[u8] = b"{\"type\":\"checkout.session.completed\"}";
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_valid_signature() {
        let header = sign_payload(BODY, SECRET, NOW);
        assert!(verify_signature(BODY, &header, SECRET, NOW + 10).unwrap());
    }

    #[test]
    fn test_wrong_secret_or_tampered_body() {
        let header = sign_payload(BODY, "wrong_secret", NOW);
        assert!(!verify_signature(BODY, &header, SECRET, NOW).unwrap());

        let header = sign_payload(BODY, SECRET, NOW);
        let tampered = b"{\"type\":\"checkout.session.completed\",\"hacked\":true}";
        assert!(!verify_signature(tampered, &header, SECRET, NOW).unwrap());
    }

    #[test]
    fn test_stale_timestamp() {
        let header = sign_payload(BODY, SECRET, NOW - 600);
        assert!(!verify_signature(BODY, &header, SECRET, NOW).unwrap());
    }

    #[test]
    fn test_extreme_timestamps_are_out_of_window() {
        for issued_at in [i64::MIN, i64::MAX, -1] {
            let header = format!("t={issued_at},v1=00");
            assert!(!verify_signature(BODY, &header, SECRET, NOW).unwrap());
        }
    }

    #[test]
    fn test_any_of_several_signatures_may_match() {
        let valid = sign_payload(BODY, SECRET, NOW);
        let header = format!("{valid},v1=deadbeef,v0=ignored");
        assert!(verify_signature(BODY, &header, SECRET, NOW).unwrap());
    }

    #[test]
    fn test_malformed_headers() {
        for header in ["", "garbage", "v1=abcd", "t=1700000000", "t=soon,v1=abcd"] {
            assert!(
                matches!(
                    verify_signature(BODY, header, SECRET, NOW),
                    Err(Error::InvalidSignature { .. })
                ),
                "{header:?} should be malformed"
            );
        }
    }
}
