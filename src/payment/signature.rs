//! HMAC-SHA256 verification of gateway callbacks.
//!
//! The gateway signs `"{timestamp}.{raw body}"` with the shared webhook
//! secret and sends the result in a header of the form
//! `t=<unix seconds>,v1=<hex digest>`. Several `v1` entries may be present
//! during secret rotation; any one matching is enough.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::MarketError;

type HmacSha256 = Hmac<Sha256>;

/// Name of the HTTP header carrying the signature.
pub const SIGNATURE_HEADER: &str = "payment-signature";

/// Parsed `t=...,v1=...` header.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SignatureHeader<'a> {
    timestamp: i64,
    timestamp_raw: &'a str,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> Result<SignatureHeader<'_>, MarketError> {
    let mut timestamp_raw = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp_raw = Some(t);
        } else if let Some(v) = part.strip_prefix("v1=") {
            signatures.push(v);
        }
    }

    let timestamp_raw = timestamp_raw.ok_or_else(|| {
        MarketError::GatewayVerificationFailed("signature header has no timestamp".to_string())
    })?;
    if signatures.is_empty() {
        return Err(MarketError::GatewayVerificationFailed(
            "signature header has no v1 signature".to_string(),
        ));
    }
    let timestamp = timestamp_raw.parse::<i64>().map_err(|e| {
        MarketError::GatewayVerificationFailed(format!("invalid signature timestamp: {e}"))
    })?;

    Ok(SignatureHeader {
        timestamp,
        timestamp_raw,
        signatures,
    })
}

fn mac_for(secret: &str, timestamp: &str, payload: &[u8]) -> Result<HmacSha256, MarketError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| MarketError::Internal(format!("hmac key: {e}")))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Verifies a callback signature.
///
/// `now` is the current unix time in seconds; events whose timestamp is
/// more than `tolerance_secs` away from it are rejected as replays.
///
/// # Errors
///
/// Returns [`MarketError::GatewayVerificationFailed`] if no secret is
/// configured, the header is malformed, no signature matches, or the
/// timestamp is outside the tolerance window.
pub fn verify(
    payload: &[u8],
    header: &str,
    secret: Option<&str>,
    tolerance_secs: u64,
    now: i64,
) -> Result<(), MarketError> {
    let secret = secret.filter(|s| !s.is_empty()).ok_or_else(|| {
        MarketError::GatewayVerificationFailed("no webhook secret configured".to_string())
    })?;
    let parsed = parse_header(header)?;

    let mut matched = false;
    for candidate in &parsed.signatures {
        let Ok(bytes) = hex::decode(candidate) else {
            continue;
        };
        if mac_for(secret, parsed.timestamp_raw, payload)?
            .verify_slice(&bytes)
            .is_ok()
        {
            matched = true;
            break;
        }
    }
    if !matched {
        return Err(MarketError::GatewayVerificationFailed(
            "signature mismatch".to_string(),
        ));
    }

    if now.abs_diff(parsed.timestamp) > tolerance_secs {
        return Err(MarketError::GatewayVerificationFailed(format!(
            "signature timestamp {} outside tolerance of {tolerance_secs}s",
            parsed.timestamp
        )));
    }
    Ok(())
}

/// Produces a signature header for `payload`, as the gateway would.
///
/// # Errors
///
/// Returns [`MarketError::Internal`] if the HMAC key cannot be built.
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, MarketError> {
    let timestamp = timestamp.to_string();
    let digest = mac_for(secret, &timestamp, payload)?.finalize().into_bytes();
    Ok(format!("t={timestamp},v1={}", hex::encode(digest)))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"id":"evt_1"}"#;
    const NOW: i64 = 1_760_000_000;

    fn signed() -> String {
        let Ok(header) = sign(BODY, SECRET, NOW) else {
            panic!("sign failed");
        };
        header
    }

    #[test]
    fn accepts_valid_signature() {
        assert!(verify(BODY, &signed(), Some(SECRET), 300, NOW + 10).is_ok());
    }

    #[test]
    fn rejects_tampered_body() {
        let result = verify(br#"{"id":"evt_2"}"#, &signed(), Some(SECRET), 300, NOW);
        assert!(matches!(result, Err(MarketError::GatewayVerificationFailed(_))));
    }

    #[test]
    fn rejects_wrong_secret_and_missing_secret() {
        assert!(verify(BODY, &signed(), Some("other"), 300, NOW).is_err());
        assert!(verify(BODY, &signed(), None, 300, NOW).is_err());
        assert!(verify(BODY, &signed(), Some(""), 300, NOW).is_err());
    }

    #[test]
    fn rejects_stale_timestamp() {
        let result = verify(BODY, &signed(), Some(SECRET), 300, NOW + 301);
        assert!(matches!(result, Err(MarketError::GatewayVerificationFailed(msg)) if msg.contains("tolerance")));
    }

    #[test]
    fn accepts_any_matching_v1_during_rotation() {
        let header = format!("{},v1=deadbeef", signed());
        assert!(verify(BODY, &header, Some(SECRET), 300, NOW).is_ok());
        let header = format!("t={NOW},v1=deadbeef,v1=zz");
        assert!(verify(BODY, &header, Some(SECRET), 300, NOW).is_err());
    }

    #[test]
    fn rejects_malformed_header() {
        assert!(verify(BODY, "garbage", Some(SECRET), 300, NOW).is_err());
        assert!(verify(BODY, "t=abc,v1=00", Some(SECRET), 300, NOW).is_err());
        assert!(verify(BODY, &format!("t={NOW}"), Some(SECRET), 300, NOW).is_err());
    }
}
