//! Slack request signature verification.
//!
//! Slack signs requests with HMAC-SHA256 over `v0:{timestamp}:{body}`
//! and sends the hex digest as `v0=...` in the `X-Slack-Signature`
//! header, with the timestamp in `X-Slack-Request-Timestamp`.
//! Reference: https://api.slack.com/authentication/verifying-requests-from-slack

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Signature version prefix Slack currently uses.
const SIGNATURE_VERSION: &str = "v0";

/// Why a request failed verification.
///
/// `MalformedHeaders` means the caller could not even be evaluated (400);
/// the other variants mean the caller was evaluated and rejected (401).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureError {
    /// Timestamp header is not an integer.
    MalformedHeaders,
    /// Timestamp is outside the accepted age window (replay guard).
    Stale,
    /// Computed digest does not match the supplied signature.
    Mismatch,
}

/// Verify a Slack request signature against the raw request body.
///
/// Must run before the body is parsed as trusted data.
pub fn verify_slack_signature(
    signing_secret: &str,
    timestamp: &str,
    signature: &str,
    body: &[u8],
    max_age_seconds: u64,
) -> Result<(), SignatureError> {
    let request_time: u64 = timestamp.parse().map_err(|_| {
        warn!(timestamp = %timestamp, "slack_signature_invalid_timestamp");
        SignatureError::MalformedHeaders
    })?;

    let current_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let age = current_time.abs_diff(request_time);

    if age > max_age_seconds {
        warn!(
            request_time = request_time,
            current_time = current_time,
            age_seconds = age,
            max_age_seconds = max_age_seconds,
            "slack_signature_stale"
        );
        return Err(SignatureError::Stale);
    }

    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .map_err(|_| SignatureError::Mismatch)?;

    mac.update(format!("{}:{}:", SIGNATURE_VERSION, timestamp).as_bytes());
    mac.update(body);

    let expected = format!(
        "{}={}",
        SIGNATURE_VERSION,
        hex::encode(mac.finalize().into_bytes())
    );

    if !constant_time_compare(&expected, signature) {
        warn!(
            expected_length = expected.len(),
            actual_length = signature.len(),
            "slack_signature_mismatch"
        );
        return Err(SignatureError::Mismatch);
    }

    Ok(())
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sign a body the way Slack does, for round-trip tests.
    fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("v0:{}:", timestamp).as_bytes());
        mac.update(body);
        format!("v0={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn now_string() -> String {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            .to_string()
    }

    #[test]
    fn test_verify_valid_signature() {
        let timestamp = now_string();
        let body = br#"{"type":"event_callback"}"#;
        let signature = sign("secret", &timestamp, body);

        assert_eq!(
            verify_slack_signature("secret", &timestamp, &signature, body, 300),
            Ok(())
        );
    }

    #[test]
    fn test_verify_tampered_body() {
        let timestamp = now_string();
        let signature = sign("secret", &timestamp, br#"{"type":"event_callback"}"#);

        assert_eq!(
            verify_slack_signature("secret", &timestamp, &signature, b"tampered", 300),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_verify_wrong_secret() {
        let timestamp = now_string();
        let body = b"body";
        let signature = sign("other-secret", &timestamp, body);

        assert_eq!(
            verify_slack_signature("secret", &timestamp, &signature, body, 300),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_verify_stale_timestamp() {
        // Year 2000
        let timestamp = "946684800";
        let body = b"body";
        let signature = sign("secret", timestamp, body);

        assert_eq!(
            verify_slack_signature("secret", timestamp, &signature, body, 300),
            Err(SignatureError::Stale)
        );
    }

    #[test]
    fn test_verify_garbage_timestamp() {
        assert_eq!(
            verify_slack_signature("secret", "not-a-number", "v0=00", b"body", 300),
            Err(SignatureError::MalformedHeaders)
        );
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
