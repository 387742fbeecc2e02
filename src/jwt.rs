//! JWT payload decoding and expiration checks
//!
//! Decodes the claims segment of a server-issued JWT without verifying the
//! signature (verification is the server's job). Only the `exp` claim is
//! interpreted here.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::AuthError;

/// Sentinel expiration meaning "no expiration asserted".
pub const NO_EXPIRATION: i64 = -1;

/// Clock-skew offset in seconds applied when deciding whether to renew.
/// Treats a token as dead slightly before its literal deadline so a request
/// never races a server clock that already considers it expired.
pub const EXPIRY_OFFSET_SECS: i64 = 1;

/// Decode the claims (middle) segment of a JWT into a JSON map.
pub fn decode_claims(token: &str) -> Result<serde_json::Value, AuthError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::MalformedToken("JWT must have 3 parts".into()));
    }

    let bytes = base64url_decode(parts[1])?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::MalformedToken(format!("claims are not valid JSON: {}", e)))
}

/// Extract the `exp` claim (epoch seconds), or [`NO_EXPIRATION`] when the
/// token asserts none. Callers must treat the sentinel as "never expires".
pub fn get_expiration(token: &str) -> Result<i64, AuthError> {
    let claims = decode_claims(token)?;
    match claims.get("exp") {
        Some(value) => value
            .as_i64()
            .ok_or_else(|| AuthError::MalformedToken("exp claim is not an integer".into())),
        None => Ok(NO_EXPIRATION),
    }
}

/// Is `exp` (epoch seconds) at or before `now + offset_seconds`?
/// The [`NO_EXPIRATION`] sentinel never expires, regardless of offset.
pub fn is_expired(exp: i64, offset_seconds: i64) -> bool {
    if exp == NO_EXPIRATION {
        return false;
    }
    exp <= now_secs() + offset_seconds
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

/// Base64url decode with padding tolerance: accepts unpadded or padded
/// input for lengths mod 4 in {0, 2, 3}; a remainder of 1 is unrecoverable.
fn base64url_decode(segment: &str) -> Result<Vec<u8>, AuthError> {
    let segment = segment.trim_end_matches('=');
    if segment.len() % 4 == 1 {
        return Err(AuthError::MalformedToken(
            "invalid base64url segment length".into(),
        ));
    }
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::MalformedToken(format!("cannot decode base64url: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build an unsigned test token with the given claims JSON.
    fn make_token(claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
        format!("{}.{}.sig", header, payload)
    }

    #[test]
    fn test_expiration_roundtrip() {
        let token = make_token(&serde_json::json!({ "sub": "alice", "exp": 1700000000 }));
        assert_eq!(get_expiration(&token).unwrap(), 1700000000);
    }

    #[test]
    fn test_missing_exp_is_sentinel() {
        let token = make_token(&serde_json::json!({ "sub": "alice" }));
        assert_eq!(get_expiration(&token).unwrap(), NO_EXPIRATION);
        assert!(!is_expired(NO_EXPIRATION, 0));
        assert!(!is_expired(NO_EXPIRATION, 3600));
    }

    #[test]
    fn test_is_expired_boundaries() {
        let now = now_secs();
        assert!(is_expired(now - 2, 1));
        assert!(is_expired(now, 1));
        assert!(!is_expired(now + 2, 1));
        assert!(!is_expired(now + 3600, 0));
    }

    #[test]
    fn test_wrong_segment_count() {
        assert!(matches!(
            decode_claims("only.two"),
            Err(AuthError::MalformedToken(_))
        ));
        assert!(matches!(
            decode_claims("a.b.c.d"),
            Err(AuthError::MalformedToken(_))
        ));
        assert!(matches!(
            decode_claims("noseparators"),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_invalid_base64url_payload() {
        assert!(matches!(
            decode_claims("h.!!!!.s"),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_remainder_one_length_is_fatal() {
        // 5 chars: length mod 4 == 1, not decodable at any padding
        assert!(matches!(
            decode_claims("h.abcde.s"),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_padded_payload_accepted() {
        // "{}" encodes to "e30" unpadded; servers sometimes pad to "e30="
        let token = "h.e30=.s";
        assert_eq!(get_expiration(token).unwrap(), NO_EXPIRATION);
    }

    #[test]
    fn test_payload_not_json() {
        let payload = URL_SAFE_NO_PAD.encode(b"not json at all");
        let token = format!("h.{}.s", payload);
        assert!(matches!(
            decode_claims(&token),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_non_integer_exp_is_malformed() {
        let token = make_token(&serde_json::json!({ "exp": "soon" }));
        assert!(matches!(
            get_expiration(&token),
            Err(AuthError::MalformedToken(_))
        ));
    }
}
