//! Access token freshness checks.
//!
//! These functions only look at the structure and the embedded `exp` claim of a
//! JWT-shaped token. Signatures are never verified here; that is the backend's
//! job. Every failure path answers "expired" so a token that cannot be read is
//! never treated as usable.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value as JsonValue};
use std::time::Duration;

/// Remaining lifetime at or below which a token should be refreshed
pub const DEFAULT_REFRESH_WINDOW: Duration = Duration::from_secs(120);

/// Claims decoded from the payload segment of an access token
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenClaims {
    /// Expiry, Unix seconds
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub exp: Option<i64>,
    /// Issued at, Unix seconds
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub iat: Option<i64>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

// Some issuers emit fractional timestamps; anything non-numeric counts as absent
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    #[allow(clippy::cast_possible_truncation)]
    Ok(value.and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f.floor() as i64))))
}

fn is_base64url_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'=')
}

fn split_segments(token: &str) -> Option<[&str; 3]> {
    let mut parts = token.split('.');
    let header = parts.next()?;
    let payload = parts.next()?;
    let signature = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some([header, payload, signature])
}

/// Structural check: three non-empty base64url segments separated by `.`.
///
/// Says nothing about expiry.
pub fn is_valid_token_format(token: &str) -> bool {
    split_segments(token).is_some_and(|segments| segments.iter().all(|s| is_base64url_segment(s)))
}

/// Decode the claims of a token without verifying it.
///
/// Returns `None` on any malformed input.
pub fn decode_token_payload(token: &str) -> Option<TokenClaims> {
    if !is_valid_token_format(token) {
        return None;
    }
    let [_, payload, _] = split_segments(token)?;

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice::<TokenClaims>(&bytes).ok()
}

/// Seconds left before `exp`, negative once expired
pub fn seconds_until_expiry(token: &str, now: i64) -> Option<i64> {
    decode_token_payload(token)?.exp.map(|exp| exp - now)
}

/// True if the token is unreadable, has no `exp`, or `exp <= now`
pub fn is_token_expired_at(token: &str, now: i64) -> bool {
    seconds_until_expiry(token, now).is_none_or(|remaining| remaining <= 0)
}

/// [`is_token_expired_at`] against the current wall clock
pub fn is_token_expired(token: &str) -> bool {
    is_token_expired_at(token, Utc::now().timestamp())
}

/// True if the token expires within `window` of `now`, or cannot be read
pub fn needs_refresh_at(token: &str, now: i64, window: Duration) -> bool {
    let window = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
    seconds_until_expiry(token, now).is_none_or(|remaining| remaining <= window)
}

/// [`needs_refresh_at`] against the current wall clock
pub fn needs_refresh(token: &str, window: Duration) -> bool {
    needs_refresh_at(token, Utc::now().timestamp(), window)
}

#[cfg(test)]
pub(crate) mod test_tokens {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use chrono::Utc;
    use serde_json::{Value as JsonValue, json};

    /// Unsigned JWT-shaped token carrying the given claims
    pub fn token_with_claims(claims: &JsonValue) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.c2lnbmF0dXJl")
    }

    /// Token expiring `offset` seconds from now
    pub fn token_expiring_in(offset: i64) -> String {
        token_with_claims(&json!({ "sub": "u1", "exp": Utc::now().timestamp() + offset }))
    }
}
