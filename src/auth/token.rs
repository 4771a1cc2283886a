//! Local access-token inspection.
//!
//! This is an expiry check only. The payload segment of a JWT-shaped bearer
//! token is decoded and its `exp` claim compared with the current time; the
//! signature is never verified. A forged payload with a future `exp` passes,
//! so every mutation endpoint behind the gate must still be authorized by the
//! identity provider itself.

use base64ct::{Base64, Encoding};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    Format,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("token payload is not a json object")]
    NotObject,
    #[error("invalid expiration")]
    InvalidExp,
}

/// Decoded payload claims of a bearer token.
#[derive(Clone, Debug, PartialEq)]
pub struct Claims(Map<String, Value>);

impl Claims {
    /// Expiry in seconds since the epoch.
    ///
    /// `Ok(None)` when the claim is absent or `null`.
    ///
    /// # Errors
    /// Returns `TokenError::InvalidExp` when `exp` is present but not a number.
    pub fn exp(&self) -> Result<Option<f64>, TokenError> {
        match self.0.get("exp") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(number)) => number.as_f64().map(Some).ok_or(TokenError::InvalidExp),
            Some(_) => Err(TokenError::InvalidExp),
        }
    }

    #[must_use]
    pub fn sub(&self) -> Option<&str> {
        self.0.get("sub").and_then(Value::as_str)
    }

    #[must_use]
    pub fn get(&self, claim: &str) -> Option<&Value> {
        self.0.get(claim)
    }

    /// Whether the claims are still usable at `now` (seconds since the epoch).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn is_live_at(&self, now: i64) -> bool {
        match self.exp() {
            Ok(None) => true,
            Ok(Some(exp)) => exp > now as f64,
            Err(_) => false,
        }
    }
}

/// Decode a base64url segment the way browsers do it: swap the URL-safe
/// alphabet for the standard one and restore the padding from `len % 4`.
///
/// # Errors
/// Returns `TokenError::Base64` when the segment is not valid base64url.
pub fn decode_segment(segment: &str) -> Result<Vec<u8>, TokenError> {
    let mut standard: String = segment
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let padding = (4 - standard.len() % 4) % 4;
    standard.extend(std::iter::repeat('=').take(padding));

    Base64::decode_vec(&standard).map_err(|_| TokenError::Base64)
}

/// Decode the payload (second segment) of a dot-delimited token.
///
/// # Errors
/// Returns an error when the token has fewer than two segments, the payload
/// is not base64url, not JSON, or not a JSON object.
pub fn decode_claims(token: &str) -> Result<Claims, TokenError> {
    let payload = token.split('.').nth(1).ok_or(TokenError::Format)?;
    let bytes = decode_segment(payload)?;
    match serde_json::from_slice::<Value>(&bytes)? {
        Value::Object(map) => Ok(Claims(map)),
        _ => Err(TokenError::NotObject),
    }
}

/// Locally decide whether `token` is usable right now.
#[must_use]
pub fn is_valid(token: Option<&str>) -> bool {
    is_valid_at(token, now_unix())
}

/// Same as [`is_valid`] with an explicit clock (seconds since the epoch).
#[must_use]
pub fn is_valid_at(token: Option<&str>, now: i64) -> bool {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return false;
    };

    decode_claims(token).is_ok_and(|claims| claims.is_live_at(now))
}

/// Expiry of `token` truncated to whole seconds, if it carries one.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn expires_at(token: &str) -> Option<i64> {
    decode_claims(token)
        .ok()
        .and_then(|claims| claims.exp().ok().flatten())
        .map(|exp| exp as i64)
}

pub(crate) fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}
